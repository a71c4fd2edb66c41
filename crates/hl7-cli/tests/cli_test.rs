use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const ORU_R01: &str = r#"
name: ORU_R01
datatypes:
  XPN: [ST, ST, ST]
  CE: [ST, ST, ID]
segments:
  - name: MSH
    fields: [{ type: ST }, { type: ST }]
  - name: PID
    fields:
      - { type: SI }
      - { type: XPN, max_repetitions: 0 }
  - name: OBR
    fields:
      - { type: SI }
      - { type: CE }
  - name: OBX
    fields:
      - { type: SI }
      - { type: Varies, max_repetitions: 0 }
  - name: NTE
    fields:
      - { type: SI }
      - { type: FT, max_repetitions: 0 }
structure:
  - { segment: MSH, required: true }
  - group: PATIENT_RESULT
    required: true
    repeating: true
    children:
      - { segment: PID, required: true }
      - group: ORDER
        required: true
        repeating: true
        children:
          - { segment: OBR, required: true }
          - { segment: NTE, repeating: true }
          - group: OBSERVATION
            repeating: true
            children:
              - { segment: OBX, required: true }
              - { segment: NTE, repeating: true }
"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().expect("temporary directory should be created");
        fs::write(dir.path().join("oru_r01.yaml"), ORU_R01).expect("structure file should be written");
        Self { dir }
    }

    fn structure(&self) -> String {
        self.dir.path().join("oru_r01.yaml").display().to_string()
    }

    fn write_config(&self, content: &str) -> PathBuf {
        let path = self.dir.path().join("config.yaml");
        fs::write(&path, content).expect("config file should be written");
        path
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }
}

fn run_hl7nav(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_hl7nav"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("run hl7nav")
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "expected success; stdout: {}; stderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).expect("stdout should be UTF-8")
}

#[test]
fn get_prints_values_after_sets() {
    let workspace = Workspace::new();
    let structure = workspace.structure();

    let output = run_hl7nav(&[
        "get",
        "--structure",
        &structure,
        "--set",
        "/.PID-2-1=Smith",
        "--set",
        "/.PID-2(1)-1=Jones",
        "--set",
        "/.OBX-2-3=high",
        "/.PID-2-1",
        "/.PID-2(1)-1",
        "/.PID-2-2",
        "/.OBX-2-3",
    ]);

    assert_eq!(
        stdout(&output),
        "/.PID-2-1=Smith\n/.PID-2(1)-1=Jones\n/.PID-2-2=\n/.OBX-2-3=high\n"
    );
}

#[test]
fn walk_prints_indented_structure() {
    let workspace = Workspace::new();
    let output = run_hl7nav(&["walk", "--structure", &workspace.structure()]);

    let expected = [
        "MSH",
        "PATIENT_RESULT",
        "  PID",
        "  ORDER",
        "    OBR",
        "    NTE",
        "    OBSERVATION",
        "      OBX",
        "      NTE",
    ];
    assert_eq!(stdout(&output).lines().collect::<Vec<_>>(), expected);
}

#[test]
fn walk_segments_only() {
    let workspace = Workspace::new();
    let output = run_hl7nav(&["walk", "--structure", &workspace.structure(), "--segments-only"]);

    let expected = ["MSH", "  PID", "    OBR", "    NTE", "      OBX", "      NTE"];
    assert_eq!(stdout(&output).lines().collect::<Vec<_>>(), expected);
}

#[test]
fn copy_prints_target_segment() {
    let workspace = Workspace::new();
    let output = run_hl7nav(&[
        "copy",
        "--structure",
        &workspace.structure(),
        "--set",
        "/.NTE-2=first note",
        "--set",
        "/.NTE-2(1)=second",
        "--from",
        "/.NTE",
        "--to",
        "/.OBSERVATION/NTE",
    ]);

    assert_eq!(
        stdout(&output),
        "/.OBSERVATION/NTE-2(0)-1-1=first note\n/.OBSERVATION/NTE-2(1)-1-1=second\n"
    );
}

#[test]
fn copy_between_schemas_fails_by_default() {
    let workspace = Workspace::new();
    let output = run_hl7nav(&[
        "copy",
        "--structure",
        &workspace.structure(),
        "--set",
        "/.NTE-2=note",
        "--from",
        "/.NTE",
        "--to",
        "/.PID",
    ]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR:"), "stderr: {stderr}");
    assert!(stderr.contains("Schema mismatch"), "stderr: {stderr}");
}

#[test]
fn config_selects_copy_policy_and_structure_paths() {
    let workspace = Workspace::new();
    let config = workspace.write_config(&format!(
        "structure_paths: ['{}']\ncopy_policy: overlapping_fields\n",
        workspace.path().display()
    ));
    let config = config.display().to_string();

    let output = run_hl7nav(&[
        "--config",
        &config,
        "copy",
        "--structure",
        "ORU_R01",
        "--set",
        "/.NTE-2=note",
        "--from",
        "/.NTE",
        "--to",
        "/.PID",
    ]);

    assert_eq!(stdout(&output), "/.PID-2(0)-1-1=note\n");
}

#[test]
fn invalid_config_returns_fatal_exit_code() {
    let workspace = Workspace::new();
    let config = workspace.write_config("color: neon");
    let config = config.display().to_string();

    let output = run_hl7nav(&["--config", &config, "walk", "--structure", &workspace.structure()]);

    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("ERROR:"));
}

#[test]
fn malformed_path_is_reported() {
    let workspace = Workspace::new();
    let output = run_hl7nav(&["get", "--structure", &workspace.structure(), "/.PID"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("must specify field"), "stderr: {stderr}");
}

#[test]
fn unknown_structure_is_reported() {
    let output = run_hl7nav(&["walk", "--structure", "NOPE_X01"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("NOPE_X01"), "stderr: {stderr}");
}
