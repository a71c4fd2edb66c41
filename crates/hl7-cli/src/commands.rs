//! Subcommand implementations

use crate::config::CliConfig;
use anyhow::{Context, Result};
use hl7_model::{Message, Primitive, StructureId};
use hl7_schema::StructureLoader;
use hl7_terser::deep_copy::copy_segment_within;
use hl7_terser::{Error, MessageNavigator, Terser};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Empty message of the structure named by `structure`.
///
/// An existing file is loaded directly; anything else is treated as a
/// structure name and looked up in the loader's search paths.
pub fn new_message(loader: &StructureLoader, structure: &str) -> Result<Message> {
    let path = Path::new(structure);
    let definition = if path.is_file() {
        let definition = loader
            .load_from_file(path)
            .with_context(|| format!("failed to load structure file {}", path.display()))?;
        Arc::new(definition)
    } else {
        loader
            .load(structure)
            .with_context(|| format!("failed to load structure {structure}"))?
    };
    Ok(Message::new(definition))
}

fn apply_sets(terser: &mut Terser<'_>, sets: &[(String, String)]) -> Result<()> {
    for (path, value) in sets {
        terser
            .set(path, value.as_str())
            .with_context(|| format!("failed to set {path}"))?;
    }
    Ok(())
}

/// Print `PATH=VALUE` for each path; unset values print as empty
pub fn get(
    message: &mut Message,
    config: &CliConfig,
    sets: &[(String, String)],
    paths: &[String],
    out: &mut impl Write,
) -> Result<()> {
    let mut terser = Terser::with_config(message, config.navigation.clone());
    apply_sets(&mut terser, sets)?;
    for path in paths {
        let value = terser
            .get(path)
            .with_context(|| format!("failed to get {path}"))?;
        writeln!(out, "{path}={}", value.unwrap_or_default())?;
    }
    Ok(())
}

/// Print every position of a structural walk, indented by group depth
pub fn walk(
    message: &mut Message,
    config: &CliConfig,
    sets: &[(String, String)],
    segments_only: bool,
    out: &mut impl Write,
) -> Result<()> {
    apply_sets(&mut Terser::with_config(message, config.navigation.clone()), sets)?;

    let mut navigator = MessageNavigator::with_config(message, config.navigation.clone());
    loop {
        match navigator.iterate(segments_only, false) {
            Ok(()) => {}
            Err(Error::EndOfMessage) => break,
            Err(err) => return Err(err.into()),
        }
        let current = navigator.current_structure(0)?;
        let name = navigator.message().name(current)?;
        writeln!(out, "{}{name}", "  ".repeat(navigator.depth()))?;
    }
    Ok(())
}

/// Copy segment `from` into segment `to`, then print the target's values
pub fn copy(
    message: &mut Message,
    config: &CliConfig,
    sets: &[(String, String)],
    from: &str,
    to: &str,
    out: &mut impl Write,
) -> Result<()> {
    let mut terser = Terser::with_config(message, config.navigation.clone());
    apply_sets(&mut terser, sets)?;

    let source = terser
        .segment(from)
        .with_context(|| format!("failed to locate {from}"))?;
    let target = terser
        .segment(to)
        .with_context(|| format!("failed to locate {to}"))?;
    copy_segment_within(terser.finder_mut().message_mut(), source, target, config.copy_policy)
        .with_context(|| format!("failed to copy {from} into {to}"))?;

    print_segment(terser.message(), target, to, out)
}

/// One `SEGMENT-field(rep)-component-subcomponent=value` line per set primitive
fn print_segment(message: &Message, segment: StructureId, segment_path: &str, out: &mut impl Write) -> Result<()> {
    for field in 1..=message.num_fields(segment)? {
        for rep in 0..message.field_repetitions(segment, field)? {
            let Some(ty) = message.try_field(segment, field, rep)? else {
                continue;
            };
            for component in 1..=Terser::num_components(ty) {
                for subcomponent in 1..=Terser::num_sub_components(ty, component) {
                    let value = Terser::primitive(ty, component, subcomponent).and_then(Primitive::value);
                    if let Some(value) = value {
                        writeln!(out, "{segment_path}-{field}({rep})-{component}-{subcomponent}={value}")?;
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hl7_terser::SegmentCopyPolicy;

    const STRUCTURE: &str = r#"
name: ORU_R01
datatypes:
  XPN: [ST, ST, ST]
segments:
  - name: MSH
    fields: [{ type: ST }]
  - name: PID
    fields:
      - { type: SI }
      - { type: XPN, max_repetitions: 0 }
  - name: OBR
    fields: [{ type: SI }]
  - name: NTE
    fields:
      - { type: SI }
      - { type: FT, max_repetitions: 0 }
structure:
  - { segment: MSH, required: true }
  - group: ORDER
    required: true
    repeating: true
    children:
      - { segment: OBR, required: true }
      - { segment: NTE, repeating: true }
  - { segment: PID }
"#;

    fn message() -> Message {
        let definition = StructureLoader::default().load_from_yaml(STRUCTURE).unwrap();
        Message::new(Arc::new(definition))
    }

    fn sets(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(path, value)| (path.to_string(), value.to_string()))
            .collect()
    }

    fn output(out: Vec<u8>) -> String {
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_get_prints_values() {
        let mut msg = message();
        let mut out = Vec::new();
        let paths = ["/PID-2-2".to_string(), "/PID-1".to_string()];

        get(&mut msg, &CliConfig::default(), &sets(&[("/PID-2-2", "Jo")]), &paths, &mut out).unwrap();

        assert_eq!(output(out), "/PID-2-2=Jo\n/PID-1=\n");
    }

    #[test]
    fn test_walk_indents_by_depth() {
        let mut msg = message();
        let mut out = Vec::new();

        walk(&mut msg, &CliConfig::default(), &[], false, &mut out).unwrap();

        assert_eq!(output(out), "MSH\nORDER\n  OBR\n  NTE\nPID\n");
    }

    #[test]
    fn test_walk_segments_only() {
        let mut msg = message();
        let mut out = Vec::new();

        walk(&mut msg, &CliConfig::default(), &[], true, &mut out).unwrap();

        assert_eq!(output(out), "MSH\n  OBR\n  NTE\nPID\n");
    }

    #[test]
    fn test_copy_prints_target() {
        let mut msg = message();
        let mut out = Vec::new();
        let values = sets(&[("/.NTE-2", "first"), ("/.NTE-2(1)", "second")]);

        copy(&mut msg, &CliConfig::default(), &values, "/.NTE", "/ORDER/NTE(1)", &mut out).unwrap();

        assert_eq!(
            output(out),
            "/ORDER/NTE(1)-2(0)-1-1=first\n/ORDER/NTE(1)-2(1)-1-1=second\n"
        );
    }

    #[test]
    fn test_copy_policy_from_config() {
        let values = sets(&[("/.NTE-1", "7"), ("/.NTE-2", "note")]);

        let mut msg = message();
        let err = copy(&mut msg, &CliConfig::default(), &values, "/.NTE", "/PID", &mut Vec::new())
            .unwrap_err();
        assert!(format!("{err:#}").contains("Schema mismatch"));

        let config = CliConfig {
            copy_policy: SegmentCopyPolicy::OverlappingFields,
            ..CliConfig::default()
        };
        let mut msg = message();
        let mut out = Vec::new();
        copy(&mut msg, &config, &values, "/.NTE", "/PID", &mut out).unwrap();
        assert_eq!(output(out), "/PID-1(0)-1-1=7\n/PID-2(0)-1-1=note\n");
    }
}
