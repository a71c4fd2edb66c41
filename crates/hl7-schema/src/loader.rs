//! Structure definition loader
//!
//! A structure file looks like this (JSON uses the same shape):
//!
//! ```yaml
//! name: ORU_R01
//! version: "2.5"
//! datatypes:
//!   CE: [ST, ST, ID]
//! segments:
//!   - name: MSH
//!     fields:
//!       - { type: ST, required: true }
//!   - name: OBX
//!     fields:
//!       - { type: SI }
//!       - { type: Varies, max_repetitions: 0 }
//! structure:
//!   - { segment: MSH, required: true }
//!   - group: OBSERVATION
//!     repeating: true
//!     children:
//!       - { segment: OBX, required: true }
//! ```
//!
//! Datatype names listed under `datatypes` become composites, `Varies` is the
//! runtime-typed datatype and every other name is a primitive.

use crate::registry::DefinitionRegistry;
use crate::{Error, Result};
use hl7_model::types::VARIES;
use hl7_model::{
    DataTypeDefinition, FieldDefinition, GroupDefinition, SegmentDefinition, StructureDefinition,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Serializable structure format for loading from files
#[derive(Debug, Deserialize)]
struct StructureFile {
    name: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    datatypes: HashMap<String, Vec<String>>,
    #[serde(default)]
    segments: Vec<SegmentFile>,
    structure: Vec<ChildFile>,
}

#[derive(Debug, Deserialize)]
struct SegmentFile {
    name: String,
    #[serde(default)]
    fields: Vec<FieldFile>,
}

#[derive(Debug, Deserialize)]
struct FieldFile {
    #[serde(rename = "type")]
    data_type: String,
    #[serde(default = "default_max_repetitions")]
    max_repetitions: usize,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    length: Option<usize>,
    #[serde(default)]
    description: String,
}

fn default_max_repetitions() -> usize {
    1
}

/// One entry of a group's child list
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChildFile {
    Segment {
        segment: String,
        #[serde(default)]
        required: bool,
        #[serde(default)]
        repeating: bool,
    },
    Group {
        group: String,
        #[serde(default)]
        required: bool,
        #[serde(default)]
        repeating: bool,
        children: Vec<ChildFile>,
    },
}

/// Loads structure definitions from search paths and caches them by name
pub struct StructureLoader {
    registry: Arc<DefinitionRegistry>,
    search_paths: Vec<PathBuf>,
}

impl StructureLoader {
    /// Create a loader with its own registry
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self {
            registry: Arc::new(DefinitionRegistry::new()),
            search_paths,
        }
    }

    /// Create a loader that caches into a shared registry
    pub fn with_registry(registry: Arc<DefinitionRegistry>, search_paths: Vec<PathBuf>) -> Self {
        Self {
            registry,
            search_paths,
        }
    }

    pub fn add_path(&mut self, path: PathBuf) {
        self.search_paths.push(path);
    }

    pub fn registry(&self) -> &DefinitionRegistry {
        &self.registry
    }

    /// Load a structure definition by name.
    ///
    /// Checks the registry first, then looks for `<name>.yaml`, `<name>.yml`
    /// or `<name>.json` (lowercased) in each search path.
    pub fn load(&self, name: &str) -> Result<Arc<GroupDefinition>> {
        if let Some(cached) = self.registry.get(name) {
            debug!(structure = name, "cache hit for structure definition");
            return Ok(cached);
        }
        trace!(structure = name, "cache miss for structure definition");

        let definition = Arc::new(self.load_from_disk(name)?);
        self.registry.register(name, Arc::clone(&definition));
        Ok(definition)
    }

    /// Load a structure definition from a specific file.
    ///
    /// `.yaml` and `.yml` files are read as YAML, everything else as JSON.
    pub fn load_from_file(&self, path: &Path) -> Result<GroupDefinition> {
        trace!(path = %path.display(), "loading structure definition");
        let content = std::fs::read_to_string(path)?;
        let is_yaml = path
            .extension()
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        if is_yaml {
            self.load_from_yaml(&content)
        } else {
            self.load_from_json(&content)
        }
    }

    pub fn load_from_json(&self, json: &str) -> Result<GroupDefinition> {
        let file: StructureFile = serde_json::from_str(json)
            .map_err(|e| Error::InvalidFormat(format!("JSON parse error: {e}")))?;
        convert_structure_file(&file)
    }

    pub fn load_from_yaml(&self, yaml: &str) -> Result<GroupDefinition> {
        let file: StructureFile = serde_yaml::from_str(yaml)
            .map_err(|e| Error::InvalidFormat(format!("YAML parse error: {e}")))?;
        convert_structure_file(&file)
    }

    fn load_from_disk(&self, name: &str) -> Result<GroupDefinition> {
        let base = name.to_lowercase();
        let variations = [
            format!("{base}.yaml"),
            format!("{base}.yml"),
            format!("{base}.json"),
        ];

        for path in &self.search_paths {
            for variation in &variations {
                let file_path = path.join(variation);
                if file_path.exists() {
                    let definition = self.load_from_file(&file_path)?;
                    info!(
                        structure = name,
                        path = %file_path.display(),
                        "loaded structure definition"
                    );
                    return Ok(definition);
                }
            }
        }

        Err(Error::NotFound(format!(
            "{name} not found in search paths: {:?}",
            self.search_paths
        )))
    }
}

impl Default for StructureLoader {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Build the validated group tree a structure file declares
fn convert_structure_file(file: &StructureFile) -> Result<GroupDefinition> {
    let builder = DefinitionBuilder::new(file)?;
    let mut root = GroupDefinition::new(file.name.clone());
    for child in &file.structure {
        builder.add_child(&mut root, child)?;
    }
    root.validate()?;

    debug!(
        structure = %file.name,
        version = file.version.as_deref().unwrap_or("unversioned"),
        segments = builder.segments.len(),
        "converted structure file"
    );
    Ok(root)
}

/// Resolves datatype and segment references of one structure file
struct DefinitionBuilder<'f> {
    datatypes: &'f HashMap<String, Vec<String>>,
    segments: HashMap<&'f str, Arc<SegmentDefinition>>,
}

impl<'f> DefinitionBuilder<'f> {
    fn new(file: &'f StructureFile) -> Result<Self> {
        let mut builder = Self {
            datatypes: &file.datatypes,
            segments: HashMap::new(),
        };

        for segment in &file.segments {
            if segment.name.is_empty() {
                return Err(Error::invalid_definition("segment with an empty name"));
            }
            let mut definition = SegmentDefinition::new(segment.name.clone());
            for field in &segment.fields {
                definition = definition.with_field(builder.field(field)?);
            }
            if builder
                .segments
                .insert(segment.name.as_str(), Arc::new(definition))
                .is_some()
            {
                return Err(Error::invalid_definition(format!(
                    "segment {} is declared twice",
                    segment.name
                )));
            }
        }
        Ok(builder)
    }

    fn field(&self, field: &FieldFile) -> Result<FieldDefinition> {
        let mut definition = FieldDefinition::new(self.data_type(&field.data_type, &mut Vec::new())?)
            .described(field.description.clone())
            .with_max_repetitions(field.max_repetitions);
        if field.required {
            definition = definition.required();
        }
        if let Some(length) = field.length {
            definition = definition.with_length(length);
        }
        Ok(definition)
    }

    /// `resolving` holds the composites currently being expanded
    fn data_type(&self, name: &str, resolving: &mut Vec<String>) -> Result<DataTypeDefinition> {
        if name == VARIES {
            return Ok(DataTypeDefinition::Varies);
        }
        let Some(components) = self.datatypes.get(name) else {
            return Ok(DataTypeDefinition::primitive(name));
        };

        if resolving.iter().any(|outer| outer == name) {
            return Err(Error::invalid_definition(format!(
                "datatype {name} contains itself ({} -> {name})",
                resolving.join(" -> ")
            )));
        }
        if components.is_empty() {
            return Err(Error::invalid_definition(format!(
                "datatype {name} declares no components"
            )));
        }

        resolving.push(name.to_string());
        let components = components
            .iter()
            .map(|component| self.data_type(component, resolving))
            .collect::<Result<Vec<_>>>()?;
        resolving.pop();

        Ok(DataTypeDefinition::composite(name, components))
    }

    fn add_child(&self, group: &mut GroupDefinition, child: &ChildFile) -> Result<()> {
        match child {
            ChildFile::Segment {
                segment,
                required,
                repeating,
            } => {
                let definition = self.segments.get(segment.as_str()).ok_or_else(|| {
                    Error::invalid_definition(format!(
                        "group {} references undeclared segment {segment}",
                        group.name
                    ))
                })?;
                group.add_child(
                    StructureDefinition::Segment(Arc::clone(definition)),
                    *required,
                    *repeating,
                );
            }
            ChildFile::Group {
                group: name,
                required,
                repeating,
                children,
            } => {
                let mut nested = GroupDefinition::new(name.clone());
                for child in children {
                    self.add_child(&mut nested, child)?;
                }
                group.add_child(
                    StructureDefinition::Group(Arc::new(nested)),
                    *required,
                    *repeating,
                );
            }
        }
        Ok(())
    }
}
