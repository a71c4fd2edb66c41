//! Schema declarations for message structures
//!
//! Definitions are immutable once built and shared through [`Arc`], so every
//! instance created from a slot points back at the same declaration.

use crate::types::{Composite, Primitive, Type, Varies};
use crate::{Error, Result};
use std::sync::Arc;

/// Declaration of a group (or of a whole message, which is the root group)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDefinition {
    /// Group name (e.g. `ORU_R01`, `PATIENT_RESULT`)
    pub name: String,

    /// Child slots in canonical order
    pub children: Vec<ChildDefinition>,
}

/// One declared child slot of a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildDefinition {
    /// Slot name, unique within the group (e.g. `PID`, `PID2`)
    pub name: String,

    /// Whether a well-formed message must contain this slot
    pub required: bool,

    /// Whether the slot may hold more than one repetition
    pub repeating: bool,

    /// What the slot instantiates
    pub definition: StructureDefinition,
}

/// Either kind of structure a slot can hold
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureDefinition {
    Segment(Arc<SegmentDefinition>),
    Group(Arc<GroupDefinition>),
}

/// Declaration of a segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentDefinition {
    /// Segment tag (e.g. `PID`)
    pub name: String,

    /// Declared fields, field 1 first
    pub fields: Vec<FieldDefinition>,

    /// Generic segments have no declared fields and grow on demand
    pub generic: bool,
}

/// Declaration of a segment field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    /// Human-readable field name
    pub description: String,

    /// Datatype instantiated for every repetition
    pub data_type: DataTypeDefinition,

    /// Maximum repetitions, 0 for unbounded
    pub max_repetitions: usize,

    /// Whether the field is required
    pub required: bool,

    /// Maximum length, if declared
    pub length: Option<usize>,
}

/// Declaration of a field datatype
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataTypeDefinition {
    /// Primitive datatype such as `ST`, `NM`, `ID`
    Primitive { name: String },

    /// Composite datatype with ordered components
    Composite {
        name: String,
        components: Vec<DataTypeDefinition>,
    },

    /// Type chosen at runtime
    Varies,
}

impl GroupDefinition {
    /// Create an empty group declaration
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// Append a child slot, returning the slot name actually used.
    ///
    /// A name already present in the group gets a numeric suffix (`PID2`,
    /// `PID3`, ...).
    pub fn add_child(
        &mut self,
        definition: StructureDefinition,
        required: bool,
        repeating: bool,
    ) -> String {
        let name = self.unique_slot_name(definition.name());
        self.children.push(ChildDefinition {
            name: name.clone(),
            required,
            repeating,
            definition,
        });
        name
    }

    /// Builder form of [`add_child`](Self::add_child) for a segment
    pub fn with_segment(
        mut self,
        segment: SegmentDefinition,
        required: bool,
        repeating: bool,
    ) -> Self {
        self.add_child(
            StructureDefinition::Segment(Arc::new(segment)),
            required,
            repeating,
        );
        self
    }

    /// Builder form of [`add_child`](Self::add_child) for a group
    pub fn with_group(mut self, group: GroupDefinition, required: bool, repeating: bool) -> Self {
        self.add_child(StructureDefinition::Group(Arc::new(group)), required, repeating);
        self
    }

    /// Find a child slot by name
    pub fn child(&self, name: &str) -> Option<&ChildDefinition> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Slot name that does not collide with existing children
    pub fn unique_slot_name(&self, base: &str) -> String {
        unique_name(base, |candidate| self.child(candidate).is_some())
    }

    /// Check that every group in this tree declares at least one child
    pub fn validate(&self) -> Result<()> {
        if self.children.is_empty() {
            return Err(Error::invalid_definition(format!(
                "group {} declares no children",
                self.name
            )));
        }
        for child in &self.children {
            if let StructureDefinition::Group(group) = &child.definition {
                group.validate()?;
            }
        }
        Ok(())
    }
}

impl StructureDefinition {
    /// Structure name (without any slot suffix)
    pub fn name(&self) -> &str {
        match self {
            StructureDefinition::Segment(s) => &s.name,
            StructureDefinition::Group(g) => &g.name,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, StructureDefinition::Group(_))
    }
}

impl SegmentDefinition {
    /// Create a segment declaration with no fields yet
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            generic: false,
        }
    }

    /// Declaration used for segments that are not part of the schema
    pub fn generic(name: impl Into<String>) -> Self {
        Self {
            generic: true,
            ..Self::new(name)
        }
    }

    /// Append a field declaration
    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }
}

impl FieldDefinition {
    /// Create an optional, non-repeating field of the given datatype
    pub fn new(data_type: DataTypeDefinition) -> Self {
        Self {
            description: String::new(),
            data_type,
            max_repetitions: 1,
            required: false,
            length: None,
        }
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the maximum repetitions (0 for unbounded)
    pub fn with_max_repetitions(mut self, max_repetitions: usize) -> Self {
        self.max_repetitions = max_repetitions;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }
}

impl DataTypeDefinition {
    pub fn primitive(name: impl Into<String>) -> Self {
        Self::Primitive { name: name.into() }
    }

    pub fn composite(name: impl Into<String>, components: Vec<DataTypeDefinition>) -> Self {
        Self::Composite {
            name: name.into(),
            components,
        }
    }

    /// Datatype name as it appears in the schema
    pub fn name(&self) -> &str {
        match self {
            DataTypeDefinition::Primitive { name } | DataTypeDefinition::Composite { name, .. } => {
                name
            }
            DataTypeDefinition::Varies => crate::types::VARIES,
        }
    }

    /// Create a fresh, empty value of this datatype
    pub fn instantiate(&self) -> Type {
        match self {
            DataTypeDefinition::Primitive { name } => Type::Primitive(Primitive::new(name.clone())),
            DataTypeDefinition::Composite { name, components } => Type::Composite(Composite::new(
                name.clone(),
                components.iter().map(DataTypeDefinition::instantiate).collect(),
            )),
            DataTypeDefinition::Varies => Type::Varies(Varies::new()),
        }
    }
}

/// Append `2`, `3`, ... to `base` until `taken` no longer reports a collision.
pub(crate) fn unique_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{base}{suffix}");
        if !taken(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn st() -> DataTypeDefinition {
        DataTypeDefinition::primitive("ST")
    }

    #[test]
    fn test_duplicate_slot_names_are_suffixed() {
        let pid = SegmentDefinition::new("PID");
        let mut group = GroupDefinition::new("MSG");

        let first = group.add_child(StructureDefinition::Segment(Arc::new(pid.clone())), true, false);
        let second = group.add_child(StructureDefinition::Segment(Arc::new(pid.clone())), false, false);
        let third = group.add_child(StructureDefinition::Segment(Arc::new(pid)), false, false);

        assert_eq!(first, "PID");
        assert_eq!(second, "PID2");
        assert_eq!(third, "PID3");
        assert_eq!(group.child("PID2").map(|c| c.definition.name()), Some("PID"));
    }

    #[test]
    fn test_validate_rejects_empty_group() {
        let group = GroupDefinition::new("MSG")
            .with_segment(SegmentDefinition::new("MSH"), true, false)
            .with_group(GroupDefinition::new("EMPTY"), false, false);

        let err = group.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidDefinition(msg) if msg.contains("EMPTY")));
    }

    #[test]
    fn test_instantiate_composite() {
        let ce = DataTypeDefinition::composite("CE", vec![st(), st(), st()]);
        let value = ce.instantiate();

        let composite = value.as_composite().unwrap();
        assert_eq!(composite.type_name(), "CE");
        assert_eq!(composite.components().len(), 3);
        assert!(!composite.is_generic());
    }

    #[test]
    fn test_field_builder() {
        let field = FieldDefinition::new(st())
            .described("Patient Name")
            .with_max_repetitions(0)
            .required()
            .with_length(250);

        assert_eq!(field.description, "Patient Name");
        assert_eq!(field.max_repetitions, 0);
        assert!(field.required);
        assert_eq!(field.length, Some(250));
    }

    #[test]
    fn test_varies_definition_name() {
        assert_eq!(DataTypeDefinition::Varies.name(), "Varies");
        assert!(DataTypeDefinition::Varies.instantiate().as_varies().is_some());
    }
}
