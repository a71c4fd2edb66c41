//! Message arena and the group/segment operations
//!
//! Every group and segment of a message lives in one arena owned by the
//! [`Message`]. Parents are handles, never owners, and are fixed when a node is
//! created.

use crate::definition::{unique_name, GroupDefinition, SegmentDefinition, StructureDefinition};
use crate::types::{Type, Varies};
use crate::{Error, Result};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Handle of a group or segment inside one [`Message`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructureId(usize);

/// The two kinds of structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructureKind {
    Segment,
    Group,
}

/// A structure handle together with its kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StructureRef {
    pub id: StructureId,
    pub kind: StructureKind,
}

/// An HL7 message: the root group plus every structure created under it
#[derive(Debug, Clone)]
pub struct Message {
    definition: Arc<GroupDefinition>,
    nodes: Vec<Node>,
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    parent: Option<StructureId>,
    body: NodeBody,
}

#[derive(Debug, Clone)]
enum NodeBody {
    Group(GroupNode),
    Segment(SegmentNode),
}

#[derive(Debug, Clone)]
struct GroupNode {
    slots: Vec<Slot>,
}

#[derive(Debug, Clone)]
struct Slot {
    name: String,
    required: bool,
    repeating: bool,
    definition: StructureDefinition,
    reps: Vec<StructureId>,
}

#[derive(Debug, Clone)]
struct SegmentNode {
    definition: Arc<SegmentDefinition>,
    fields: Vec<Vec<Type>>,
}

impl fmt::Display for StructureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl GroupNode {
    fn new(definition: &GroupDefinition) -> Self {
        let slots = definition
            .children
            .iter()
            .map(|child| Slot {
                name: child.name.clone(),
                required: child.required,
                repeating: child.repeating,
                definition: child.definition.clone(),
                reps: Vec::new(),
            })
            .collect();
        Self { slots }
    }

    fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.name == name)
    }

    fn slot_position(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.name == name)
    }
}

impl SegmentNode {
    fn new(definition: Arc<SegmentDefinition>) -> Self {
        let fields = vec![Vec::new(); definition.fields.len()];
        Self { definition, fields }
    }
}

impl Message {
    /// Create an empty message from its root group declaration
    pub fn new(definition: Arc<GroupDefinition>) -> Self {
        let root = Node {
            name: definition.name.clone(),
            parent: None,
            body: NodeBody::Group(GroupNode::new(&definition)),
        };
        Self {
            definition,
            nodes: vec![root],
        }
    }

    /// Handle of the root group
    pub fn root(&self) -> StructureId {
        StructureId(0)
    }

    /// Declaration the message was created from
    pub fn definition(&self) -> &GroupDefinition {
        &self.definition
    }

    pub fn is_root(&self, id: StructureId) -> bool {
        id == self.root()
    }

    /// Structure name (schema tag, without slot suffix)
    pub fn name(&self, id: StructureId) -> Result<&str> {
        Ok(&self.node(id)?.name)
    }

    /// Parent group, `None` for the root
    pub fn parent(&self, id: StructureId) -> Result<Option<StructureId>> {
        Ok(self.node(id)?.parent)
    }

    pub fn kind(&self, id: StructureId) -> Result<StructureKind> {
        Ok(match self.node(id)?.body {
            NodeBody::Group(_) => StructureKind::Group,
            NodeBody::Segment(_) => StructureKind::Segment,
        })
    }

    pub fn structure_ref(&self, id: StructureId) -> Result<StructureRef> {
        Ok(StructureRef {
            id,
            kind: self.kind(id)?,
        })
    }

    pub fn is_group(&self, id: StructureId) -> Result<bool> {
        Ok(self.kind(id)? == StructureKind::Group)
    }

    pub fn is_segment(&self, id: StructureId) -> Result<bool> {
        Ok(self.kind(id)? == StructureKind::Segment)
    }

    // ---- group operations ----

    /// Child slot names of a group, in canonical order
    pub fn names(&self, group: StructureId) -> Result<Vec<String>> {
        Ok(self.group(group)?.slots.iter().map(|s| s.name.clone()).collect())
    }

    /// Number of child slots of a group
    pub fn child_count(&self, group: StructureId) -> Result<usize> {
        Ok(self.group(group)?.slots.len())
    }

    /// Slot name at a 0-based position
    pub fn child_name(&self, group: StructureId, index: usize) -> Result<&str> {
        let node = self.group(group)?;
        node.slots
            .get(index)
            .map(|s| s.name.as_str())
            .ok_or_else(|| Error::unknown_child(self.name_or_unknown(group), format!("#{index}")))
    }

    /// Position of a slot among the group's children
    pub fn slot_index(&self, group: StructureId, name: &str) -> Result<Option<usize>> {
        Ok(self.group(group)?.slot_position(name))
    }

    /// Get a repetition of a child slot, creating it if necessary.
    ///
    /// Repetition `n` can only be created when repetitions `0..n` exist.
    pub fn get_structure(&mut self, group: StructureId, name: &str, rep: usize) -> Result<StructureId> {
        let (index, definition) = {
            let slot = self.slot(group, name)?;
            if let Some(existing) = slot.reps.get(rep) {
                return Ok(*existing);
            }
            if rep > slot.reps.len() {
                return Err(Error::RepetitionOutOfRange {
                    group: self.name_or_unknown(group),
                    name: name.to_string(),
                    rep,
                    count: slot.reps.len(),
                });
            }
            if !slot.repeating && rep > 0 {
                return Err(Error::NonRepeating {
                    name: name.to_string(),
                    rep,
                });
            }
            let index = self.group(group)?.slot_position(name).unwrap_or_default();
            (index, slot.definition.clone())
        };

        let id = self.instantiate(&definition, group);
        self.group_mut(group)?.slots[index].reps.push(id);
        trace!(group = %group, slot = name, rep, "created structure");
        Ok(id)
    }

    /// Get an existing repetition of a child slot without creating anything
    pub fn try_get_structure(
        &self,
        group: StructureId,
        name: &str,
        rep: usize,
    ) -> Result<Option<StructureId>> {
        Ok(self.slot(group, name)?.reps.get(rep).copied())
    }

    /// All existing repetitions of a child slot
    pub fn get_all(&self, group: StructureId, name: &str) -> Result<Vec<StructureId>> {
        Ok(self.slot(group, name)?.reps.clone())
    }

    pub fn is_repeating(&self, group: StructureId, name: &str) -> Result<bool> {
        Ok(self.slot(group, name)?.repeating)
    }

    pub fn is_required(&self, group: StructureId, name: &str) -> Result<bool> {
        Ok(self.slot(group, name)?.required)
    }

    /// Declaration a child slot instantiates
    pub fn child_definition(&self, group: StructureId, name: &str) -> Result<&StructureDefinition> {
        Ok(&self.slot(group, name)?.definition)
    }

    /// Append a slot for a segment the schema does not declare.
    ///
    /// The slot is optional and repeating and holds generic segments. Returns
    /// the slot name, suffixed when `name` is already taken in the group.
    pub fn add_nonstandard_segment(&mut self, group: StructureId, name: &str) -> Result<String> {
        let node = self.group_mut(group)?;
        let slot_name = unique_name(name, |candidate| node.slot(candidate).is_some());
        node.slots.push(Slot {
            name: slot_name.clone(),
            required: false,
            repeating: true,
            definition: StructureDefinition::Segment(Arc::new(SegmentDefinition::generic(name))),
            reps: Vec::new(),
        });
        trace!(group = %group, slot = %slot_name, "added nonstandard segment slot");
        Ok(slot_name)
    }

    /// Detach one repetition of a child slot, returning its handle.
    ///
    /// Later repetitions shift down by one. The detached structure is no
    /// longer reachable from its parent.
    pub fn remove_repetition(&mut self, group: StructureId, name: &str, rep: usize) -> Result<StructureId> {
        let group_name = self.name_or_unknown(group);
        let node = self.group_mut(group)?;
        let slot = node
            .slots
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| Error::unknown_child(group_name.clone(), name))?;
        if rep >= slot.reps.len() {
            return Err(Error::RepetitionOutOfRange {
                group: group_name,
                name: name.to_string(),
                rep,
                count: slot.reps.len(),
            });
        }
        Ok(slot.reps.remove(rep))
    }

    // ---- segment operations ----

    /// Number of fields: declared fields, or instantiated ones for a generic segment
    pub fn num_fields(&self, segment: StructureId) -> Result<usize> {
        Ok(self.segment(segment)?.fields.len())
    }

    /// Whether the segment is a generic (nonstandard) segment
    pub fn is_generic_segment(&self, segment: StructureId) -> Result<bool> {
        Ok(self.segment(segment)?.definition.generic)
    }

    /// Number of existing repetitions of a field (1-based field number)
    pub fn field_repetitions(&self, segment: StructureId, field: usize) -> Result<usize> {
        let node = self.segment(segment)?;
        let reps = field
            .checked_sub(1)
            .and_then(|i| node.fields.get(i))
            .ok_or_else(|| Error::FieldOutOfRange {
                segment: node.definition.name.clone(),
                field,
                count: node.fields.len(),
            })?;
        Ok(reps.len())
    }

    /// Get an existing field repetition without creating anything
    pub fn try_field(&self, segment: StructureId, field: usize, rep: usize) -> Result<Option<&Type>> {
        let node = self.segment(segment)?;
        if field == 0 {
            return Err(Error::FieldOutOfRange {
                segment: node.definition.name.clone(),
                field,
                count: node.fields.len(),
            });
        }
        match node.fields.get(field - 1) {
            Some(reps) => Ok(reps.get(rep)),
            None if node.definition.generic => Ok(None),
            None => Err(Error::FieldOutOfRange {
                segment: node.definition.name.clone(),
                field,
                count: node.fields.len(),
            }),
        }
    }

    /// Get a field repetition, creating it if necessary (1-based field, 0-based rep)
    pub fn field_mut(&mut self, segment: StructureId, field: usize, rep: usize) -> Result<&mut Type> {
        let node = self.segment_mut(segment)?;
        let name = node.definition.name.clone();

        if field == 0 || (field > node.fields.len() && !node.definition.generic) {
            return Err(Error::FieldOutOfRange {
                segment: name,
                field,
                count: node.fields.len(),
            });
        }
        while node.fields.len() < field {
            node.fields.push(Vec::new());
        }

        let (data_type, max) = match node.definition.fields.get(field - 1) {
            Some(def) => (Some(def.data_type.clone()), def.max_repetitions),
            None => (None, 0),
        };
        let reps = &mut node.fields[field - 1];
        if rep > reps.len() {
            return Err(Error::FieldRepetitionOutOfRange {
                segment: name,
                field,
                rep,
                count: reps.len(),
            });
        }
        if rep == reps.len() {
            if max > 0 && rep >= max {
                return Err(Error::FieldRepetitionLimit {
                    segment: name,
                    field,
                    max,
                });
            }
            let value = match data_type {
                Some(def) => def.instantiate(),
                None => Type::Varies(Varies::new()),
            };
            reps.push(value);
        }
        Ok(&mut reps[rep])
    }

    // ---- internals ----

    fn instantiate(&mut self, definition: &StructureDefinition, parent: StructureId) -> StructureId {
        let body = match definition {
            StructureDefinition::Group(group) => NodeBody::Group(GroupNode::new(group)),
            StructureDefinition::Segment(segment) => {
                NodeBody::Segment(SegmentNode::new(Arc::clone(segment)))
            }
        };
        let id = StructureId(self.nodes.len());
        self.nodes.push(Node {
            name: definition.name().to_string(),
            parent: Some(parent),
            body,
        });
        id
    }

    fn node(&self, id: StructureId) -> Result<&Node> {
        self.nodes.get(id.0).ok_or(Error::InvalidHandle(id.0))
    }

    fn name_or_unknown(&self, id: StructureId) -> String {
        self.node(id)
            .map(|n| n.name.clone())
            .unwrap_or_else(|_| id.to_string())
    }

    fn group(&self, id: StructureId) -> Result<&GroupNode> {
        let node = self.node(id)?;
        match &node.body {
            NodeBody::Group(group) => Ok(group),
            NodeBody::Segment(_) => Err(Error::NotAGroup(node.name.clone())),
        }
    }

    fn group_mut(&mut self, id: StructureId) -> Result<&mut GroupNode> {
        let node = self.nodes.get_mut(id.0).ok_or(Error::InvalidHandle(id.0))?;
        match &mut node.body {
            NodeBody::Group(group) => Ok(group),
            NodeBody::Segment(_) => Err(Error::NotAGroup(node.name.clone())),
        }
    }

    fn segment(&self, id: StructureId) -> Result<&SegmentNode> {
        let node = self.node(id)?;
        match &node.body {
            NodeBody::Segment(segment) => Ok(segment),
            NodeBody::Group(_) => Err(Error::NotASegment(node.name.clone())),
        }
    }

    fn segment_mut(&mut self, id: StructureId) -> Result<&mut SegmentNode> {
        let node = self.nodes.get_mut(id.0).ok_or(Error::InvalidHandle(id.0))?;
        match &mut node.body {
            NodeBody::Segment(segment) => Ok(segment),
            NodeBody::Group(_) => Err(Error::NotASegment(node.name.clone())),
        }
    }

    fn slot(&self, group: StructureId, name: &str) -> Result<&Slot> {
        self.group(group)?
            .slot(name)
            .ok_or_else(|| Error::unknown_child(self.name_or_unknown(group), name))
    }
}
