//! Depth-first iteration over the structure space of a message
//!
//! The iterator walks the *conceptual* structure of a message rather than only
//! what has been instantiated: each step resolves its position with
//! get-or-create, and depending on the direction it may step into a new
//! repetition or append a nonstandard segment. For repeating containers the
//! sequence never ends.

use crate::config::RequiredBoundary;
use crate::{Error, Result};
use hl7_model::{Message, StructureDefinition, StructureId, StructureKind, StructureRef};
use std::fmt;
use tracing::{debug, error, trace};

/// Direction that matches no structure, giving a plain first-repetition walk
pub const NO_MATCH_DIRECTION: &str = "doesn't exist";

/// A child slot instance within a group: slot name plus repetition
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Index {
    pub name: String,
    pub rep: usize,
}

/// A concrete location: a parent group and an index within it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Position {
    pub parent: StructureId,
    pub index: Index,
}

/// Which part of the tree a containment search looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchScope {
    /// Only follow first children (first child, its first child, ...)
    pub first_descendents_only: bool,

    /// Stop scanning siblings at the first required one
    pub up_to_first_required: bool,

    /// Whether the required sibling itself is still checked
    pub boundary: RequiredBoundary,
}

impl Index {
    pub fn new(name: impl Into<String>, rep: usize) -> Self {
        Self {
            name: name.into(),
            rep,
        }
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.rep)
    }
}

impl Position {
    pub fn new(parent: StructureId, index: Index) -> Self {
        Self { parent, index }
    }

    /// Same slot, next repetition
    pub fn next_rep(&self) -> Self {
        Self::new(self.parent, Index::new(self.index.name.clone(), self.index.rep + 1))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.parent, self.index)
    }
}

impl SearchScope {
    pub fn new(first_descendents_only: bool, up_to_first_required: bool) -> Self {
        Self {
            first_descendents_only,
            up_to_first_required,
            boundary: RequiredBoundary::default(),
        }
    }

    pub fn with_boundary(mut self, boundary: RequiredBoundary) -> Self {
        self.boundary = boundary;
        self
    }

    /// Whether a sibling scan stops before checking a slot with this requiredness
    fn stops_before(&self, required: bool) -> bool {
        self.up_to_first_required && required && self.boundary == RequiredBoundary::Exclusive
    }

    /// Whether a sibling scan stops after checking a slot with this requiredness
    fn stops_after(&self, required: bool) -> bool {
        self.up_to_first_required && required && self.boundary == RequiredBoundary::Inclusive
    }

    /// [`stops_before`](Self::stops_before) for the children of a group being
    /// descended into; the first child is always checked
    fn descent_stops_before(&self, index: usize, required: bool) -> bool {
        index > 0 && self.stops_before(required)
    }

    /// [`stops_after`](Self::stops_after) for the children of a group being
    /// descended into; a required first child ends the scan either way
    fn descent_stops_after(&self, index: usize, required: bool) -> bool {
        self.stops_after(required) || (index == 0 && self.stops_before(required))
    }
}

/// Depth-first iterator over the structure positions of a message.
///
/// The `direction` is the name of the structure the caller is looking for.
/// It never filters the output; it only decides, at the end of a group or
/// on a repeating slot, whether to move on, repeat, or synthesize.
pub struct MessageIterator<'m> {
    message: &'m mut Message,
    current: StructureId,
    bound: StructureId,
    direction: String,
    next: Option<Position>,
    handle_unexpected_segments: bool,
    boundary: RequiredBoundary,
    failed: bool,
}

impl<'m> MessageIterator<'m> {
    /// Create an iterator positioned at `start`.
    ///
    /// With `handle_unexpected_segments` set, a direction that cannot be found
    /// further along the message is appended as a nonstandard segment.
    pub fn new(
        message: &'m mut Message,
        start: StructureId,
        direction: impl Into<String>,
        handle_unexpected_segments: bool,
    ) -> Self {
        let bound = message.root();
        Self {
            message,
            current: start,
            bound,
            direction: direction.into(),
            next: None,
            handle_unexpected_segments,
            boundary: RequiredBoundary::default(),
            failed: false,
        }
    }

    /// Treat `group` as the top of the walk instead of the message root
    pub fn within(mut self, group: StructureId) -> Self {
        self.bound = group;
        self
    }

    pub fn with_required_boundary(mut self, boundary: RequiredBoundary) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn direction(&self) -> &str {
        &self.direction
    }

    /// Change the direction; any position computed for the old one is dropped
    pub fn set_direction(&mut self, direction: impl Into<String>) {
        self.next = None;
        self.direction = direction.into();
    }

    /// The structure most recently returned (or the start structure)
    pub fn current(&self) -> StructureId {
        self.current
    }

    pub fn message(&self) -> &Message {
        &*self.message
    }

    /// Whether another position exists, computing and buffering it if needed
    pub fn has_next(&mut self) -> Result<bool> {
        if self.next.is_some() {
            return Ok(true);
        }

        let next = match self.message.kind(self.current)? {
            StructureKind::Group => {
                let first = self.message.child_name(self.current, 0).map_err(|_| {
                    Error::structural(format!(
                        "group {} declares no children",
                        self.message.name(self.current).unwrap_or_default()
                    ))
                })?;
                Some(Position::new(self.current, Index::new(first, 0)))
            }
            StructureKind::Segment => {
                let parent = self.message.parent(self.current)?.ok_or_else(|| {
                    Error::tree_corruption(format!("segment {} has no parent", self.current))
                })?;
                let index = get_index(self.message, parent, self.current)?;
                let position = Position::new(parent, index);

                let repeating = self.message.is_repeating(parent, &position.index.name)?;
                if repeating && self.message.name(self.current)? == self.direction {
                    Some(position.next_rep())
                } else {
                    self.next_position(position)?
                }
            }
        };

        trace!(
            direction = %self.direction,
            next = ?next.as_ref().map(ToString::to_string),
            "computed next position"
        );
        self.next = next;
        Ok(self.next.is_some())
    }

    /// Resolve the buffered position (get-or-create) and make it current
    fn advance(&mut self) -> Result<StructureRef> {
        let position = self
            .next
            .take()
            .ok_or_else(|| Error::structural("no buffered position"))?;
        let id = self
            .message
            .get_structure(position.parent, &position.index.name, position.index.rep)?;
        self.current = id;
        Ok(self.message.structure_ref(id)?)
    }

    /// Next position after `start`: the next sibling, or, at the end of a
    /// group, a position found by climbing the ancestor chain.
    fn next_position(&mut self, start: Position) -> Result<Option<Position>> {
        let mut position = start;
        loop {
            let names = self.message.names(position.parent)?;
            let slot = names
                .iter()
                .position(|n| *n == position.index.name)
                .ok_or_else(|| {
                    Error::tree_corruption(format!("{position} names an unknown slot"))
                })?;

            if slot + 1 < names.len() {
                return Ok(Some(Position::new(
                    position.parent,
                    Index::new(names[slot + 1].clone(), 0),
                )));
            }

            let parent = position.parent;
            let at_top = parent == self.bound || self.message.is_root(parent);
            if at_top && !self.handle_unexpected_segments {
                return Ok(None);
            }

            let scope = SearchScope::new(false, true).with_boundary(self.boundary);
            if !self.handle_unexpected_segments
                || match_exists_after_position(self.message, &position, &self.direction, scope)?
            {
                if at_top {
                    return Ok(None);
                }
                let grandparent = self.message.parent(parent)?.ok_or_else(|| {
                    Error::tree_corruption(format!("group {parent} has no parent"))
                })?;
                let parent_position = Position::new(grandparent, get_index(self.message, grandparent, parent)?);

                let parent_repeats = self
                    .message
                    .is_repeating(grandparent, &parent_position.index.name)?;
                if parent_repeats
                    && slot_contains(
                        self.message,
                        grandparent,
                        &parent_position.index.name,
                        &self.direction,
                        scope,
                    )?
                {
                    return Ok(Some(parent_position.next_rep()));
                }
                position = parent_position;
            } else {
                let slot_name = self.message.add_nonstandard_segment(parent, &self.direction)?;
                let group_name = self.message.name(parent)?;
                debug!(
                    segment = %self.direction,
                    slot = %slot_name,
                    group = %group_name,
                    "creating nonstandard segment"
                );
                return Ok(Some(Position::new(parent, Index::new(slot_name, 0))));
            }
        }
    }
}

impl Iterator for MessageIterator<'_> {
    type Item = Result<StructureRef>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let result = match self.has_next() {
            Ok(true) => self.advance(),
            Ok(false) => return None,
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

/// Locate `child` among the slots of `parent`.
///
/// A child that its own parent does not list means the tree is corrupt.
pub fn get_index(message: &Message, parent: StructureId, child: StructureId) -> Result<Index> {
    for name in message.names(parent)? {
        if let Some(rep) = message.get_all(parent, &name)?.iter().position(|id| *id == child) {
            return Ok(Index::new(name, rep));
        }
    }
    let child_name = message.name(child).unwrap_or("<invalid>");
    let parent_name = message.name(parent).unwrap_or("<invalid>");
    error!(child = %child_name, parent = %parent_name, "structure not found under its parent");
    Err(Error::tree_corruption(format!(
        "{child_name} ({child}) is not a child of {parent_name} ({parent})"
    )))
}

/// Whether `name` can be reached after `position` without mutating the tree.
///
/// Checks the position's own slot when it repeats, then later siblings
/// (bounded by `scope`), then the same search from each ancestor's position,
/// stopping at the message root.
pub fn match_exists_after_position(
    message: &Message,
    position: &Position,
    name: &str,
    scope: SearchScope,
) -> Result<bool> {
    let mut position = position.clone();
    loop {
        let parent = position.parent;

        if message.is_repeating(parent, &position.index.name)? {
            let found = match message.try_get_structure(parent, &position.index.name, position.index.rep)? {
                Some(id) => contains(message, id, name, scope)?,
                None => definition_contains(
                    message.child_definition(parent, &position.index.name)?,
                    name,
                    scope,
                ),
            };
            if found {
                return Ok(true);
            }
        }

        let siblings = message.names(parent)?;
        let mut after = false;
        for sibling in &siblings {
            if after {
                let required = message.is_required(parent, sibling)?;
                if scope.stops_before(required) {
                    break;
                }
                if slot_contains(message, parent, sibling, name, scope)? {
                    return Ok(true);
                }
                if scope.stops_after(required) {
                    break;
                }
            }
            if *sibling == position.index.name {
                after = true;
            }
        }

        if message.is_root(parent) {
            return Ok(false);
        }
        let grandparent = message
            .parent(parent)?
            .ok_or_else(|| Error::tree_corruption(format!("group {parent} has no parent")))?;
        position = Position::new(grandparent, get_index(message, grandparent, parent)?);
    }
}

/// Whether `structure` is a segment named `name` or a group containing one.
///
/// Groups are inspected through the first repetition of each slot; slots
/// with no instance yet are inspected through their definition, so nothing
/// is created. A group's first child is always inspected, even under an
/// exclusive required boundary.
pub fn contains(message: &Message, structure: StructureId, name: &str, scope: SearchScope) -> Result<bool> {
    if message.kind(structure)? == StructureKind::Segment {
        return Ok(message.name(structure)? == name);
    }

    for (index, slot) in message.names(structure)?.iter().enumerate() {
        let required = message.is_required(structure, slot)?;
        if scope.descent_stops_before(index, required) {
            break;
        }
        if slot_contains(message, structure, slot, name, scope)? {
            return Ok(true);
        }
        if scope.first_descendents_only || scope.descent_stops_after(index, required) {
            break;
        }
    }
    Ok(false)
}

/// [`contains`] applied to the first repetition of a slot
fn slot_contains(
    message: &Message,
    group: StructureId,
    slot: &str,
    name: &str,
    scope: SearchScope,
) -> Result<bool> {
    match message.try_get_structure(group, slot, 0)? {
        Some(id) => contains(message, id, name, scope),
        None => Ok(definition_contains(message.child_definition(group, slot)?, name, scope)),
    }
}

/// [`contains`] evaluated on a declaration instead of an instance
fn definition_contains(definition: &StructureDefinition, name: &str, scope: SearchScope) -> bool {
    match definition {
        StructureDefinition::Segment(segment) => segment.name == name,
        StructureDefinition::Group(group) => {
            for (index, child) in group.children.iter().enumerate() {
                if scope.descent_stops_before(index, child.required) {
                    break;
                }
                if definition_contains(&child.definition, name, scope) {
                    return true;
                }
                if scope.first_descendents_only || scope.descent_stops_after(index, child.required) {
                    break;
                }
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hl7_model::{DataTypeDefinition, FieldDefinition, GroupDefinition, SegmentDefinition};
    use std::sync::Arc;

    fn seg(name: &str) -> SegmentDefinition {
        SegmentDefinition::new(name).with_field(FieldDefinition::new(DataTypeDefinition::primitive("ST")))
    }

    /// MSH, G(repeating){A, B}, C
    fn message() -> Message {
        let g = GroupDefinition::new("G")
            .with_segment(seg("A"), false, false)
            .with_segment(seg("B"), false, false);
        let root = GroupDefinition::new("MSG")
            .with_segment(seg("MSH"), true, false)
            .with_group(g, false, true)
            .with_segment(seg("C"), false, false);
        Message::new(Arc::new(root))
    }

    fn names(message: &Message, refs: &[StructureRef]) -> Vec<String> {
        refs.iter()
            .map(|r| message.name(r.id).unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_structural_walk_visits_each_slot_once() {
        let mut msg = message();
        let root = msg.root();

        let refs: Vec<StructureRef> = MessageIterator::new(&mut msg, root, NO_MATCH_DIRECTION, false)
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(names(&msg, &refs), vec!["MSH", "G", "A", "B", "C"]);
        assert_eq!(refs[1].kind, StructureKind::Group);
        // only first repetitions are touched
        assert_eq!(msg.get_all(root, "G").unwrap().len(), 1);
    }

    #[test]
    fn test_direction_repeats_matching_slot() {
        let mut msg = message();
        let root = msg.root();
        let g0 = msg.get_structure(root, "G", 0).unwrap();

        let mut it = MessageIterator::new(&mut msg, g0, "B", true);
        let first = it.next().unwrap().unwrap();
        let second = it.next().unwrap().unwrap();
        assert_eq!(it.message().name(first.id).unwrap(), "A");
        assert_eq!(it.message().name(second.id).unwrap(), "B");

        // B is the last slot of G and G repeats and contains B: bump G
        let third = it.next().unwrap().unwrap();
        assert_eq!(third.kind, StructureKind::Group);
        drop(it);
        assert_eq!(msg.get_all(root, "G").unwrap(), vec![g0, third.id]);
    }

    #[test]
    fn test_unknown_direction_synthesizes_segment() {
        let mut msg = message();
        let root = msg.root();
        let c = {
            msg.get_structure(root, "MSH", 0).unwrap();
            msg.get_structure(root, "G", 0).unwrap();
            msg.get_structure(root, "C", 0).unwrap()
        };

        let mut it = MessageIterator::new(&mut msg, c, "ZZZ", true);
        let z0 = it.next().unwrap().unwrap();
        let z1 = it.next().unwrap().unwrap();
        drop(it);

        assert_eq!(msg.names(root).unwrap().last().map(String::as_str), Some("ZZZ"));
        assert_eq!(msg.name(z0.id).unwrap(), "ZZZ");
        assert_eq!(msg.get_all(root, "ZZZ").unwrap(), vec![z0.id, z1.id]);
        assert!(msg.is_generic_segment(z0.id).unwrap());
    }

    #[test]
    fn test_creation_disabled_ends_at_root() {
        let mut msg = message();
        let root = msg.root();
        let c = msg.get_structure(root, "C", 0).unwrap();

        let mut it = MessageIterator::new(&mut msg, c, "ZZZ", false);
        assert!(!it.has_next().unwrap());
        assert!(it.next().is_none());
        drop(it);
        assert_eq!(msg.child_count(root).unwrap(), 3);
    }

    #[test]
    fn test_set_direction_clears_buffer() {
        let mut msg = message();
        let root = msg.root();
        let g0 = msg.get_structure(root, "G", 0).unwrap();
        let a = msg.get_structure(g0, "A", 0).unwrap();
        msg.get_structure(g0, "B", 0).unwrap();

        let mut it = MessageIterator::new(&mut msg, a, NO_MATCH_DIRECTION, false);
        assert!(it.has_next().unwrap());
        it.set_direction("A");
        assert_eq!(it.direction(), "A");
        // A is not repeating, so the direction does not change the answer
        let next = it.next().unwrap().unwrap();
        assert_eq!(it.message().name(next.id).unwrap(), "B");
    }

    #[test]
    fn test_within_bounds_the_walk() {
        let mut msg = message();
        let root = msg.root();
        let g0 = msg.get_structure(root, "G", 0).unwrap();

        let refs: Vec<StructureRef> = MessageIterator::new(&mut msg, g0, NO_MATCH_DIRECTION, false)
            .within(g0)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(names(&msg, &refs), vec!["A", "B"]);
    }

    #[test]
    fn test_get_index_reports_corruption() {
        let mut msg = message();
        let root = msg.root();
        let g0 = msg.get_structure(root, "G", 0).unwrap();
        let g1 = msg.get_structure(root, "G", 1).unwrap();

        assert_eq!(get_index(&msg, root, g1).unwrap(), Index::new("G", 1));

        msg.remove_repetition(root, "G", 0).unwrap();
        let err = get_index(&msg, root, g0).unwrap_err();
        assert!(matches!(err, Error::TreeCorruption(_)));
    }

    #[test]
    fn test_contains_uses_definitions_without_creating() {
        let mut msg = message();
        let root = msg.root();
        let g0 = msg.get_structure(root, "G", 0).unwrap();

        let everything = SearchScope::new(false, false);
        assert!(contains(&msg, g0, "B", everything).unwrap());
        assert!(!contains(&msg, g0, "B", SearchScope::new(true, false)).unwrap());
        assert!(contains(&msg, g0, "B", SearchScope::new(false, true)).unwrap());
        assert!(contains(&msg, root, "A", everything).unwrap());
        assert!(msg.get_all(g0, "A").unwrap().is_empty());
    }

    /// H, A(optional), B(required), C(optional group){Z}
    fn bounded() -> Message {
        let c = GroupDefinition::new("C").with_segment(seg("Z"), false, false);
        let root = GroupDefinition::new("MSG")
            .with_segment(seg("H"), true, false)
            .with_segment(seg("A"), false, false)
            .with_segment(seg("B"), true, false)
            .with_group(c, false, false);
        Message::new(Arc::new(root))
    }

    #[test]
    fn test_lookahead_respects_required_boundary() {
        let mut msg = bounded();
        let root = msg.root();
        msg.get_structure(root, "H", 0).unwrap();
        let pos = Position::new(root, Index::new("H", 0));

        let inclusive = SearchScope::new(false, true);
        let exclusive = inclusive.with_boundary(RequiredBoundary::Exclusive);

        assert!(!match_exists_after_position(&msg, &pos, "Z", inclusive).unwrap());
        assert!(!match_exists_after_position(&msg, &pos, "Z", exclusive).unwrap());
        assert!(match_exists_after_position(&msg, &pos, "B", inclusive).unwrap());
        assert!(!match_exists_after_position(&msg, &pos, "B", exclusive).unwrap());
        assert!(match_exists_after_position(&msg, &pos, "A", exclusive).unwrap());
        assert!(match_exists_after_position(&msg, &pos, "Z", SearchScope::new(false, false)).unwrap());

        // lookahead never instantiates anything
        assert_eq!(msg.get_all(root, "C").unwrap().len(), 0);
    }

    /// MSH, G(repeating){A(required), B}
    fn required_first() -> Message {
        let g = GroupDefinition::new("G")
            .with_segment(seg("A"), true, false)
            .with_segment(seg("B"), false, false);
        let root = GroupDefinition::new("MSG")
            .with_segment(seg("MSH"), true, false)
            .with_group(g, false, true);
        Message::new(Arc::new(root))
    }

    #[test]
    fn test_required_first_child_is_always_inspected() {
        let mut msg = required_first();
        let root = msg.root();
        let g0 = msg.get_structure(root, "G", 0).unwrap();

        let inclusive = SearchScope::new(false, true);
        let exclusive = inclusive.with_boundary(RequiredBoundary::Exclusive);

        assert!(contains(&msg, g0, "A", inclusive).unwrap());
        assert!(contains(&msg, g0, "A", exclusive).unwrap());
        // nothing past the required first child is looked at
        assert!(!contains(&msg, g0, "B", inclusive).unwrap());
        assert!(!contains(&msg, g0, "B", exclusive).unwrap());
        assert!(contains(&msg, g0, "B", SearchScope::new(false, false)).unwrap());
        assert!(msg.get_all(g0, "A").unwrap().is_empty());
    }

    #[test]
    fn test_group_repeats_under_either_boundary() {
        for boundary in [RequiredBoundary::Inclusive, RequiredBoundary::Exclusive] {
            let mut msg = required_first();
            let root = msg.root();
            let g0 = msg.get_structure(root, "G", 0).unwrap();
            msg.get_structure(g0, "A", 0).unwrap();
            let b = msg.get_structure(g0, "B", 0).unwrap();

            let mut it = MessageIterator::new(&mut msg, b, "A", true).with_required_boundary(boundary);
            let next = it.next().unwrap().unwrap();
            drop(it);

            assert_eq!(next.kind, StructureKind::Group, "{boundary:?}");
            assert_eq!(msg.get_all(root, "G").unwrap(), vec![g0, next.id], "{boundary:?}");
            // no nonstandard A2 slot was appended to G
            assert_eq!(msg.names(g0).unwrap(), vec!["A", "B"], "{boundary:?}");
        }
    }

    #[test]
    fn test_index_and_position_display() {
        let msg = message();
        let pos = Position::new(msg.root(), Index::new("PID", 2));
        assert_eq!(pos.index.to_string(), "PID(2)");
        assert_eq!(pos.next_rep().index, Index::new("PID", 3));
    }
}
