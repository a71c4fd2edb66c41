//! Stateful cursor over a message tree

use crate::config::NavigationConfig;
use crate::filter_iterator::FilterIterator;
use crate::message_iterator::{get_index, MessageIterator, NO_MATCH_DIRECTION};
use crate::{Error, Result};
use hl7_model::{Message, StructureId, StructureKind, StructureRef};
use tracing::trace;

/// A group on the ancestor stack and the child slot that was drilled into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GroupContext {
    group: StructureId,
    child: usize,
}

/// Cursor over one group subtree of a message.
///
/// The cursor points at a child slot of the current group. Only at the
/// navigator root can it instead point at the group itself, which is where
/// it starts and where [`reset`](Self::reset) returns it.
pub struct MessageNavigator<'m> {
    message: &'m mut Message,
    root: StructureId,
    ancestors: Vec<GroupContext>,
    current_group: StructureId,
    current_child: Option<usize>,
    config: NavigationConfig,
}

impl<'m> MessageNavigator<'m> {
    /// Navigator over the whole message, positioned at the root
    pub fn new(message: &'m mut Message) -> Self {
        Self::with_config(message, NavigationConfig::default())
    }

    pub fn with_config(message: &'m mut Message, config: NavigationConfig) -> Self {
        let root = message.root();
        Self {
            message,
            root,
            ancestors: Vec::new(),
            current_group: root,
            current_child: None,
            config,
        }
    }

    /// Navigator over the subtree below `root`, which must be a group
    pub fn rooted(message: &'m mut Message, root: StructureId, config: NavigationConfig) -> Result<Self> {
        if !message.is_group(root)? {
            return Err(Error::structural(format!(
                "can't navigate within segment {}",
                message.name(root)?
            )));
        }
        Ok(Self {
            message,
            root,
            ancestors: Vec::new(),
            current_group: root,
            current_child: None,
            config,
        })
    }

    pub fn root(&self) -> StructureId {
        self.root
    }

    pub fn current_group(&self) -> StructureId {
        self.current_group
    }

    /// Index of the current child slot, `None` when at the root itself
    pub fn current_child(&self) -> Option<usize> {
        self.current_child
    }

    /// Number of groups drilled into below the root
    pub fn depth(&self) -> usize {
        self.ancestors.len()
    }

    pub fn config(&self) -> &NavigationConfig {
        &self.config
    }

    pub fn message(&self) -> &Message {
        &*self.message
    }

    pub fn message_mut(&mut self) -> &mut Message {
        &mut *self.message
    }

    /// Descend into repetition `rep` of the group at child slot `child`.
    ///
    /// The cursor ends up at the first child of that group. Drilling into a
    /// segment slot is an error and creates nothing.
    pub fn drill_down(&mut self, child: usize, rep: usize) -> Result<()> {
        let name = self.message.child_name(self.current_group, child)?.to_string();
        if !self.message.child_definition(self.current_group, &name)?.is_group() {
            return Err(Error::structural(format!("can't drill into segment {name}")));
        }

        let group = self.message.get_structure(self.current_group, &name, rep)?;
        self.ancestors.push(GroupContext {
            group: self.current_group,
            child,
        });
        self.current_group = group;
        self.current_child = Some(0);
        trace!(group = %name, rep, depth = self.ancestors.len(), "drilled down");
        Ok(())
    }

    /// Move from the root itself to its first child
    pub fn drill_into_first_child(&mut self) {
        self.current_child = Some(0);
    }

    /// Return to the parent group, or to the root itself once at the top.
    ///
    /// Returns false only when already positioned at the root itself.
    pub fn drill_up(&mut self) -> bool {
        match self.ancestors.pop() {
            Some(context) => {
                self.current_group = context.group;
                self.current_child = Some(context.child);
                true
            }
            None if self.current_child.is_none() => false,
            None => {
                self.current_child = None;
                true
            }
        }
    }

    pub fn has_next_child(&self) -> Result<bool> {
        let count = self.message.child_count(self.current_group)?;
        Ok(match self.current_child {
            Some(child) => child + 1 < count,
            None => count > 0,
        })
    }

    pub fn next_child(&mut self) -> Result<()> {
        let next = self.current_child.map_or(0, |child| child + 1);
        self.to_child(next)
    }

    pub fn to_child(&mut self, child: usize) -> Result<()> {
        let count = self.message.child_count(self.current_group)?;
        if child >= count {
            return Err(Error::structural(format!(
                "can't advance to child {child}: only {count} children"
            )));
        }
        self.current_child = Some(child);
        Ok(())
    }

    /// Back to the root itself with an empty ancestor stack
    pub fn reset(&mut self) {
        self.ancestors.clear();
        self.current_group = self.root;
        self.current_child = None;
    }

    /// The structure under the cursor at repetition `rep`, created if needed.
    ///
    /// At the root itself the root group is returned whatever `rep` is.
    pub fn current_structure(&mut self, rep: usize) -> Result<StructureId> {
        match self.current_child {
            Some(child) => {
                let name = self.message.child_name(self.current_group, child)?.to_string();
                Ok(self.message.get_structure(self.current_group, &name, rep)?)
            }
            None => Ok(self.current_group),
        }
    }

    /// Move to the next existing first repetition in depth-first order.
    ///
    /// Never creates structures beyond the first repetition of each slot it
    /// passes. At the end of the root either resets (`loop_`) or fails with
    /// [`Error::EndOfMessage`].
    pub fn iterate(&mut self, segments_only: bool, loop_: bool) -> Result<()> {
        let start = self.current_structure(0)?;
        let root = self.root;
        let boundary = self.config.required_boundary;

        let found = {
            let mut iter = MessageIterator::new(&mut *self.message, start, NO_MATCH_DIRECTION, false)
                .within(root)
                .with_required_boundary(boundary);
            if segments_only {
                FilterIterator::new(iter, keeps_segments).next()
            } else {
                iter.next()
            }
        };

        match found {
            Some(Ok(next)) => self.drill_here(next.id),
            Some(Err(e)) => Err(e),
            None if loop_ => {
                trace!("end of message, looping to root");
                self.reset();
                Ok(())
            }
            None => Err(Error::EndOfMessage),
        }
    }

    /// Position the cursor at `destination`, which must lie under the root.
    ///
    /// Repetitions of the groups on the way are preserved.
    pub fn drill_here(&mut self, destination: StructureId) -> Result<()> {
        let mut path = Vec::new();
        let mut structure = destination;
        while structure != self.root {
            let parent = self.message.parent(structure)?.ok_or_else(|| {
                Error::structural(format!(
                    "{} is not under the navigator root {}",
                    destination, self.root
                ))
            })?;
            let index = get_index(self.message, parent, structure)?;
            let slot = self.message.slot_index(parent, &index.name)?.ok_or_else(|| {
                Error::tree_corruption(format!("slot {} vanished from its group", index.name))
            })?;
            path.push((slot, index.rep));
            structure = parent;
        }
        path.reverse();

        self.reset();
        if let Some(((slot, _), groups)) = path.split_last() {
            for &(child, rep) in groups {
                self.drill_down(child, rep)?;
            }
            self.to_child(*slot)?;
        }
        Ok(())
    }
}

/// Errors pass through so the caller sees them
fn keeps_segments(item: &Result<StructureRef>) -> bool {
    match item {
        Ok(structure) => structure.kind == StructureKind::Segment,
        Err(_) => true,
    }
}
