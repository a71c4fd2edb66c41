//! Wildcard lookup of segments and groups on top of a navigator

use crate::config::NavigationConfig;
use crate::navigator::MessageNavigator;
use crate::{Error, Result};
use hl7_model::{Message, StructureId, StructureKind};
use regex::Regex;
use tracing::debug;

/// Word characters (Unicode `\w`) plus the two wildcards
const VALID_PATTERN: &str = r"^[\w*?]*$";

/// A compiled structure name pattern.
///
/// `*` matches any run of characters and `?` any single character; every
/// other character must be a word character.
#[derive(Debug, Clone)]
struct NamePattern {
    pattern: String,
    regex: Regex,
}

impl NamePattern {
    fn new(pattern: &str) -> Result<Self> {
        let valid = Regex::new(VALID_PATTERN).is_ok_and(|check| check.is_match(pattern));
        if !valid {
            return Err(Error::InvalidPattern(pattern.to_string()));
        }
        let translated = pattern.replace('*', ".*").replace('?', ".");
        let regex = Regex::new(&format!("^(?:{translated})$"))
            .map_err(|_| Error::InvalidPattern(pattern.to_string()))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    fn is_match(&self, candidate: &str) -> bool {
        self.pattern == candidate || self.regex.is_match(candidate)
    }
}

/// A [`MessageNavigator`] that can look up segments and groups by name.
///
/// Searches resume from wherever the previous call left the cursor, so
/// successive finds move forward through the message. Call
/// [`reset`](Self::reset) to start over from the root.
pub struct SegmentFinder<'m> {
    navigator: MessageNavigator<'m>,
}

impl<'m> SegmentFinder<'m> {
    pub fn new(message: &'m mut Message) -> Self {
        Self::with_config(message, NavigationConfig::default())
    }

    pub fn with_config(message: &'m mut Message, config: NavigationConfig) -> Self {
        Self {
            navigator: MessageNavigator::with_config(message, config),
        }
    }

    /// Finder over the subtree below the group `root`
    pub fn rooted(message: &'m mut Message, root: StructureId, config: NavigationConfig) -> Result<Self> {
        Ok(Self {
            navigator: MessageNavigator::rooted(message, root, config)?,
        })
    }

    pub fn navigator(&self) -> &MessageNavigator<'m> {
        &self.navigator
    }

    pub fn navigator_mut(&mut self) -> &mut MessageNavigator<'m> {
        &mut self.navigator
    }

    pub fn message(&self) -> &Message {
        self.navigator.message()
    }

    pub fn message_mut(&mut self) -> &mut Message {
        self.navigator.message_mut()
    }

    pub fn reset(&mut self) {
        self.navigator.reset();
    }

    /// Whether `candidate` matches the name pattern `pattern`
    pub fn matches(pattern: &str, candidate: &str) -> Result<bool> {
        if pattern == candidate {
            return Ok(true);
        }
        Ok(NamePattern::new(pattern)?.is_match(candidate))
    }

    /// Search forward for a segment whose name matches `pattern` and return
    /// repetition `rep` of it
    pub fn find_segment(&mut self, pattern: &str, rep: usize) -> Result<StructureId> {
        self.find_structure(pattern, rep, StructureKind::Segment)
    }

    /// Search forward for a group whose name matches `pattern` and return
    /// repetition `rep` of it
    pub fn find_group(&mut self, pattern: &str, rep: usize) -> Result<StructureId> {
        self.find_structure(pattern, rep, StructureKind::Group)
    }

    /// Repetition `rep` of a segment among the direct children of the current group
    pub fn get_segment(&mut self, pattern: &str, rep: usize) -> Result<StructureId> {
        self.get_structure(pattern, rep, StructureKind::Segment)
    }

    /// Repetition `rep` of a group among the direct children of the current group
    pub fn get_group(&mut self, pattern: &str, rep: usize) -> Result<StructureId> {
        self.get_structure(pattern, rep, StructureKind::Group)
    }

    fn find_structure(&mut self, pattern: &str, rep: usize, kind: StructureKind) -> Result<StructureId> {
        let matcher = NamePattern::new(pattern)?;
        loop {
            self.navigator.iterate(false, false).map_err(|e| match e {
                Error::EndOfMessage => Error::not_found(pattern),
                other => other,
            })?;

            let current = self.navigator.current_structure(0)?;
            let name = self.navigator.message().name(current)?;
            if matcher.is_match(name) {
                debug!(pattern, structure = name, rep, "found structure");
                self.check_current_kind(kind)?;
                return self.navigator.current_structure(rep);
            }
        }
    }

    fn get_structure(&mut self, pattern: &str, rep: usize, kind: StructureKind) -> Result<StructureId> {
        let matcher = NamePattern::new(pattern)?;
        if self.navigator.current_child().is_none() {
            self.navigator.drill_into_first_child();
        }

        let group = self.navigator.current_group();
        let names = self.navigator.message().names(group)?;
        let child = names
            .iter()
            .position(|name| matcher.is_match(name))
            .ok_or_else(|| Error::not_found(format!("{pattern} as a direct child")))?;

        self.navigator.to_child(child)?;
        self.check_current_kind(kind)?;
        self.navigator.current_structure(rep)
    }

    /// Compare the declared kind of the slot under the cursor with `expected`
    fn check_current_kind(&self, expected: StructureKind) -> Result<()> {
        let group = self.navigator.current_group();
        let Some(child) = self.navigator.current_child() else {
            return Ok(());
        };
        let message = self.navigator.message();
        let slot = message.child_name(group, child)?;
        let is_group = message.child_definition(group, slot)?.is_group();
        match (expected, is_group) {
            (StructureKind::Segment, true) => Err(Error::structural(format!("{slot} is not a segment"))),
            (StructureKind::Group, false) => Err(Error::structural(format!("{slot} is not a group"))),
            _ => Ok(()),
        }
    }
}
