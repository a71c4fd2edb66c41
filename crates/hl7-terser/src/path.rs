//! Terse location paths
//!
//! ```text
//! location      := segment_path "-" field ["(" rep ")"] ["-" component ["-" subcomponent]]
//! segment_path  := ["/"] (element "/")* element
//! element       := ["."] name_pattern ["(" rep ")"]
//! ```
//!
//! Field, component and subcomponent numbers are 1-based; repetitions are
//! 0-based. Omitted repetitions default to 0, omitted component and
//! subcomponent to 1.

use crate::{Error, Result};
use std::str::FromStr;

const EMPTY_ELEMENT: &str = "some path element is either empty or contains only a dot";

/// One `/`-separated step of a segment path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathElement {
    /// Structure name, possibly with `*` and `?` wildcards
    pub pattern: String,

    /// Repetition to address (0-based)
    pub rep: usize,

    /// Search forward for the structure instead of looking among direct children
    pub find: bool,
}

/// Path to a segment: zero or more groups followed by the segment itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPath {
    /// Starts from the message root rather than the current position
    pub absolute: bool,

    pub elements: Vec<PathElement>,
}

/// Position of a primitive value inside a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldLocation {
    pub field: usize,
    pub rep: usize,
    pub component: usize,
    pub subcomponent: usize,
}

/// A fully parsed terse path such as `/.ORDER*/OBR(0)-15(1)-2-1`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerserPath {
    pub segment: SegmentPath,
    pub location: FieldLocation,
}

impl PathElement {
    pub fn new(pattern: impl Into<String>, rep: usize, find: bool) -> Self {
        Self {
            pattern: pattern.into(),
            rep,
            find,
        }
    }

    fn parse(raw: &str, path: &str) -> Result<Self> {
        let (find, body) = match raw.strip_prefix('.') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        if body.is_empty() {
            return Err(Error::malformed_path(path, EMPTY_ELEMENT));
        }

        let (pattern, rep) = split_rep(body, path)?;
        if pattern.is_empty() {
            return Err(Error::malformed_path(
                path,
                format!("missing structure name in '{raw}'"),
            ));
        }
        Ok(Self::new(pattern, rep, find))
    }
}

impl SegmentPath {
    /// The segment element and the group elements leading to it
    pub fn split(&self) -> Option<(&PathElement, &[PathElement])> {
        self.elements.split_last()
    }

    fn parse(raw: &str, path: &str) -> Result<Self> {
        let (absolute, rest) = match raw.strip_prefix('/') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let elements = rest
            .split('/')
            .map(|raw| PathElement::parse(raw, path))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { absolute, elements })
    }
}

impl FromStr for SegmentPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s, s)
    }
}

impl FieldLocation {
    /// First component and subcomponent of a field repetition
    pub fn new(field: usize, rep: usize) -> Self {
        Self {
            field,
            rep,
            component: 1,
            subcomponent: 1,
        }
    }

    pub fn with_component(mut self, component: usize, subcomponent: usize) -> Self {
        self.component = component;
        self.subcomponent = subcomponent;
        self
    }
}

impl FromStr for TerserPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut tokens = s.split('-');
        let segment = SegmentPath::parse(tokens.next().unwrap_or_default(), s)?;

        let field_token = tokens
            .next()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| Error::malformed_path(s, "must specify field"))?;
        let (field, rep) = split_rep(field_token, s)?;
        let field = parse_index(field, "field", s)?;

        let component = match tokens.next() {
            Some(token) => parse_index(token, "component", s)?,
            None => 1,
        };
        let subcomponent = match tokens.next() {
            Some(token) => parse_index(token, "subcomponent", s)?,
            None => 1,
        };
        if let Some(extra) = tokens.next() {
            return Err(Error::malformed_path(
                s,
                format!("unexpected '{extra}' after the subcomponent"),
            ));
        }

        Ok(Self {
            segment,
            location: FieldLocation {
                field,
                rep,
                component,
                subcomponent,
            },
        })
    }
}

/// Split `NAME(rep)` into the name and the repetition (0 when omitted)
fn split_rep<'a>(token: &'a str, path: &str) -> Result<(&'a str, usize)> {
    match token.split_once('(') {
        None => Ok((token, 0)),
        Some((name, rest)) => {
            let digits = rest.strip_suffix(')').ok_or_else(|| {
                Error::malformed_path(path, format!("unclosed repetition in '{token}'"))
            })?;
            Ok((name, parse_number(digits, path)?))
        }
    }
}

fn parse_number(token: &str, path: &str) -> Result<usize> {
    token
        .parse()
        .map_err(|_| Error::malformed_path(path, format!("'{token}' is not a valid number")))
}

/// Parse a 1-based index
fn parse_index(token: &str, what: &str, path: &str) -> Result<usize> {
    match parse_number(token, path)? {
        0 => Err(Error::malformed_path(path, format!("{what} numbers start at 1"))),
        n => Ok(n),
    }
}
