#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # hl7-terser
//!
//! Navigation and terse path addressing for HL7 v2 message trees.
//!
//! The layers build on each other:
//!
//! - [`MessageIterator`] decides the next structural position in depth-first
//!   order, creating repetitions or nonstandard segments when asked to.
//! - [`MessageNavigator`] is a cursor with drill-down/drill-up primitives.
//! - [`SegmentFinder`] adds wildcard lookup of segments and groups.
//! - [`Terser`] maps a path such as `"/.OBR-15(0)-1-2"` onto a primitive value.
//! - [`deep_copy`] copies values between structurally similar types.

/// Navigation and copy settings.
pub mod config;
/// Primitive-by-primitive copying of types and segments.
pub mod deep_copy;
/// Lazy predicate filter over any iterator.
pub mod filter_iterator;
/// Depth-first structural iteration with on-demand synthesis.
pub mod message_iterator;
/// Stateful cursor over a message tree.
pub mod navigator;
/// Terse path grammar.
pub mod path;
/// Wildcard segment and group lookup.
pub mod segment_finder;
/// Path-based get/set of primitive values.
pub mod terser;

/// Settings shared by the navigation layers.
pub use config::{NavigationConfig, RequiredBoundary, SegmentCopyPolicy};
/// Predicate filtering for structure walks.
pub use filter_iterator::{FilterIterator, Predicate};
/// Structural iteration and the positions it reports.
pub use message_iterator::{Index, MessageIterator, Position, SearchScope};
/// Cursor over a message tree.
pub use navigator::MessageNavigator;
/// Parsed terse path forms.
pub use path::{FieldLocation, PathElement, SegmentPath, TerserPath};
/// Wildcard lookup entry point.
pub use segment_finder::SegmentFinder;
/// Path-based value access.
pub use terser::Terser;

use thiserror::Error;

/// Errors raised while navigating or addressing a message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid path '{path}': {reason}")]
    MalformedPath { path: String, reason: String },

    #[error("The pattern {0} is not valid; only [\\w*?]* is allowed")]
    InvalidPattern(String),

    #[error("Structural error: {0}")]
    Structural(String),

    #[error("Can't find {0}")]
    NotFound(String),

    #[error("End of message reached while iterating without loop")]
    EndOfMessage,

    #[error("Message tree is corrupt: {0}")]
    TreeCorruption(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error(transparent)]
    Model(#[from] hl7_model::Error),
}

impl Error {
    /// Build a malformed-path error with the offending path and reason.
    pub fn malformed_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Build a structural-mismatch error.
    pub fn structural(message: impl Into<String>) -> Self {
        Self::Structural(message.into())
    }

    /// Build a not-found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Build a tree-corruption error.
    pub fn tree_corruption(message: impl Into<String>) -> Self {
        Self::TreeCorruption(message.into())
    }

    /// Whether the error reports absence rather than bad input or a bad tree.
    ///
    /// Callers treating a missing optional structure as a normal outcome can
    /// branch on this.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::EndOfMessage)
    }
}

/// Crate-local result type for navigation operations.
pub type Result<T> = std::result::Result<T, Error>;
