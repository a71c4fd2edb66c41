#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # hl7-model
//!
//! Structure tree model for HL7 v2 messages.
//!
//! A [`Message`] is instantiated from a [`GroupDefinition`] tree. Groups and
//! segments are created lazily the first time a slot is addressed and are
//! referenced through copyable [`StructureId`] handles, so navigation code can
//! move up and down the tree without holding borrows into it.

/// Schema declarations for groups, segments, fields and datatypes.
pub mod definition;
/// Message arena with the group and segment operations.
pub mod message;
/// Field datatypes: primitives, composites and varies.
pub mod types;

/// Declarations a message tree is instantiated from.
pub use definition::{
    ChildDefinition, DataTypeDefinition, FieldDefinition, GroupDefinition, SegmentDefinition,
    StructureDefinition,
};
/// Message arena and the handles used to address its structures.
pub use message::{Message, StructureId, StructureKind, StructureRef};
/// Field datatype values.
pub use types::{Composite, ExtraComponents, Primitive, Type, Varies};

use thiserror::Error;

/// Errors raised by the structure model for structurally invalid requests
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid structure handle: {0}")]
    InvalidHandle(usize),

    #[error("{group} has no child named {name}")]
    UnknownChild { group: String, name: String },

    #[error(
        "Can't get repetition {rep} of {name} from {group}: there are currently only {count} repetitions"
    )]
    RepetitionOutOfRange {
        group: String,
        name: String,
        rep: usize,
        count: usize,
    },

    #[error("Can't create repetition {rep} of {name}: this structure is non-repeating")]
    NonRepeating { name: String, rep: usize },

    #[error("Field {field} is out of range for segment {segment} ({count} fields)")]
    FieldOutOfRange {
        segment: String,
        field: usize,
        count: usize,
    },

    #[error(
        "Can't get repetition {rep} of field {field} in {segment}: there are currently only {count} repetitions"
    )]
    FieldRepetitionOutOfRange {
        segment: String,
        field: usize,
        rep: usize,
        count: usize,
    },

    #[error("Field {field} of segment {segment} is limited to {max} repetitions")]
    FieldRepetitionLimit {
        segment: String,
        field: usize,
        max: usize,
    },

    #[error("{0} is not a group")]
    NotAGroup(String),

    #[error("{0} is not a segment")]
    NotASegment(String),

    #[error("Invalid definition: {0}")]
    InvalidDefinition(String),
}

impl Error {
    /// Build an unknown-child error for a group slot lookup.
    pub fn unknown_child(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self::UnknownChild {
            group: group.into(),
            name: name.into(),
        }
    }

    /// Build an invalid-definition error.
    pub fn invalid_definition(message: impl Into<String>) -> Self {
        Self::InvalidDefinition(message.into())
    }
}

/// Crate-local result type for model operations.
pub type Result<T> = std::result::Result<T, Error>;
