//! # hl7-schema
//!
//! Loads HL7 v2 message structure definitions from YAML or JSON files.
//!
//! A structure file declares composite datatypes, segments and the group tree
//! of one message structure. [`StructureLoader`] searches a list of
//! directories for the file, converts it into a validated
//! [`GroupDefinition`](hl7_model::GroupDefinition) and caches the result in a
//! [`DefinitionRegistry`] that can be shared between threads.

pub mod loader;
pub mod registry;

pub use loader::StructureLoader;
pub use registry::DefinitionRegistry;

use thiserror::Error;

/// Errors that can occur when loading structure definitions
#[derive(Error, Debug)]
pub enum Error {
    #[error("Structure definition not found: {0}")]
    NotFound(String),

    #[error("Invalid structure file format: {0}")]
    InvalidFormat(String),

    #[error("Invalid structure definition: {0}")]
    InvalidDefinition(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Model(#[from] hl7_model::Error),
}

impl Error {
    pub fn invalid_definition(message: impl Into<String>) -> Self {
        Self::InvalidDefinition(message.into())
    }
}

/// Result type for structure loading
pub type Result<T> = std::result::Result<T, Error>;
