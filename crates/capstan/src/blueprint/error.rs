//! Blueprint-resolution error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::context::ContextError;
use crate::template::TemplateError;

/// Errors that can occur while resolving or persisting a blueprint.
#[derive(Error, Debug)]
pub enum BlueprintError {
    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse blueprint in '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Failed to decode unit '{name}': {message}")]
    UnitDecode { name: String, message: String },

    #[error("Failed to serialize blueprint: {0}")]
    Serialize(String),

    #[error("Failed to serialize template context: {0}")]
    Context(String),

    #[error("Template evaluation failed: {0}")]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Store(#[from] ContextError),
}

/// Result type for blueprint resolution.
pub type Result<T> = std::result::Result<T, BlueprintError>;
