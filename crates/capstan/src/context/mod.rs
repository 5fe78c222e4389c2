//! Collaborator seams: the configuration store that owns typed context
//! settings and the shell that knows the project root.

pub mod shell;
pub mod store;

pub use shell::{ProjectShell, Shell};
pub use store::{ConfigStore, InMemoryStore};

use thiserror::Error;

/// Errors from the context collaborators.
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Configuration root is not available: {0}")]
    ConfigRoot(String),

    #[error("Project root is not available: {0}")]
    ProjectRoot(String),

    #[error("Failed to update context value '{key}': {reason}")]
    SetValue { key: String, reason: String },
}
