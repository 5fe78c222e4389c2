//! Resource projection: turns blueprint declarations into the concrete shapes
//! the platform client applies.
//!
//! Projection is a read-mostly layer. The canonical blueprint is never touched;
//! the orchestrator enriches a clone via [`resolve_component_sources`] and
//! [`resolve_component_paths`], then projects sources, patches and values per
//! unit on demand.

pub mod origin;
pub mod patches;
pub mod terraform;
pub mod values;

pub use origin::{origin_of, project_git_source, project_oci_source, split_oci_reference, Origin};
pub use patches::resolve_patches;
pub use terraform::{resolve_component_paths, resolve_component_sources};
pub use values::{
    generate_build_id, load_value_overrides, system_values, unit_substitutions,
    validate_substitution_values, VALUES_OVERRIDE_FILE,
};

use std::fmt;
use std::path::PathBuf;

/// Errors raised while projecting blueprint declarations.
///
/// Implemented by hand rather than with `derive(Error)`: thiserror reserves
/// any field named `source` for error chaining, but `UnknownSource::source`
/// is the referenced blueprint source *name*, not a nested error.
#[derive(Debug)]
pub enum ProjectionError {
    /// A substitution value broke the scalar-at-one-level nesting rule.
    InvalidValue { path: String, reason: String },

    /// A component references a source that is neither declared nor a locator.
    UnknownSource { component: String, source: String },

    /// A patch or values file could not be read.
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A patch or values file held invalid YAML.
    Decode { path: String, message: String },

    /// A resolved patch body could not be re-serialized.
    Serialize(String),
}

impl fmt::Display for ProjectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { path, reason } => {
                write!(f, "Invalid substitution value at '{path}': {reason}")
            }
            Self::UnknownSource { component, source } => {
                write!(
                    f,
                    "Component '{component}' references unknown source '{source}'"
                )
            }
            Self::ReadFile { path, .. } => write!(f, "Failed to read {path:?}"),
            Self::Decode { path, message } => write!(f, "Failed to parse {path}: {message}"),
            Self::Serialize(message) => write!(f, "Failed to serialize patch body: {message}"),
        }
    }
}

impl std::error::Error for ProjectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProjectionError>;
