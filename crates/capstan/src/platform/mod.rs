//! Remote-platform seam: the narrow client trait and the projected resource
//! shapes it accepts.

pub mod client;
pub mod resource;

pub use client::PlatformClient;
pub use resource::{
    GitSourceSpec, OciSourceSpec, PatchTarget, PostBuildSpec, ResolvedPatch, SourceKind,
    SourceSelector, UnitSpec,
};

use thiserror::Error;

/// Errors surfaced by the platform client.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// Transport-level failure reaching the platform.
    #[error("Platform transport error: {0}")]
    Transport(String),

    /// The platform accepted the connection but failed the operation.
    #[error("Platform operation '{operation}' failed: {message}")]
    Api { operation: String, message: String },
}
