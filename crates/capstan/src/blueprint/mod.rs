//! Blueprint handling: the typed data model, the layered resolution
//! pipeline, and the dependency-graph algorithms.
//!
//! A blueprint is resolved once per invocation from the highest-precedence
//! available input (override file, templated file, built-in template), merged
//! into the session's working state, and persisted back in a reduced form.

pub mod error;
pub mod graph;
pub mod loader;
pub mod model;

pub use error::BlueprintError;
pub use loader::{
    BlueprintLoader, TemplateData, BLUEPRINT_FILE, BLUEPRINT_TEMPLATE_FILE, TEMPLATE_DATA_DIR,
};
pub use model::{
    Blueprint, Kustomization, Metadata, Patch, PostBuild, Reference, Repository, Source,
    SubstituteReference, TerraformComponent, DEFAULT_INTERVAL_SECS, DEFAULT_PATH_PREFIX,
    DEFAULT_RETRY_INTERVAL_SECS, DEFAULT_TIMEOUT_SECS, KUSTOMIZE_DIR,
};
