use thiserror::Error;

use crate::blueprint::BlueprintError;
use crate::context::ContextError;
use crate::orchestrator::OrchestrationError;
use crate::platform::PlatformError;
use crate::projection::ProjectionError;
use crate::template::TemplateError;

#[derive(Error, Debug)]
pub enum CapstanError {
    #[error("Blueprint error: {0}")]
    Blueprint(#[from] BlueprintError),

    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Orchestration error: {0}")]
    Orchestration(#[from] OrchestrationError),
}

pub type Result<T> = std::result::Result<T, CapstanError>;
