pub mod blueprint;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod platform;
pub mod projection;
pub mod template;

pub use blueprint::{Blueprint, BlueprintError, BlueprintLoader, TemplateData};
pub use context::{ConfigStore, ContextError, InMemoryStore, ProjectShell, Shell};
pub use error::{CapstanError, Result};
pub use orchestrator::{
    NoopProgress, OrchestrationError, OrchestrationPhase, Orchestrator, ProgressEvent,
    ProgressReporter,
};
pub use platform::{PlatformClient, PlatformError, UnitSpec};
pub use projection::ProjectionError;
pub use template::{SubstitutionEvaluator, TemplateError, TemplateEvaluator};
