pub mod driver;
pub mod error;
pub mod progress;
pub mod wait;

pub use driver::{Orchestrator, CLEANUP_NAMESPACE, PLATFORM_NAMESPACE, SHARED_VALUES_NAME};
pub use error::OrchestrationError;
pub use progress::{NoopProgress, OrchestrationPhase, ProgressEvent, ProgressReporter};
pub use wait::{ConvergenceWaiter, FAILURE_THRESHOLD, POLL_INTERVAL};
