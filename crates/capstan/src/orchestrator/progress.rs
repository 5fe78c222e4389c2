//! Progress reporting seam for orchestration runs.

/// Coarse orchestration phases, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestrationPhase {
    Namespace,
    Resolve,
    Sources,
    Values,
    Units,
    Wait,
    Suspend,
    Cleanup,
    Delete,
}

/// Events emitted while an orchestration run progresses.
pub enum ProgressEvent {
    Phase {
        phase: OrchestrationPhase,
        message: String,
    },
    Completed {
        units: Vec<String>,
    },
    Failed {
        error: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests and embedding.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}
