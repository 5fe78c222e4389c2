//! Orchestration error taxonomy.

use std::time::Duration;

use thiserror::Error;

use crate::blueprint::BlueprintError;
use crate::context::ContextError;
use crate::platform::PlatformError;
use crate::projection::ProjectionError;

/// Errors surfaced by the orchestration driver and the wait engine.
///
/// Transport and status-fetch failures are recoverable inside the wait loop
/// up to the consecutive-failure threshold; everything else aborts the run
/// immediately.
#[derive(Error, Debug)]
pub enum OrchestrationError {
    /// The transport health probe failed too many times in a row.
    #[error("Platform transport failed {count} consecutive times")]
    TransportFailures { count: u32 },

    /// The unit status fetch failed too many times in a row.
    #[error("Unit status fetch failed {count} consecutive times")]
    StatusFailures { count: u32 },

    /// The overall wait deadline elapsed before convergence.
    #[error("Timed out after {}s waiting for units to converge", .waited.as_secs())]
    Timeout { waited: Duration },

    /// A platform operation failed, carrying the operation and target name.
    #[error("Failed to {operation} '{name}'")]
    Operation {
        operation: String,
        name: String,
        #[source]
        source: PlatformError,
    },

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Blueprint(#[from] BlueprintError),

    #[error(transparent)]
    Context(#[from] ContextError),
}

impl OrchestrationError {
    pub(crate) fn operation(
        operation: impl Into<String>,
        name: impl Into<String>,
        source: PlatformError,
    ) -> Self {
        OrchestrationError::Operation {
            operation: operation.into(),
            name: name.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestrationError>;
