//! The client trait the orchestrator drives the platform through.

use std::collections::BTreeMap;

use super::resource::{GitSourceSpec, OciSourceSpec, UnitSpec};
use super::PlatformError;

/// Synchronous client for the remote orchestration platform.
///
/// One call maps to one platform operation; retries, batching and connection
/// pooling all live behind the implementation. Deletion completion is
/// observed by polling [`unit_ready_map`](Self::unit_ready_map) until the
/// names drop out of the result, so the trait carries no blocking wait calls.
pub trait PlatformClient: Send + Sync {
    /// Creates the namespace if it does not exist yet.
    fn create_namespace(&self, name: &str) -> Result<(), PlatformError>;

    /// Deletes the namespace and everything in it.
    fn delete_namespace(&self, name: &str) -> Result<(), PlatformError>;

    fn apply_git_source(&self, spec: &GitSourceSpec) -> Result<(), PlatformError>;

    fn apply_oci_source(&self, spec: &OciSourceSpec) -> Result<(), PlatformError>;

    /// Applies a flat key/value map as the named shared values resource.
    fn apply_config_values(
        &self,
        name: &str,
        namespace: &str,
        values: &BTreeMap<String, String>,
    ) -> Result<(), PlatformError>;

    fn apply_unit(&self, spec: &UnitSpec) -> Result<(), PlatformError>;

    fn delete_unit(&self, name: &str, namespace: &str) -> Result<(), PlatformError>;

    /// Marks the unit suspended so the platform stops reconciling it.
    fn suspend_unit(&self, name: &str, namespace: &str) -> Result<(), PlatformError>;

    /// Suspends one dependent resource discovered under a suspended unit.
    fn suspend_dependent(&self, name: &str, namespace: &str) -> Result<(), PlatformError>;

    /// Names of the dependent resources the platform manages under a unit.
    fn list_dependents(&self, name: &str, namespace: &str)
        -> Result<Vec<String>, PlatformError>;

    /// Ready state per existing unit. Units absent from the returned map do
    /// not exist on the platform (any more).
    fn unit_ready_map(&self, names: &[String]) -> Result<BTreeMap<String, bool>, PlatformError>;

    /// Cheap transport probe used to distinguish connectivity loss from
    /// units that are merely slow to converge.
    fn transport_health(&self) -> Result<(), PlatformError>;
}
