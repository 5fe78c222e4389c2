//! Dry-run platform client: reports every operation instead of talking to a
//! cluster, tracking unit names so convergence waits finish immediately.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use capstan::platform::{GitSourceSpec, OciSourceSpec, PlatformError};
use capstan::{PlatformClient, UnitSpec};
use log::info;

#[derive(Default)]
pub struct DryRunClient {
    units: Mutex<BTreeSet<String>>,
}

impl DryRunClient {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlatformClient for DryRunClient {
    fn create_namespace(&self, name: &str) -> Result<(), PlatformError> {
        info!("dry-run: create namespace '{}'", name);
        Ok(())
    }

    fn delete_namespace(&self, name: &str) -> Result<(), PlatformError> {
        info!("dry-run: delete namespace '{}'", name);
        Ok(())
    }

    fn apply_git_source(&self, spec: &GitSourceSpec) -> Result<(), PlatformError> {
        info!(
            "dry-run: apply GitRepository '{}/{}' from {}",
            spec.namespace, spec.name, spec.url
        );
        Ok(())
    }

    fn apply_oci_source(&self, spec: &OciSourceSpec) -> Result<(), PlatformError> {
        info!(
            "dry-run: apply OCIRepository '{}/{}' from {} (tag {})",
            spec.namespace,
            spec.name,
            spec.url,
            spec.tag.as_deref().unwrap_or("-")
        );
        Ok(())
    }

    fn apply_config_values(
        &self,
        name: &str,
        namespace: &str,
        values: &BTreeMap<String, String>,
    ) -> Result<(), PlatformError> {
        info!(
            "dry-run: apply ConfigMap '{}/{}' with {} values",
            namespace,
            name,
            values.len()
        );
        Ok(())
    }

    fn apply_unit(&self, spec: &UnitSpec) -> Result<(), PlatformError> {
        info!(
            "dry-run: apply Kustomization '{}/{}' (path {}, source {} '{}')",
            spec.namespace, spec.name, spec.path, spec.source.kind, spec.source.name
        );
        if let Ok(mut units) = self.units.lock() {
            units.insert(spec.name.clone());
        }
        Ok(())
    }

    fn delete_unit(&self, name: &str, namespace: &str) -> Result<(), PlatformError> {
        info!("dry-run: delete Kustomization '{}/{}'", namespace, name);
        if let Ok(mut units) = self.units.lock() {
            units.remove(name);
        }
        Ok(())
    }

    fn suspend_unit(&self, name: &str, namespace: &str) -> Result<(), PlatformError> {
        info!("dry-run: suspend Kustomization '{}/{}'", namespace, name);
        Ok(())
    }

    fn suspend_dependent(&self, name: &str, namespace: &str) -> Result<(), PlatformError> {
        info!("dry-run: suspend dependent HelmRelease '{}/{}'", namespace, name);
        Ok(())
    }

    fn list_dependents(
        &self,
        _name: &str,
        _namespace: &str,
    ) -> Result<Vec<String>, PlatformError> {
        Ok(Vec::new())
    }

    fn unit_ready_map(&self, names: &[String]) -> Result<BTreeMap<String, bool>, PlatformError> {
        let units = self
            .units
            .lock()
            .map_err(|_| PlatformError::Transport("unit set lock poisoned".to_string()))?;
        Ok(names
            .iter()
            .filter(|name| units.contains(*name))
            .map(|name| (name.clone(), true))
            .collect())
    }

    fn transport_health(&self) -> Result<(), PlatformError> {
        Ok(())
    }
}
