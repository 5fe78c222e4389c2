//! Test harness for isolated end-to-end runs: a config root on disk, a
//! project root, an in-memory context store, and a platform recorder.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use assert_fs::prelude::*;
use assert_fs::TempDir;
use serde_yaml::Value;

use capstan::context::{InMemoryStore, ProjectShell};
use capstan::platform::{GitSourceSpec, OciSourceSpec, PlatformError};
use capstan::{PlatformClient, UnitSpec};

/// Isolated environment for one orchestration run.
pub struct Harness {
    /// Directory the store reports as its config root.
    pub config_root: TempDir,
    /// Directory the shell reports as the project root.
    pub project_root: TempDir,
    /// Context store rooted at `config_root`.
    pub store: InMemoryStore,
}

impl Harness {
    pub fn new(context: &str) -> Self {
        Self::with_settings(context, "{}")
    }

    pub fn with_settings(context: &str, settings_yaml: &str) -> Self {
        let config_root = TempDir::new().expect("Failed to create config root");
        let project_root = TempDir::new().expect("Failed to create project root");
        let settings: Value =
            serde_yaml::from_str(settings_yaml).expect("Invalid settings fixture");
        let store = InMemoryStore::new(context, config_root.path()).with_settings(settings);
        Self {
            config_root,
            project_root,
            store,
        }
    }

    /// Writes a file under the config root, creating parent directories.
    pub fn write_config(&self, relative: &str, content: &str) {
        self.config_root
            .child(relative)
            .write_str(content)
            .expect("Failed to write config file");
    }

    pub fn shell(&self) -> ProjectShell {
        ProjectShell::rooted_at(self.project_root.path())
    }
}

/// Platform client that records every operation and tracks which units
/// exist, so convergence waits finish on the first poll.
#[derive(Default)]
pub struct PlatformRecorder {
    ops: Mutex<Vec<String>>,
    unit_specs: Mutex<Vec<UnitSpec>>,
    existing: Mutex<BTreeSet<String>>,
    dependents: BTreeMap<String, Vec<String>>,
}

impl PlatformRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers dependent workloads reported for `unit` during teardown.
    pub fn with_dependents(mut self, unit: &str, dependents: &[&str]) -> Self {
        self.dependents.insert(
            unit.to_string(),
            dependents.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    pub fn spec_named(&self, name: &str) -> Option<UnitSpec> {
        self.unit_specs
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.name == name)
            .cloned()
    }

    fn record(&self, op: String) {
        self.ops.lock().unwrap().push(op);
    }
}

impl PlatformClient for PlatformRecorder {
    fn create_namespace(&self, name: &str) -> Result<(), PlatformError> {
        self.record(format!("create_namespace {}", name));
        Ok(())
    }

    fn delete_namespace(&self, name: &str) -> Result<(), PlatformError> {
        self.record(format!("delete_namespace {}", name));
        Ok(())
    }

    fn apply_git_source(&self, spec: &GitSourceSpec) -> Result<(), PlatformError> {
        self.record(format!("apply_git_source {}", spec.name));
        Ok(())
    }

    fn apply_oci_source(&self, spec: &OciSourceSpec) -> Result<(), PlatformError> {
        self.record(format!("apply_oci_source {}", spec.name));
        Ok(())
    }

    fn apply_config_values(
        &self,
        name: &str,
        namespace: &str,
        _values: &BTreeMap<String, String>,
    ) -> Result<(), PlatformError> {
        self.record(format!("apply_config_values {}/{}", namespace, name));
        Ok(())
    }

    fn apply_unit(&self, spec: &UnitSpec) -> Result<(), PlatformError> {
        self.record(format!("apply_unit {}/{}", spec.namespace, spec.name));
        self.unit_specs.lock().unwrap().push(spec.clone());
        self.existing.lock().unwrap().insert(spec.name.clone());
        Ok(())
    }

    fn delete_unit(&self, name: &str, namespace: &str) -> Result<(), PlatformError> {
        self.record(format!("delete_unit {}/{}", namespace, name));
        self.existing.lock().unwrap().remove(name);
        Ok(())
    }

    fn suspend_unit(&self, name: &str, namespace: &str) -> Result<(), PlatformError> {
        self.record(format!("suspend_unit {}/{}", namespace, name));
        Ok(())
    }

    fn suspend_dependent(&self, name: &str, namespace: &str) -> Result<(), PlatformError> {
        self.record(format!("suspend_dependent {}/{}", namespace, name));
        Ok(())
    }

    fn list_dependents(
        &self,
        name: &str,
        _namespace: &str,
    ) -> Result<Vec<String>, PlatformError> {
        Ok(self.dependents.get(name).cloned().unwrap_or_default())
    }

    fn unit_ready_map(&self, names: &[String]) -> Result<BTreeMap<String, bool>, PlatformError> {
        let existing = self.existing.lock().unwrap();
        Ok(names
            .iter()
            .filter(|name| existing.contains(*name))
            .map(|name| (name.clone(), true))
            .collect())
    }

    fn transport_health(&self) -> Result<(), PlatformError> {
        Ok(())
    }
}
