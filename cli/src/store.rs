//! File-backed configuration store over `capstan.yaml`.
//!
//! The document holds the active context name and one settings tree per
//! context:
//!
//! ```yaml
//! context: alpha
//! contexts:
//!   alpha:
//!     platform: local
//!     dns:
//!       domain: example.dev
//! ```

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use capstan::context::store::insert;
use capstan::context::ContextError;
use capstan::ConfigStore;
use log::debug;
use serde_yaml::Value;

const STORE_FILE: &str = "capstan.yaml";
const CONTEXT_KEY: &str = "context";
const CONTEXTS_KEY: &str = "contexts";
const DEFAULT_CONTEXT: &str = "default";

/// Configuration store persisted as a single YAML document. Writes go back
/// to the file they were loaded from.
pub struct FileStore {
    path: PathBuf,
    document: Mutex<Value>,
}

impl FileStore {
    /// Opens `<project_root>/capstan.yaml`, falling back to the user-level
    /// `<config_dir>/capstan/capstan.yaml` when the project has none. A
    /// missing file starts an empty document, created on first write.
    pub fn open(project_root: &Path) -> Result<Self> {
        let project_file = project_root.join(STORE_FILE);
        let path = if project_file.is_file() {
            project_file
        } else {
            match user_store_file() {
                Some(user_file) if user_file.is_file() => user_file,
                _ => project_file,
            }
        };

        let document = if path.is_file() {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_yaml::from_str(&text)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            debug!("No store file at {}, starting empty", path.display());
            Value::Mapping(Default::default())
        };

        Ok(Self {
            path,
            document: Mutex::new(document),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, document: &Value) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let text = serde_yaml::to_string(document).map_err(|e| e.to_string())?;
        std::fs::write(&self.path, text).map_err(|e| e.to_string())
    }
}

impl ConfigStore for FileStore {
    fn config_root(&self) -> Result<PathBuf, ContextError> {
        let base = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(base.join(CONTEXTS_KEY).join(self.context_name()))
    }

    fn context_name(&self) -> String {
        let guard = match self.document.lock() {
            Ok(guard) => guard,
            Err(_) => return DEFAULT_CONTEXT.to_string(),
        };
        active_context(&guard)
    }

    fn config(&self) -> Value {
        let guard = match self.document.lock() {
            Ok(guard) => guard,
            Err(_) => return Value::Mapping(Default::default()),
        };
        let name = active_context(&guard);
        guard
            .get(CONTEXTS_KEY)
            .and_then(|contexts| contexts.get(name.as_str()))
            .cloned()
            .unwrap_or_else(|| Value::Mapping(Default::default()))
    }

    fn set_context_value(&self, key: &str, value: Value) -> Result<(), ContextError> {
        let mut guard = self.document.lock().map_err(|_| ContextError::SetValue {
            key: key.to_string(),
            reason: "store lock poisoned".to_string(),
        })?;
        let name = active_context(&guard);
        let settings =
            context_settings_mut(&mut guard, &name).map_err(|reason| ContextError::SetValue {
                key: key.to_string(),
                reason,
            })?;
        insert(settings, key, value).map_err(|reason| ContextError::SetValue {
            key: key.to_string(),
            reason,
        })?;
        self.persist(&guard).map_err(|reason| ContextError::SetValue {
            key: key.to_string(),
            reason,
        })
    }
}

fn active_context(document: &Value) -> String {
    document
        .get(CONTEXT_KEY)
        .and_then(Value::as_str)
        .filter(|name| !name.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_CONTEXT.to_string())
}

/// Navigates to the active context's settings mapping, creating the
/// enclosing structure as needed.
fn context_settings_mut<'a>(document: &'a mut Value, name: &str) -> Result<&'a mut Value, String> {
    if !document.is_mapping() {
        *document = Value::Mapping(Default::default());
    }
    let map = document
        .as_mapping_mut()
        .ok_or_else(|| "store document is not a mapping".to_string())?;
    let contexts_key = Value::from(CONTEXTS_KEY);
    if !map.contains_key(&contexts_key) {
        map.insert(contexts_key.clone(), Value::Mapping(Default::default()));
    }
    let contexts = map
        .get_mut(&contexts_key)
        .ok_or_else(|| "contexts entry vanished".to_string())?;
    if !contexts.is_mapping() {
        *contexts = Value::Mapping(Default::default());
    }
    let contexts = contexts
        .as_mapping_mut()
        .ok_or_else(|| "contexts is not a mapping".to_string())?;
    let name_key = Value::from(name);
    if !contexts.contains_key(&name_key) {
        contexts.insert(name_key.clone(), Value::Mapping(Default::default()));
    }
    let settings = contexts
        .get_mut(&name_key)
        .ok_or_else(|| format!("context '{}' vanished", name))?;
    if !settings.is_mapping() {
        *settings = Value::Mapping(Default::default());
    }
    Ok(settings)
}

fn user_store_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("capstan").join(STORE_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_store(root: &Path, yaml: &str) {
        std::fs::write(root.join(STORE_FILE), yaml).unwrap();
    }

    #[test]
    fn test_open_without_file_starts_empty() {
        let root = TempDir::new().unwrap();
        let store = FileStore::open(root.path()).unwrap();

        assert_eq!(store.context_name(), "default");
        assert_eq!(store.get_string("dns.domain", "test"), "test");
        assert_eq!(store.path(), root.path().join(STORE_FILE));
    }

    #[test]
    fn test_open_reads_active_context_settings() {
        let root = TempDir::new().unwrap();
        write_store(
            root.path(),
            r#"
context: alpha
contexts:
  alpha:
    platform: metal
    dns:
      domain: example.dev
  beta:
    dns:
      domain: other.dev
"#,
        );
        let store = FileStore::open(root.path()).unwrap();

        assert_eq!(store.context_name(), "alpha");
        assert_eq!(store.get_string("platform", ""), "metal");
        assert_eq!(store.get_string("dns.domain", "test"), "example.dev");
    }

    #[test]
    fn test_config_root_nests_under_contexts() {
        let root = TempDir::new().unwrap();
        write_store(root.path(), "context: alpha\n");
        let store = FileStore::open(root.path()).unwrap();

        assert_eq!(
            store.config_root().unwrap(),
            root.path().join("contexts").join("alpha")
        );
    }

    #[test]
    fn test_set_context_value_persists() {
        let root = TempDir::new().unwrap();
        write_store(root.path(), "context: alpha\n");
        let store = FileStore::open(root.path()).unwrap();

        store
            .set_context_value("values.app.replicas", Value::from(3))
            .unwrap();

        let reopened = FileStore::open(root.path()).unwrap();
        assert_eq!(reopened.get_string("values.app.replicas", ""), "3");
    }

    #[test]
    fn test_set_context_value_leaves_other_contexts_alone() {
        let root = TempDir::new().unwrap();
        write_store(
            root.path(),
            r#"
context: alpha
contexts:
  beta:
    dns:
      domain: other.dev
"#,
        );
        let store = FileStore::open(root.path()).unwrap();
        store
            .set_context_value("dns.domain", Value::from("alpha.dev"))
            .unwrap();

        let text = std::fs::read_to_string(root.path().join(STORE_FILE)).unwrap();
        let document: Value = serde_yaml::from_str(&text).unwrap();
        assert_eq!(
            document["contexts"]["beta"]["dns"]["domain"],
            Value::from("other.dev")
        );
        assert_eq!(
            document["contexts"]["alpha"]["dns"]["domain"],
            Value::from("alpha.dev")
        );
    }

    #[test]
    fn test_set_creates_file_when_missing() {
        let root = TempDir::new().unwrap();
        let store = FileStore::open(root.path()).unwrap();

        store
            .set_context_value("platform", Value::from("local"))
            .unwrap();

        assert!(root.path().join(STORE_FILE).is_file());
        let reopened = FileStore::open(root.path()).unwrap();
        assert_eq!(reopened.get_string("platform", ""), "local");
    }
}
