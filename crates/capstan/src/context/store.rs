//! Configuration-store seam: typed access to the active context's settings.

use std::path::PathBuf;
use std::sync::Mutex;

use serde_yaml::Value;

use super::ContextError;

/// Access to the long-lived configuration store that owns context settings.
///
/// Keys are dotted paths into the settings tree (`dns.domain`,
/// `cluster.workers.volumes`). Implementations decide where the tree lives;
/// the engine only reads it and occasionally writes a value back.
pub trait ConfigStore {
    /// Root directory holding the active context's configuration files.
    fn config_root(&self) -> Result<PathBuf, ContextError>;

    /// Name of the active context.
    fn context_name(&self) -> String;

    /// The full settings tree for the active context.
    fn config(&self) -> Value;

    /// Persists a value under a dotted key in the active context.
    fn set_context_value(&self, key: &str, value: Value) -> Result<(), ContextError>;

    /// Looks up a string under a dotted key, falling back to `default`.
    fn get_string(&self, key: &str, default: &str) -> String {
        match lookup(&self.config(), key) {
            Some(value) => scalar_to_string(value).unwrap_or_else(|| default.to_string()),
            None => default.to_string(),
        }
    }

    /// Looks up a list of strings under a dotted key, falling back to `default`.
    fn get_string_slice(&self, key: &str, default: &[String]) -> Vec<String> {
        match lookup(&self.config(), key) {
            Some(Value::Sequence(items)) => items.iter().filter_map(scalar_to_string).collect(),
            Some(value) => scalar_to_string(value)
                .map(|s| vec![s])
                .unwrap_or_else(|| default.to_vec()),
            None => default.to_vec(),
        }
    }
}

/// Resolves a dotted key against a YAML mapping tree.
pub fn lookup<'a>(tree: &'a Value, key: &str) -> Option<&'a Value> {
    let mut current = tree;
    for part in key.split('.') {
        current = current.as_mapping()?.get(part)?;
    }
    Some(current)
}

/// Renders a scalar YAML value as a string; mappings and sequences yield None.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// In-memory store used by tests and by embedders that manage settings
/// themselves.
pub struct InMemoryStore {
    context: String,
    root: PathBuf,
    settings: Mutex<Value>,
}

impl InMemoryStore {
    /// Creates a store for `context` rooted at `root` with empty settings.
    pub fn new(context: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            context: context.into(),
            root: root.into(),
            settings: Mutex::new(Value::Mapping(Default::default())),
        }
    }

    /// Replaces the settings tree wholesale.
    pub fn with_settings(self, settings: Value) -> Self {
        if let Ok(mut guard) = self.settings.lock() {
            *guard = settings;
        }
        self
    }
}

impl ConfigStore for InMemoryStore {
    fn config_root(&self) -> Result<PathBuf, ContextError> {
        Ok(self.root.clone())
    }

    fn context_name(&self) -> String {
        self.context.clone()
    }

    fn config(&self) -> Value {
        self.settings
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or(Value::Null)
    }

    fn set_context_value(&self, key: &str, value: Value) -> Result<(), ContextError> {
        let mut guard = self.settings.lock().map_err(|_| ContextError::SetValue {
            key: key.to_string(),
            reason: "settings lock poisoned".to_string(),
        })?;
        insert(&mut guard, key, value).map_err(|reason| ContextError::SetValue {
            key: key.to_string(),
            reason,
        })
    }
}

/// Inserts `value` under a dotted key, creating intermediate mappings.
pub fn insert(tree: &mut Value, key: &str, value: Value) -> Result<(), String> {
    if !tree.is_mapping() {
        *tree = Value::Mapping(Default::default());
    }
    let mut current = tree;
    let parts: Vec<&str> = key.split('.').collect();
    for (i, part) in parts.iter().enumerate() {
        let map = current
            .as_mapping_mut()
            .ok_or_else(|| format!("'{}' is not a mapping", parts[..i].join(".")))?;
        let entry_key = Value::from(*part);
        if i == parts.len() - 1 {
            map.insert(entry_key, value);
            return Ok(());
        }
        if !map.contains_key(&entry_key) {
            map.insert(entry_key.clone(), Value::Mapping(Default::default()));
        }
        current = map
            .get_mut(&entry_key)
            .ok_or_else(|| format!("'{}' vanished during insert", part))?;
        if !current.is_mapping() {
            *current = Value::Mapping(Default::default());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(yaml: &str) -> InMemoryStore {
        let settings: Value = serde_yaml::from_str(yaml).unwrap();
        InMemoryStore::new("test-context", "/tmp/contexts/test").with_settings(settings)
    }

    #[test]
    fn test_get_string_dotted_key() {
        let store = store_with("dns:\n  domain: example.dev\n");
        assert_eq!(store.get_string("dns.domain", "test"), "example.dev");
        assert_eq!(store.get_string("dns.missing", "test"), "test");
        assert_eq!(store.get_string("nothing.at.all", "fallback"), "fallback");
    }

    #[test]
    fn test_get_string_non_scalar_falls_back() {
        let store = store_with("dns:\n  domain:\n    nested: true\n");
        assert_eq!(store.get_string("dns.domain", "test"), "test");
    }

    #[test]
    fn test_get_string_slice() {
        let store = store_with("cluster:\n  workers:\n    volumes:\n      - /var/a:/a\n      - /var/b:/b\n");
        let volumes = store.get_string_slice("cluster.workers.volumes", &[]);
        assert_eq!(volumes, vec!["/var/a:/a", "/var/b:/b"]);

        let fallback = vec!["x".to_string()];
        assert_eq!(store.get_string_slice("cluster.missing", &fallback), fallback);
    }

    #[test]
    fn test_set_context_value_creates_nested_mappings() {
        let store = InMemoryStore::new("ctx", "/tmp/ctx");
        store
            .set_context_value("values.app.replicas", Value::from(3))
            .unwrap();
        assert_eq!(store.get_string("values.app.replicas", ""), "3");
    }

    #[test]
    fn test_set_context_value_overwrites_scalar_parent() {
        let store = store_with("values: plain\n");
        store
            .set_context_value("values.app.tier", Value::from("web"))
            .unwrap();
        assert_eq!(store.get_string("values.app.tier", ""), "web");
    }
}
