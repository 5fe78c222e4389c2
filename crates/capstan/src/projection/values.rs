//! System values, substitution-value validation, and the layered merge that
//! produces a unit's flat substitution map.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use serde_yaml::Value;
use uuid::Uuid;

use crate::blueprint::Kustomization;
use crate::context::store::lookup;
use crate::context::ConfigStore;

use super::{ProjectionError, Result};

/// File under the config root holding per-component value overrides. The same
/// name keys the rendered template-data entry carrying template defaults.
pub const VALUES_OVERRIDE_FILE: &str = "values.yaml";

/// Settings-tree prefix for live per-component context values.
const CONTEXT_VALUES_PREFIX: &str = "values";

/// Opaque per-apply build identifier: second-resolution timestamp plus a
/// short random suffix. Generated once per apply.
pub fn generate_build_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().format("%Y%m%d%H%M%S"), &suffix[..8])
}

/// Platform-computed substitution values, keyed by their well-known names.
/// Keys with no value in the context settings are omitted.
pub fn system_values(store: &dyn ConfigStore, build_id: &str) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    values.insert("DOMAIN".to_string(), store.get_string("dns.domain", "test"));
    values.insert("CONTEXT_ID".to_string(), store.context_name());
    values.insert("BUILD_ID".to_string(), build_id.to_string());

    let start = store.get_string("network.loadbalancer_ips.start", "");
    let end = store.get_string("network.loadbalancer_ips.end", "");
    if !start.is_empty() && !end.is_empty() {
        values.insert(
            "LOADBALANCER_IP_RANGE".to_string(),
            format!("{}-{}", start, end),
        );
    }

    let registry = store.get_string("docker.registry_url", "");
    if !registry.is_empty() {
        values.insert("REGISTRY_URL".to_string(), registry);
    }

    let volumes = store.get_string_slice("cluster.workers.volumes", &[]);
    if let Some((_, container)) = volumes.first().and_then(|v| v.split_once(':')) {
        values.insert("LOCAL_VOLUME_PATH".to_string(), container.to_string());
    }

    values
}

/// Parses the project values override file, `None` when absent.
pub fn load_value_overrides(config_root: &Path) -> Result<Option<Value>> {
    let path = config_root.join(VALUES_OVERRIDE_FILE);
    if !path.is_file() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path).map_err(|e| ProjectionError::ReadFile {
        path: path.clone(),
        source: e,
    })?;
    let value = serde_yaml::from_str(&text).map_err(|e| ProjectionError::Decode {
        path: VALUES_OVERRIDE_FILE.to_string(),
        message: e.to_string(),
    })?;
    Ok(Some(value))
}

/// Checks that a component's map-shaped value carries only scalars at one
/// level of nesting: no sequences anywhere, no nulls, no maps below depth
/// one. Violations name the offending dotted key path.
pub fn validate_substitution_values(component: &str, value: &Value) -> Result<()> {
    let Some(map) = value.as_mapping() else {
        return Ok(());
    };
    for (key, entry) in map {
        let Some(key) = key.as_str() else { continue };
        match entry {
            Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
            Value::Mapping(nested) => {
                for (sub_key, sub_entry) in nested {
                    let Some(sub_key) = sub_key.as_str() else { continue };
                    match sub_entry {
                        Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
                        other => {
                            return Err(invalid(
                                format!("{}.{}.{}", component, key, sub_key),
                                other,
                            ));
                        }
                    }
                }
            }
            other => return Err(invalid(format!("{}.{}", component, key), other)),
        }
    }
    Ok(())
}

/// Computes a unit's flat substitution map.
///
/// Per participating component (the unit name first, then its declared
/// sub-components) the layers merge lowest to highest precedence: system
/// values, rendered template defaults, the project values override file,
/// live context-store values under `values.<component>`. Each layer is
/// validated before it merges; depth-one maps flatten to dotted keys.
pub fn unit_substitutions(
    unit: &Kustomization,
    system: &BTreeMap<String, String>,
    template_values: Option<&Value>,
    override_values: Option<&Value>,
    store: &dyn ConfigStore,
) -> Result<BTreeMap<String, String>> {
    let mut merged = system.clone();
    let settings = store.config();

    for component in participating(unit) {
        let layers = [
            component_entry(template_values, &component),
            component_entry(override_values, &component),
            lookup(
                &settings,
                &format!("{}.{}", CONTEXT_VALUES_PREFIX, component),
            ),
        ];
        for layer in layers.into_iter().flatten() {
            validate_substitution_values(&component, layer)?;
            flatten_into(layer, &mut merged);
        }
    }
    Ok(merged)
}

fn participating(unit: &Kustomization) -> Vec<String> {
    let mut components = vec![unit.name.clone()];
    components.extend(unit.components.iter().cloned());
    components
}

fn component_entry<'a>(values: Option<&'a Value>, component: &str) -> Option<&'a Value> {
    values?.as_mapping()?.get(component)
}

fn flatten_into(value: &Value, into: &mut BTreeMap<String, String>) {
    let Some(map) = value.as_mapping() else { return };
    for (key, entry) in map {
        let Some(key) = key.as_str() else { continue };
        if let Some(scalar) = render_scalar(entry) {
            into.insert(key.to_string(), scalar);
        } else if let Value::Mapping(nested) = entry {
            for (sub_key, sub_entry) in nested {
                if let (Some(sub_key), Some(scalar)) =
                    (sub_key.as_str(), render_scalar(sub_entry))
                {
                    into.insert(format!("{}.{}", key, sub_key), scalar);
                }
            }
        }
    }
}

fn render_scalar(value: &Value) -> Option<String> {
    match value {
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn invalid(path: String, value: &Value) -> ProjectionError {
    let reason = match value {
        Value::Null => "null values are not supported",
        Value::Sequence(_) => "sequences are not supported",
        Value::Mapping(_) => "mappings nested deeper than one level are not supported",
        _ => "unsupported value shape",
    };
    ProjectionError::InvalidValue {
        path,
        reason: reason.to_string(),
    }
}
