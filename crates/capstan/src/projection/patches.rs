//! Patch body resolution and structural target inference.
//!
//! A patch declares either an inline body (used verbatim) or a path. Path
//! patches resolve against two layers: rendered template data under that key
//! and a project override file at `<config_root>/<path>`, merged recursively
//! with the file winning field-for-field. A patch with no body from either
//! layer is skipped.

use std::path::Path;

use serde_yaml::Value;

use crate::blueprint::{Kustomization, TemplateData};
use crate::platform::{PatchTarget, ResolvedPatch};

use super::{ProjectionError, Result};

/// Resolves every patch declared on a unit into its applyable form.
pub fn resolve_patches(
    unit: &Kustomization,
    template_data: &TemplateData,
    config_root: &Path,
) -> Result<Vec<ResolvedPatch>> {
    let mut resolved = Vec::new();
    for patch in &unit.patches {
        if let Some(body) = patch.patch.as_deref().filter(|b| !b.trim().is_empty()) {
            resolved.push(ResolvedPatch {
                patch: body.to_string(),
                target: infer_target(body),
            });
            continue;
        }
        let Some(path) = patch.path.as_deref().filter(|p| !p.trim().is_empty()) else {
            continue;
        };
        let Some(value) = resolve_patch_value(path, template_data, config_root)? else {
            continue;
        };
        let body = serde_yaml::to_string(&value)
            .map_err(|e| ProjectionError::Serialize(e.to_string()))?;
        resolved.push(ResolvedPatch {
            patch: body,
            target: target_of(&value),
        });
    }
    Ok(resolved)
}

/// Merged structured body for a path patch, `None` when neither layer has it.
fn resolve_patch_value(
    path: &str,
    template_data: &TemplateData,
    config_root: &Path,
) -> Result<Option<Value>> {
    let templated = template_data.get(path).cloned();

    let file_path = config_root.join(path);
    let overridden = if file_path.is_file() {
        let text = std::fs::read_to_string(&file_path).map_err(|e| ProjectionError::ReadFile {
            path: file_path.clone(),
            source: e,
        })?;
        let value: Value = serde_yaml::from_str(&text).map_err(|e| ProjectionError::Decode {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Some(value)
    } else {
        None
    };

    Ok(match (templated, overridden) {
        (Some(base), Some(over)) => Some(merge_values(base, over)),
        (Some(base), None) => Some(base),
        (None, Some(over)) => Some(over),
        (None, None) => None,
    })
}

/// Recursive map merge; `over` wins field-for-field, non-map values replace.
fn merge_values(base: Value, over: Value) -> Value {
    match (base, over) {
        (Value::Mapping(mut base_map), Value::Mapping(over_map)) => {
            for (key, over_value) in over_map {
                match base_map.remove(&key) {
                    Some(base_value) => {
                        base_map.insert(key, merge_values(base_value, over_value));
                    }
                    None => {
                        base_map.insert(key, over_value);
                    }
                }
            }
            Value::Mapping(base_map)
        }
        (_, over) => over,
    }
}

fn infer_target(body: &str) -> Option<PatchTarget> {
    let value: Value = serde_yaml::from_str(body).ok()?;
    target_of(&value)
}

/// Reads kind/metadata fields out of a structured patch body. Any missing
/// field means no target is inferred; the patch is still applied without one.
fn target_of(value: &Value) -> Option<PatchTarget> {
    let map = value.as_mapping()?;
    let kind = map.get("kind")?.as_str()?;
    let metadata = map.get("metadata")?.as_mapping()?;
    let name = metadata.get("name")?.as_str()?;
    let namespace = metadata
        .get("namespace")
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(PatchTarget {
        kind: kind.to_string(),
        name: name.to_string(),
        namespace,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::Patch;
    use tempfile::TempDir;

    fn unit_with(patches: Vec<Patch>) -> Kustomization {
        Kustomization {
            name: "ingress".to_string(),
            patches,
            ..Default::default()
        }
    }

    fn inline(body: &str) -> Patch {
        Patch {
            patch: Some(body.to_string()),
            path: None,
        }
    }

    fn by_path(path: &str) -> Patch {
        Patch {
            patch: None,
            path: Some(path.to_string()),
        }
    }

    #[test]
    fn test_inline_patch_is_verbatim_with_inferred_target() {
        let body = "kind: Deployment\nmetadata:\n  name: nginx\n  namespace: ingress\nspec:\n  replicas: 2\n";
        let unit = unit_with(vec![inline(body)]);
        let dir = TempDir::new().unwrap();

        let resolved = resolve_patches(&unit, &TemplateData::new(), dir.path()).unwrap();

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].patch, body);
        let target = resolved[0].target.as_ref().unwrap();
        assert_eq!(target.kind, "Deployment");
        assert_eq!(target.name, "nginx");
        assert_eq!(target.namespace.as_deref(), Some("ingress"));
    }

    #[test]
    fn test_unparseable_inline_body_emits_patch_without_target() {
        let unit = unit_with(vec![inline("{{ not yaml")]);
        let dir = TempDir::new().unwrap();

        let resolved = resolve_patches(&unit, &TemplateData::new(), dir.path()).unwrap();

        assert_eq!(resolved.len(), 1);
        assert!(resolved[0].target.is_none());
    }

    #[test]
    fn test_path_patch_merges_file_over_template_data() {
        let dir = TempDir::new().unwrap();
        let patch_dir = dir.path().join("patches");
        std::fs::create_dir_all(&patch_dir).unwrap();
        std::fs::write(
            patch_dir.join("nginx.yaml"),
            "kind: Deployment\nmetadata:\n  name: nginx\nspec:\n  replicas: 5\n",
        )
        .unwrap();

        let mut template_data = TemplateData::new();
        template_data.insert(
            "patches/nginx.yaml".to_string(),
            serde_yaml::from_str(
                "kind: Deployment\nmetadata:\n  name: nginx\nspec:\n  replicas: 2\n  paused: true\n",
            )
            .unwrap(),
        );

        let unit = unit_with(vec![by_path("patches/nginx.yaml")]);
        let resolved = resolve_patches(&unit, &template_data, dir.path()).unwrap();

        assert_eq!(resolved.len(), 1);
        let merged: Value = serde_yaml::from_str(&resolved[0].patch).unwrap();
        assert_eq!(merged["spec"]["replicas"], Value::from(5));
        assert_eq!(merged["spec"]["paused"], Value::from(true));
        assert_eq!(resolved[0].target.as_ref().unwrap().name, "nginx");
    }

    #[test]
    fn test_path_patch_missing_from_both_layers_is_skipped() {
        let dir = TempDir::new().unwrap();
        let unit = unit_with(vec![by_path("patches/absent.yaml"), inline("a: 1\n")]);

        let resolved = resolve_patches(&unit, &TemplateData::new(), dir.path()).unwrap();

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].patch, "a: 1\n");
    }

    #[test]
    fn test_path_patch_from_template_data_only() {
        let dir = TempDir::new().unwrap();
        let mut template_data = TemplateData::new();
        template_data.insert(
            "patches/quota.yaml".to_string(),
            serde_yaml::from_str("kind: ResourceQuota\nmetadata:\n  name: default\n").unwrap(),
        );

        let unit = unit_with(vec![by_path("patches/quota.yaml")]);
        let resolved = resolve_patches(&unit, &template_data, dir.path()).unwrap();

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].target.as_ref().unwrap().kind, "ResourceQuota");
    }

    #[test]
    fn test_invalid_override_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let patch_dir = dir.path().join("patches");
        std::fs::create_dir_all(&patch_dir).unwrap();
        std::fs::write(patch_dir.join("broken.yaml"), ": not: [valid\n").unwrap();

        let unit = unit_with(vec![by_path("patches/broken.yaml")]);
        let err = resolve_patches(&unit, &TemplateData::new(), dir.path()).unwrap_err();
        assert!(matches!(err, ProjectionError::Decode { .. }));
    }
}
