//! Layered blueprint resolution and persistence.
//!
//! Resolution precedence, first match wins: the override file in the config
//! root, the templated source file, a platform-specific built-in template,
//! the generic built-in template, and finally a minimal blueprint derived
//! from the context name when evaluation produced nothing.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Deserialize;
use serde_yaml::Value;
use walkdir::WalkDir;

use crate::context::ConfigStore;
use crate::template::TemplateEvaluator;

use super::error::{BlueprintError, Result};
use super::model::{
    Blueprint, Kustomization, Metadata, Repository, Source, TerraformComponent,
};

/// File name of the persisted override form.
pub const BLUEPRINT_FILE: &str = "blueprint.yaml";

/// File name of the templated source.
pub const BLUEPRINT_TEMPLATE_FILE: &str = "blueprint.yaml.tmpl";

/// Subdirectory of the config root holding per-path template data.
pub const TEMPLATE_DATA_DIR: &str = "template";

const DEFAULT_TEMPLATE: &str = include_str!("templates/default.yaml");

const PLATFORM_TEMPLATES: &[(&str, &str)] = &[
    ("local", include_str!("templates/local.yaml")),
    ("metal", include_str!("templates/metal.yaml")),
];

/// Per-path template data rendered next to the blueprint.
pub type TemplateData = BTreeMap<String, Value>;

/// Intermediate form for templated input. Kustomization entries stay raw so
/// they can be re-serialized and strictly decoded in a second pass; templated
/// sources may emit them in a document-style convention the strict schema
/// does not accept directly.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBlueprint {
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    repository: Repository,
    #[serde(default)]
    sources: Vec<Source>,
    #[serde(default)]
    terraform_components: Vec<TerraformComponent>,
    #[serde(default)]
    kustomizations: Vec<Value>,
}

/// Loads, resolves and persists the blueprint for the active context.
///
/// The loader owns the working blueprint state: each `load` merges the newly
/// resolved data over it rather than replacing it, so fields absent from the
/// latest input survive.
pub struct BlueprintLoader<'a> {
    store: &'a dyn ConfigStore,
    evaluator: &'a dyn TemplateEvaluator,
    blueprint: Blueprint,
    template_data: TemplateData,
}

impl<'a> BlueprintLoader<'a> {
    pub fn new(store: &'a dyn ConfigStore, evaluator: &'a dyn TemplateEvaluator) -> Self {
        Self {
            store,
            evaluator,
            blueprint: Blueprint::default(),
            template_data: TemplateData::new(),
        }
    }

    /// The current working blueprint.
    pub fn blueprint(&self) -> &Blueprint {
        &self.blueprint
    }

    /// Template data rendered during the last `load`.
    pub fn template_data(&self) -> &TemplateData {
        &self.template_data
    }

    /// Resolves the blueprint for the active context and merges it into the
    /// working state. With `reset` set the override file is skipped and
    /// resolution starts from the templated sources.
    pub fn load(&mut self, reset: bool) -> Result<&Blueprint> {
        let config_root = self.store.config_root()?;
        let context = self.store.context_name();

        let override_path = config_root.join(BLUEPRINT_FILE);
        let template_path = config_root.join(BLUEPRINT_TEMPLATE_FILE);

        let resolved = if !reset && override_path.is_file() {
            debug!("Loading blueprint from {}", override_path.display());
            let text = read_file(&override_path)?;
            serde_yaml::from_str(&text).map_err(|e| BlueprintError::Parse {
                path: override_path.clone(),
                message: e.to_string(),
            })?
        } else if template_path.is_file() {
            debug!("Rendering blueprint template {}", template_path.display());
            let text = read_file(&template_path)?;
            self.resolve_template(BLUEPRINT_TEMPLATE_FILE, &text, &template_path, &context)?
        } else {
            let (name, text) = self.builtin_template();
            debug!("Rendering built-in blueprint template '{}'", name);
            self.resolve_template(name, text, Path::new(name), &context)?
        };

        self.blueprint.merge(resolved);
        self.template_data = self.load_template_data(&config_root)?;
        info!(
            "Resolved blueprint '{}' with {} unit(s)",
            self.blueprint.metadata.name,
            self.blueprint.kustomizations.len()
        );
        Ok(&self.blueprint)
    }

    /// Writes the persisted form to the override path. An existing file is
    /// left alone unless `overwrite` is set; when writing over one, the
    /// persisted form is merged over its current content so hand-authored
    /// local fields survive.
    pub fn write(&self, overwrite: bool) -> Result<PathBuf> {
        let config_root = self.store.config_root()?;
        let path = config_root.join(BLUEPRINT_FILE);

        if path.is_file() && !overwrite {
            debug!("Blueprint file {} already exists, not writing", path.display());
            return Ok(path);
        }

        let mut on_disk = if path.is_file() {
            let text = read_file(&path)?;
            serde_yaml::from_str::<Blueprint>(&text).map_err(|e| BlueprintError::Parse {
                path: path.clone(),
                message: e.to_string(),
            })?
        } else {
            Blueprint::default()
        };
        on_disk.merge(self.blueprint.persistence_form());

        let yaml = serde_yaml::to_string(&on_disk)
            .map_err(|e| BlueprintError::Serialize(e.to_string()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| BlueprintError::WriteFile {
                path: path.clone(),
                source: e,
            })?;
        }
        fs::write(&path, yaml).map_err(|e| BlueprintError::WriteFile {
            path: path.clone(),
            source: e,
        })?;
        info!("Wrote blueprint to {}", path.display());
        Ok(path)
    }

    fn resolve_template(
        &self,
        name: &str,
        text: &str,
        origin: &Path,
        context: &str,
    ) -> Result<Blueprint> {
        let context_json = self.context_json()?;
        let rendered = self.evaluator.evaluate(name, text, &context_json)?;
        if rendered.trim().is_empty() {
            debug!("Template '{}' rendered empty, using minimal blueprint", name);
            return Ok(minimal_blueprint(context));
        }
        parse_rendered(&rendered, origin)
    }

    /// Serializes the store's settings tree plus the active context name into
    /// the single JSON value bound as the `context` template variable.
    fn context_json(&self) -> Result<String> {
        let settings = self.store.config();
        let mut json = serde_json::to_value(&settings)
            .map_err(|e| BlueprintError::Context(e.to_string()))?;
        match json {
            serde_json::Value::Object(ref mut map) => {
                map.insert(
                    "name".to_string(),
                    serde_json::Value::String(self.store.context_name()),
                );
            }
            _ => {
                json = serde_json::json!({ "name": self.store.context_name() });
            }
        }
        serde_json::to_string(&json).map_err(|e| BlueprintError::Context(e.to_string()))
    }

    fn builtin_template(&self) -> (&'static str, &'static str) {
        let platform = self.store.get_string("platform", "");
        PLATFORM_TEMPLATES
            .iter()
            .find(|(name, _)| *name == platform)
            .map(|(name, text)| (*name, *text))
            .unwrap_or(("default", DEFAULT_TEMPLATE))
    }

    /// Renders every file under the config root's template-data directory
    /// with the same context binding, keyed by path relative to that
    /// directory. Hidden files and directories are skipped.
    fn load_template_data(&self, config_root: &Path) -> Result<TemplateData> {
        let dir = config_root.join(TEMPLATE_DATA_DIR);
        let mut data = TemplateData::new();
        if !dir.is_dir() {
            return Ok(data);
        }

        let context_json = self.context_json()?;
        for entry in WalkDir::new(&dir)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let relative = match path.strip_prefix(&dir) {
                Ok(rel) => rel,
                Err(_) => continue,
            };
            let has_hidden_component = relative.components().any(|c| {
                c.as_os_str()
                    .to_str()
                    .map(|s| s.starts_with('.'))
                    .unwrap_or(false)
            });
            if has_hidden_component {
                continue;
            }

            let key = relative.to_string_lossy().replace('\\', "/");
            let text = read_file(path)?;
            let rendered = self.evaluator.evaluate(&key, &text, &context_json)?;
            let value = serde_yaml::from_str(&rendered).map_err(|e| BlueprintError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
            data.insert(key, value);
        }
        Ok(data)
    }
}

/// Parses evaluator output into a blueprint, running each kustomization entry
/// through the two-pass strict decode.
fn parse_rendered(text: &str, origin: &Path) -> Result<Blueprint> {
    let raw: RawBlueprint = serde_yaml::from_str(text).map_err(|e| BlueprintError::Parse {
        path: origin.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut units = Vec::with_capacity(raw.kustomizations.len());
    for entry in &raw.kustomizations {
        units.push(decode_unit(entry)?);
    }

    Ok(Blueprint {
        metadata: raw.metadata,
        repository: raw.repository,
        sources: raw.sources,
        terraform_components: raw.terraform_components,
        kustomizations: units,
    })
}

/// Two-pass conversion of a raw kustomization entry: normalize document-style
/// entries to the flat convention, re-serialize to a neutral form, then decode
/// against the strict unit schema. Failures are fatal and name the unit.
fn decode_unit(raw: &Value) -> Result<Kustomization> {
    let flattened = flatten_unit_document(raw);
    let neutral = serde_yaml::to_string(&flattened)
        .map_err(|e| BlueprintError::Serialize(e.to_string()))?;
    serde_yaml::from_str(&neutral).map_err(|e| BlueprintError::UnitDecode {
        name: unit_name_of(&flattened),
        message: e.to_string(),
    })
}

/// Rewrites a document-style entry (`kind: Kustomization` with nested `spec`)
/// into the flat form: spec fields at top level, name from metadata. Entries
/// already in flat form pass through unchanged.
fn flatten_unit_document(raw: &Value) -> Value {
    let Some(map) = raw.as_mapping() else {
        return raw.clone();
    };
    let is_document = map
        .get("kind")
        .and_then(Value::as_str)
        .map(|kind| kind == "Kustomization")
        .unwrap_or(false)
        && map.contains_key("spec");
    if !is_document {
        return raw.clone();
    }

    let mut flat = serde_yaml::Mapping::new();
    if let Some(spec) = map.get("spec").and_then(Value::as_mapping) {
        for (key, value) in spec {
            flat.insert(key.clone(), value.clone());
        }
    }
    if let Some(name) = map
        .get("metadata")
        .and_then(Value::as_mapping)
        .and_then(|m| m.get("name"))
    {
        flat.insert(Value::from("name"), name.clone());
    }
    Value::Mapping(flat)
}

fn unit_name_of(value: &Value) -> String {
    value
        .as_mapping()
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("<unnamed>")
        .to_string()
}

/// Minimal fallback blueprint derived from the context name.
fn minimal_blueprint(context: &str) -> Blueprint {
    Blueprint {
        metadata: Metadata {
            name: context.to_string(),
            description: Some(format!("Resources for the {} context", context)),
            authors: Vec::new(),
        },
        ..Default::default()
    }
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| BlueprintError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })
}
