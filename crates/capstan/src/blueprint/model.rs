//! Typed blueprint data model and its merge/persistence semantics.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Fixed subdirectory all unit paths are nested under.
pub const KUSTOMIZE_DIR: &str = "kustomize";

/// Default path prefix under a source url for module lookups.
pub const DEFAULT_PATH_PREFIX: &str = "terraform";

/// Default reconcile interval for a unit with none declared, in seconds.
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Default retry interval, in seconds.
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 120;

/// Default per-unit reconcile timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Root aggregate describing everything the engine resolves and applies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blueprint {
    /// Name, description and authorship.
    #[serde(default)]
    pub metadata: Metadata,

    /// Primary module source.
    #[serde(default, skip_serializing_if = "Repository::is_empty")]
    pub repository: Repository,

    /// Named additional module origins.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,

    /// Deployable infrastructure modules.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub terraform_components: Vec<TerraformComponent>,

    /// Deployable application units.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kustomizations: Vec<Kustomization>,
}

impl Blueprint {
    /// Merges `other` over this blueprint. Sections present in the incoming
    /// data override; absent or empty sections leave existing data untouched.
    pub fn merge(&mut self, other: Blueprint) {
        if !other.metadata.name.is_empty() {
            self.metadata.name = other.metadata.name;
        }
        if other.metadata.description.is_some() {
            self.metadata.description = other.metadata.description;
        }
        if !other.metadata.authors.is_empty() {
            self.metadata.authors = other.metadata.authors;
        }
        if !other.repository.is_empty() {
            self.repository = other.repository;
        }
        if !other.sources.is_empty() {
            self.sources = other.sources;
        }
        if !other.terraform_components.is_empty() {
            self.terraform_components = other.terraform_components;
        }
        if !other.kustomizations.is_empty() {
            self.kustomizations = other.kustomizations;
        }
    }

    /// The shape written to disk: component `values` are stripped (secrets and
    /// bulk data must not round-trip into the file) and `postBuild` blocks are
    /// dropped entirely when both of their collections are empty.
    pub fn persistence_form(&self) -> Blueprint {
        let mut copy = self.clone();
        for component in &mut copy.terraform_components {
            component.values.clear();
        }
        for unit in &mut copy.kustomizations {
            if unit.post_build.as_ref().map_or(false, PostBuild::is_empty) {
                unit.post_build = None;
            }
        }
        copy
    }

    /// Finds a named additional source.
    pub fn source_named(&self, name: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.name == name)
    }
}

/// Blueprint identity and authorship.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
}

/// The primary module source for the blueprint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    /// Git or OCI locator. An empty url disables the primary source.
    #[serde(default)]
    pub url: String,

    /// Reference selector for the locator.
    #[serde(rename = "ref", default, skip_serializing_if = "Reference::is_empty")]
    pub reference: Reference,

    /// Optional credential reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
}

impl Repository {
    pub fn is_empty(&self) -> bool {
        self.url.is_empty()
    }
}

/// A reference selector. When several fields are populated the most specific
/// one wins: commit > digest > semver > tag > branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semver: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl Reference {
    pub fn is_empty(&self) -> bool {
        self.best().is_none()
    }

    /// Returns the most specific populated field, skipping empty strings.
    pub fn best(&self) -> Option<&str> {
        [
            &self.commit,
            &self.digest,
            &self.semver,
            &self.tag,
            &self.branch,
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .find(|s| !s.is_empty())
    }
}

/// A named additional module origin.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Unique key referenced by components and units.
    pub name: String,

    /// Git or OCI locator.
    pub url: String,

    #[serde(rename = "ref", default, skip_serializing_if = "Reference::is_empty")]
    pub reference: Reference,

    /// Subdirectory under the url where modules live.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
}

impl Source {
    /// Path prefix for module lookups, defaulting to `terraform`.
    pub fn effective_path_prefix(&self) -> &str {
        self.path_prefix
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PATH_PREFIX)
    }
}

/// A deployable infrastructure module.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerraformComponent {
    /// Source name or fully-qualified module locator.
    #[serde(default)]
    pub source: String,

    /// Relative module path.
    pub path: String,

    /// Resolved on-disk module location. Derived at projection time, never
    /// persisted.
    #[serde(skip)]
    pub full_path: PathBuf,

    /// Module input values. Write-once at configuration time; stripped before
    /// the blueprint is persisted.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, serde_yaml::Value>,
}

/// A deployable application unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Kustomization {
    /// Unique key, also the dependency-graph node id.
    pub name: String,

    /// Relative path; nested under [`KUSTOMIZE_DIR`] when projected.
    #[serde(default)]
    pub path: String,

    /// Origin name; the primary repository when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Names of units this unit depends on. Cycles are tolerated.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    /// Reconcile interval in seconds. Zero means unset.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub interval: u64,

    /// Retry interval in seconds. Zero means unset.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub retry_interval: u64,

    /// Reconcile timeout in seconds. Zero means unset.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub timeout: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prune: Option<bool>,

    /// Sub-unit references participating in values layering.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,

    /// Patches applied to the unit's rendered output.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<Patch>,

    /// Substitution map and value-source references.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_build: Option<PostBuild>,

    /// Components applied as part of teardown only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cleanup: Vec<String>,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

impl Kustomization {
    pub fn effective_interval(&self) -> Duration {
        Duration::from_secs(non_zero(self.interval, DEFAULT_INTERVAL_SECS))
    }

    pub fn effective_retry_interval(&self) -> Duration {
        Duration::from_secs(non_zero(self.retry_interval, DEFAULT_RETRY_INTERVAL_SECS))
    }

    pub fn effective_timeout(&self) -> Duration {
        Duration::from_secs(non_zero(self.timeout, DEFAULT_TIMEOUT_SECS))
    }

    pub fn effective_wait(&self) -> bool {
        self.wait.unwrap_or(true)
    }

    pub fn effective_force(&self) -> bool {
        self.force.unwrap_or(false)
    }

    pub fn effective_prune(&self) -> bool {
        self.prune.unwrap_or(true)
    }

    /// The unit path nested under the fixed [`KUSTOMIZE_DIR`] subdirectory.
    pub fn normalized_path(&self) -> String {
        let trimmed = self.path.trim_matches('/');
        if trimmed.is_empty() {
            KUSTOMIZE_DIR.to_string()
        } else if trimmed == KUSTOMIZE_DIR
            || trimmed.starts_with(&format!("{}/", KUSTOMIZE_DIR))
        {
            trimmed.to_string()
        } else {
            format!("{}/{}", KUSTOMIZE_DIR, trimmed)
        }
    }
}

fn non_zero(value: u64, default: u64) -> u64 {
    if value == 0 {
        default
    } else {
        value
    }
}

/// A patch declared on a unit: inline body text, or a path resolved during
/// projection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Patch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Post-build substitution configuration for a unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PostBuild {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub substitute: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub substitute_from: Vec<SubstituteReference>,
}

impl PostBuild {
    pub fn is_empty(&self) -> bool {
        self.substitute.is_empty() && self.substitute_from.is_empty()
    }
}

/// A named value-source reference in a unit's post-build block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SubstituteReference {
    #[serde(default = "default_reference_kind")]
    pub kind: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub optional: bool,
}

fn default_reference_kind() -> String {
    "ConfigMap".to_string()
}

fn is_false(b: &bool) -> bool {
    !*b
}
