//! Projected resource shapes.
//!
//! These are the platform-native forms the orchestrator hands to the
//! [`PlatformClient`](super::PlatformClient): blueprint declarations with
//! every default resolved, every reference pinned and every patch carrying
//! its inferred target.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::blueprint::{Reference, SubstituteReference};

// ============================================================================
// Sources
// ============================================================================

/// Kind of a projected source, matching the platform's resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    #[serde(rename = "GitRepository")]
    Git,
    #[serde(rename = "OCIRepository")]
    Oci,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Git => write!(f, "GitRepository"),
            SourceKind::Oci => write!(f, "OCIRepository"),
        }
    }
}

/// A Git-origin source projected for apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitSourceSpec {
    pub name: String,
    pub namespace: String,
    pub url: String,
    /// Checkout reference; the platform picks the strongest populated field.
    #[serde(default, skip_serializing_if = "Reference::is_empty")]
    pub reference: Reference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
    /// Sync interval in seconds.
    pub interval: u64,
}

/// An OCI-origin source projected for apply.
///
/// The url never carries a tag here; whatever was embedded in the blueprint
/// url has already been split off into [`tag`](Self::tag).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OciSourceSpec {
    pub name: String,
    pub namespace: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
    /// Sync interval in seconds.
    pub interval: u64,
}

// ============================================================================
// Units
// ============================================================================

/// Reference from a unit to the source it builds from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSelector {
    pub kind: SourceKind,
    pub name: String,
}

/// Structural target of a patch, inferred from the patch body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchTarget {
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// A patch with its resolved body and, where inferable, its target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPatch {
    pub patch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<PatchTarget>,
}

/// Post-build block of a projected unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostBuildSpec {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub substitute: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub substitute_from: Vec<SubstituteReference>,
}

/// A deployable unit projected into the platform's native shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitSpec {
    pub name: String,
    pub namespace: String,
    pub path: String,
    pub source: SourceSelector,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Reconcile intervals and the readiness timeout, all in seconds.
    pub interval: u64,
    pub retry_interval: u64,
    pub timeout: u64,
    pub wait: bool,
    pub force: bool,
    pub prune: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<ResolvedPatch>,
    pub post_build: PostBuildSpec,
}
