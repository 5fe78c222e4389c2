//! Component source-locator and module-path resolution.

use std::path::Path;
use std::sync::LazyLock;

use log::debug;
use regex::Regex;

use crate::blueprint::Blueprint;

use super::{ProjectionError, Result};

/// Project-relative cache directory for remote module checkouts.
pub const MODULE_CACHE_DIR: &str = ".capstan/modules";

/// Project-relative directory holding local module definitions.
pub const LOCAL_MODULE_DIR: &str = "terraform";

// Pre-compiled patterns recognizing fully-qualified remote module locators.
static REMOTE_MODULE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"^git::").unwrap(),
        Regex::new(r"^git@").unwrap(),
        Regex::new(r"^(https?|ssh)://").unwrap(),
        Regex::new(r"^oci://").unwrap(),
        Regex::new(r"\.zip(//.*)?$").unwrap(),
        // Registry shorthand: <namespace>/<name>/<provider>, optional subpath.
        Regex::new(r"^[\w.-]+/[\w.-]+/[\w.-]+(//.*)?$").unwrap(),
        // Bare host with a double-slash module subpath.
        Regex::new(r"^[\w.-]+\.[a-zA-Z]{2,}(:\d+)?/.*//.+").unwrap(),
    ]
});

/// Whether a source string is already a fully-qualified remote locator.
pub fn is_remote_module_source(source: &str) -> bool {
    REMOTE_MODULE_PATTERNS.iter().any(|p| p.is_match(source))
}

/// Resolves each component's `source` to a fully-qualified module locator.
///
/// A `source` naming a declared [`Source`](crate::blueprint::Source) becomes
/// `<url>//<path_prefix>/<component.path>?ref=<best>`; an already-qualified
/// locator passes through unchanged; an empty `source` marks a project-local
/// module. Anything else is an error naming the component.
pub fn resolve_component_sources(blueprint: &mut Blueprint) -> Result<()> {
    let Blueprint {
        sources,
        terraform_components,
        ..
    } = blueprint;

    for component in terraform_components.iter_mut() {
        let declared = component.source.trim().to_string();
        if declared.is_empty() {
            continue;
        }
        if let Some(source) = sources.iter().find(|s| s.name == declared) {
            let base = format!(
                "{}//{}/{}",
                source.url.trim_end_matches('/'),
                source.effective_path_prefix(),
                component.path
            );
            component.source = match source.reference.best() {
                Some(reference) => format!("{}?ref={}", base, reference),
                None => base,
            };
            debug!(
                "Resolved component '{}' source to {}",
                component.path, component.source
            );
        } else if !is_remote_module_source(&declared) {
            return Err(ProjectionError::UnknownSource {
                component: component.path.clone(),
                source: declared,
            });
        }
    }
    Ok(())
}

/// Derives each component's on-disk `full_path`.
///
/// Remote-origin components land in the module cache; local components live
/// in the project's Terraform directory. Call after
/// [`resolve_component_sources`] so locator detection sees resolved sources.
pub fn resolve_component_paths(blueprint: &mut Blueprint, project_root: &Path) {
    for component in &mut blueprint.terraform_components {
        let base = if is_remote_module_source(&component.source) {
            project_root.join(MODULE_CACHE_DIR)
        } else {
            project_root.join(LOCAL_MODULE_DIR)
        };
        component.full_path = base.join(&component.path);
    }
}
