//! Git/OCI origin detection and reference projection for sources.

use crate::blueprint::{Source, DEFAULT_INTERVAL_SECS};
use crate::platform::{GitSourceSpec, OciSourceSpec};

/// Scheme marking a source url as OCI-origin.
pub const OCI_SCHEME: &str = "oci://";

/// Tag applied to an OCI source when nothing else pins its version.
pub const DEFAULT_OCI_TAG: &str = "latest";

/// Origin classification of a source url.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Git,
    Oci,
}

/// Classifies a url by its scheme. Everything that is not `oci://` is treated
/// as Git-origin, including ssh and plain https urls.
pub fn origin_of(url: &str) -> Origin {
    if url.trim_start().starts_with(OCI_SCHEME) {
        Origin::Oci
    } else {
        Origin::Git
    }
}

/// Splits a trailing `:tag` off an OCI url.
///
/// Only a colon in the last path segment counts, and an all-digit suffix is a
/// registry port rather than a tag. Returns the url without the tag plus the
/// extracted tag, if any.
pub fn split_oci_reference(url: &str) -> (String, Option<String>) {
    let trimmed = url.trim().trim_end_matches('/');
    let rest = trimmed.strip_prefix(OCI_SCHEME).unwrap_or(trimmed);
    let segment_start = rest.rfind('/').map(|i| i + 1).unwrap_or(0);
    let segment = &rest[segment_start..];
    if let Some(colon) = segment.rfind(':') {
        let candidate = &segment[colon + 1..];
        if !candidate.is_empty() && !candidate.bytes().all(|b| b.is_ascii_digit()) {
            let cut = trimmed.len() - (segment.len() - colon);
            return (trimmed[..cut].to_string(), Some(candidate.to_string()));
        }
    }
    (trimmed.to_string(), None)
}

/// Projects a Git-origin source into its applyable form.
pub fn project_git_source(source: &Source, namespace: &str) -> GitSourceSpec {
    GitSourceSpec {
        name: source.name.clone(),
        namespace: namespace.to_string(),
        url: source.url.trim().to_string(),
        reference: source.reference.clone(),
        secret_name: source.secret_name.clone(),
        interval: DEFAULT_INTERVAL_SECS,
    }
}

/// Projects an OCI-origin source into its applyable form.
///
/// Explicit `ref` fields (digest, semver, tag) always beat a tag embedded in
/// the url; with nothing populated anywhere the tag defaults to `latest`.
pub fn project_oci_source(source: &Source, namespace: &str) -> OciSourceSpec {
    let (url, url_tag) = split_oci_reference(&source.url);
    let digest = populated(&source.reference.digest);
    let semver = populated(&source.reference.semver);
    let explicit_tag = populated(&source.reference.tag);

    let explicit = digest.is_some() || semver.is_some() || explicit_tag.is_some();
    let mut tag = if explicit { explicit_tag } else { url_tag };
    if digest.is_none() && semver.is_none() && tag.is_none() {
        tag = Some(DEFAULT_OCI_TAG.to_string());
    }

    OciSourceSpec {
        name: source.name.clone(),
        namespace: namespace.to_string(),
        url,
        tag,
        semver,
        digest,
        secret_name: source.secret_name.clone(),
        interval: DEFAULT_INTERVAL_SECS,
    }
}

fn populated(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
