//! The `arweave/paths` manifest: a JSON map from site paths to the
//! transaction IDs holding each resource.

use crate::error::VerificationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Content-Type a gateway serves for a path manifest.
pub const MANIFEST_CONTENT_TYPE: &str = "application/x.arweave-manifest+json";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ManifestIndex {
    pub path: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
}

/// A deserialized path manifest.
///
/// `paths` uses a `BTreeMap` so resource ordering is deterministic.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PathManifest {
    pub manifest: String,
    pub version: String,
    #[serde(default)]
    pub index: Option<ManifestIndex>,
    pub paths: BTreeMap<String, ManifestEntry>,
}

impl PathManifest {
    /// Parse a manifest body, rejecting documents that are not
    /// `arweave/paths` manifests.
    pub fn parse(body: &[u8]) -> Result<Self, VerificationError> {
        let manifest: Self = serde_json::from_slice(body)
            .map_err(|e| VerificationError::Manifest(e.to_string()))?;
        if manifest.manifest != "arweave/paths" {
            return Err(VerificationError::Manifest(format!(
                "unexpected manifest kind: {}",
                manifest.manifest
            )));
        }
        Ok(manifest)
    }

    /// `(path, tx_id)` pairs for every resource, index path first.
    pub fn resources(&self) -> Vec<(String, String)> {
        let index_path = self.index.as_ref().map(|i| i.path.as_str());
        let mut resources: Vec<(String, String)> = Vec::with_capacity(self.paths.len());

        if let Some(path) = index_path {
            if let Some(entry) = self.paths.get(path) {
                resources.push((path.to_string(), entry.id.clone()));
            }
        }
        for (path, entry) in &self.paths {
            if Some(path.as_str()) != index_path {
                resources.push((path.clone(), entry.id.clone()));
            }
        }
        resources
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "manifest": "arweave/paths",
        "version": "0.1.0",
        "index": { "path": "index.html" },
        "paths": {
            "assets/logo.svg": { "id": "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb" },
            "index.html": { "id": "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa" }
        }
    }"#;

    #[test]
    fn parses_and_orders_index_first() {
        let manifest = PathManifest::parse(SAMPLE.as_bytes()).expect("valid manifest");
        let resources = manifest.resources();
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0].0, "index.html");
        assert_eq!(resources[1].0, "assets/logo.svg");
    }

    #[test]
    fn rejects_wrong_manifest_kind() {
        let body = r#"{"manifest":"something/else","version":"0.1.0","paths":{}}"#;
        assert!(matches!(
            PathManifest::parse(body.as_bytes()),
            Err(VerificationError::Manifest(_))
        ));
    }

    #[test]
    fn rejects_non_json() {
        assert!(PathManifest::parse(b"<html></html>").is_err());
    }

    #[test]
    fn manifest_without_index_lists_all_paths() {
        let body = r#"{
            "manifest": "arweave/paths",
            "version": "0.1.0",
            "paths": { "a.txt": { "id": "ccccccccccccccccccccccccccccccccccccccccccc" } }
        }"#;
        let manifest = PathManifest::parse(body.as_bytes()).expect("valid manifest");
        assert_eq!(manifest.resources().len(), 1);
    }
}
