//! Manifest documents

use crate::handle::{ManifestHandle, ManifestIdentity};
use kb_uid::{collect_uids, UidError, UidPath};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// `apiVersion` written into every manifest
pub const API_VERSION: &str = "kb/v1";

/// Versioned document produced from a posting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Schema version of the manifest format
    pub api_version: String,
    /// Document kind
    pub kind: String,
    /// Identity, version and labels
    pub metadata: ManifestMetadata,
    /// Serialized breakdown tree
    pub assertion: serde_yaml::Value,
}

/// Manifest metadata block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Namespace
    pub namespace: String,
    /// Document name
    pub name: String,
    /// Version, starting at 1
    pub version: u32,
    /// Free-form labels, e.g. the posting that produced this version
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl Manifest {
    /// Create a manifest for `handle`
    #[must_use]
    pub fn new(handle: &ManifestHandle, assertion: serde_yaml::Value) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: handle.identity.kind.clone(),
            metadata: ManifestMetadata {
                namespace: handle.identity.namespace.clone(),
                name: handle.identity.name.clone(),
                version: handle.version,
                labels: BTreeMap::new(),
            },
            assertion,
        }
    }

    /// Add a label
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    /// Logical document
    #[must_use]
    pub fn identity(&self) -> ManifestIdentity {
        ManifestIdentity::new(
            self.metadata.namespace.clone(),
            self.metadata.name.clone(),
            self.kind.clone(),
        )
    }

    /// Handle of this version
    #[must_use]
    pub fn handle(&self) -> ManifestHandle {
        self.identity().at_version(self.metadata.version)
    }

    /// Every UID in the assertion
    ///
    /// # Errors
    /// Returns error if a `UID` field is malformed
    pub fn uids(&self) -> Result<BTreeSet<UidPath>, UidError> {
        collect_uids(&self.assertion)
    }

    /// Serialize to YAML
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Parse from YAML
    ///
    /// # Errors
    /// Returns error if the text is not a manifest
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Manifest {
        let assertion: serde_yaml::Value = serde_yaml::from_str(
            "workstream:\n  W1:\n    UID: W1\n    workstream: Plan\n  W1-name: Plan\n",
        )
        .unwrap();
        Manifest::new(&ManifestHandle::new("acme", "plan", "Workstream", 2), assertion)
            .with_label("posting", "p-1")
    }

    #[test]
    fn yaml_layout() {
        let text = sample().to_yaml().unwrap();
        assert!(text.starts_with("apiVersion: kb/v1\nkind: Workstream\nmetadata:\n"));
        assert!(text.contains("  version: 2\n"));
        assert_eq!(Manifest::from_yaml(&text).unwrap(), sample());
    }

    #[test]
    fn handle_and_uids() {
        let m = sample();
        assert_eq!(m.handle(), ManifestHandle::new("acme", "plan", "Workstream", 2));
        let uids: Vec<String> = m.uids().unwrap().iter().map(ToString::to_string).collect();
        assert_eq!(uids, vec!["W1"]);
    }
}
