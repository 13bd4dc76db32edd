//! Manifest identities and handles

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::path::PathBuf;

/// Logical document: every version shares one identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ManifestIdentity {
    /// Namespace, e.g. a project or client
    pub namespace: String,
    /// Document name
    pub name: String,
    /// Document kind, e.g. `Workstream`
    pub kind: String,
}

impl ManifestIdentity {
    /// Create an identity
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            kind: kind.into(),
        }
    }

    /// Handle of one version of this document
    #[must_use]
    pub fn at_version(&self, version: u32) -> ManifestHandle {
        ManifestHandle {
            identity: self.clone(),
            version,
        }
    }

    /// Check every component is usable as a path segment
    ///
    /// # Errors
    /// Returns [`StoreError::InvalidIdentity`] for empty components or ones
    /// containing path separators
    pub fn validate(&self) -> Result<(), StoreError> {
        for (component, value) in [
            ("namespace", &self.namespace),
            ("name", &self.name),
            ("kind", &self.kind),
        ] {
            if !is_path_safe(value) {
                return Err(StoreError::InvalidIdentity {
                    component,
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    /// Directory holding every version, relative to the manifests area
    #[must_use]
    pub fn rel_dir(&self) -> PathBuf {
        PathBuf::from(&self.namespace).join(&self.name)
    }

    /// File name of one version: `<kind>.v<N>.yaml`
    #[must_use]
    pub fn file_name(&self, version: u32) -> String {
        format!("{}.v{version}.yaml", self.kind)
    }

    /// Version encoded in `file_name`, if it names a version of this kind
    #[must_use]
    pub fn parse_version(&self, file_name: &str) -> Option<u32> {
        file_name
            .strip_prefix(self.kind.as_str())?
            .strip_prefix(".v")?
            .strip_suffix(".yaml")?
            .parse()
            .ok()
            .filter(|v| *v > 0)
    }
}

impl Display for ManifestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.name, self.kind)
    }
}

/// One persisted version of a document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ManifestHandle {
    /// Logical document
    pub identity: ManifestIdentity,
    /// Version, starting at 1
    pub version: u32,
}

impl ManifestHandle {
    /// Create a handle
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        kind: impl Into<String>,
        version: u32,
    ) -> Self {
        ManifestIdentity::new(namespace, name, kind).at_version(version)
    }

    /// Path relative to the manifests area
    #[must_use]
    pub fn rel_path(&self) -> PathBuf {
        self.identity
            .rel_dir()
            .join(self.identity.file_name(self.version))
    }
}

impl Display for ManifestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.identity, self.version)
    }
}

pub(crate) fn is_path_safe(value: &str) -> bool {
    !value.trim().is_empty()
        && value != "."
        && value != ".."
        && !value.contains(['/', '\\'])
}
