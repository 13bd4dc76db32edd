//! Environments
//!
//! An environment is a root directory with one subdirectory per [`Area`].
//! Child environments (sandboxes and transactions) live under the parent's
//! [`ENVS_DIR`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Subfolder holding child environments
pub const ENVS_DIR: &str = "_ENVS";

/// File at an environment root holding its [`EnvironmentConfig`]
pub const CONFIG_FILE: &str = "environment.yaml";

/// Behaviour on a read miss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadMissPolicy {
    /// Report the miss
    FailOnReadMisses,
    /// Retry against the parent and copy the result down
    #[default]
    FailoverToParent,
}

/// Per-environment settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Read-miss policy
    #[serde(default)]
    pub read_misses: ReadMissPolicy,
}

/// Logical area of an environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Area {
    /// Raw postings and posting records
    Postings,
    /// Versioned manifests
    Manifests,
    /// Client-facing exports
    Client,
    /// Store bookkeeping such as the foreign-key registry
    System,
}

impl Area {
    /// Every area
    pub const ALL: [Area; 4] = [Area::Postings, Area::Manifests, Area::Client, Area::System];

    /// Directory name under the environment root
    #[must_use]
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Postings => "postings",
            Self::Manifests => "manifests",
            Self::Client => "client",
            Self::System => "_SYSTEM",
        }
    }
}

/// One view of the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    name: String,
    parent: Option<String>,
    root: PathBuf,
    config: EnvironmentConfig,
}

impl Environment {
    pub(crate) fn new(
        name: impl Into<String>,
        parent: Option<String>,
        root: PathBuf,
        config: EnvironmentConfig,
    ) -> Self {
        Self {
            name: name.into(),
            parent,
            root,
            config,
        }
    }

    /// Environment name; transaction environments are named by transaction id
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent environment name; `None` for the base environment
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Settings
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    /// Directory of `area`
    #[must_use]
    pub fn area_root(&self, area: Area) -> PathBuf {
        self.root.join(area.dir_name())
    }

    /// Absolute path of `rel` inside `area`
    #[must_use]
    pub fn path(&self, area: Area, rel: &Path) -> PathBuf {
        self.area_root(area).join(rel)
    }

    /// Root directory of child environment `name`
    #[must_use]
    pub fn child_root(&self, name: &str) -> PathBuf {
        self.root.join(ENVS_DIR).join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let env = Environment::new("base", None, PathBuf::from("/kb"), EnvironmentConfig::default());
        assert_eq!(
            env.path(Area::Manifests, Path::new("acme/plan/W.v1.yaml")),
            PathBuf::from("/kb/manifests/acme/plan/W.v1.yaml")
        );
        assert_eq!(env.area_root(Area::System), PathBuf::from("/kb/_SYSTEM"));
        assert_eq!(env.child_root("txn-1"), PathBuf::from("/kb/_ENVS/txn-1"));
    }

    #[test]
    fn config_yaml() {
        let config: EnvironmentConfig =
            serde_yaml::from_str("read_misses: fail_on_read_misses").unwrap();
        assert_eq!(config.read_misses, ReadMissPolicy::FailOnReadMisses);
        let config: EnvironmentConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.read_misses, ReadMissPolicy::FailoverToParent);
    }
}
