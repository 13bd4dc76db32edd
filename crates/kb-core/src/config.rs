//! Configuration
//!
//! ```toml
//! store_root = "kb-store"
//! read_misses = "failover_to_parent"
//! uid_start = "one"
//! log_filter = "info"
//!
//! [kinds.Workstream]
//! root_uid = "P1"
//! strategy = { type = "closed_open", split_points = ["Deliverable"] }
//!
//! [[kinds.Workstream.references]]
//! column = "Depends On"
//! referenced = { namespace = "acme", name = "plan", kind = "Workstream" }
//! ```

use crate::error::{KbError, KbErrorKind};
use kb_breakdown::{
    BuildConfig, ClosedOpenIntervals, GreedyIntervals, IntervalStrategy, MinimalistIntervals,
    UpdatePolicy,
};
use kb_store::{EnvironmentConfig, ManifestIdentity, ReadMissPolicy};
use kb_uid::{UidPath, UidStart};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KbConfig {
    /// Root directory of the base environment
    pub store_root: PathBuf,
    /// Read-miss policy of the base environment's children
    pub read_misses: ReadMissPolicy,
    /// First counter for fresh UID scopes
    pub uid_start: UidStart,
    /// Default `tracing` filter directive
    pub log_filter: String,
    /// Per document kind settings
    pub kinds: BTreeMap<String, PostingConfig>,
}

impl Default for KbConfig {
    fn default() -> Self {
        Self {
            store_root: PathBuf::from("kb-store"),
            read_misses: ReadMissPolicy::FailoverToParent,
            uid_start: UidStart::One,
            log_filter: "info".to_string(),
            kinds: BTreeMap::new(),
        }
    }
}

impl KbConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With store root
    #[inline]
    #[must_use]
    pub fn with_store_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.store_root = root.into();
        self
    }

    /// With settings for one document kind
    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>, posting: PostingConfig) -> Self {
        self.kinds.insert(kind.into(), posting);
        self
    }

    /// Parse TOML
    ///
    /// # Errors
    /// Returns [`KbErrorKind::Config`] on invalid TOML
    pub fn from_toml_str(text: &str) -> Result<Self, KbError> {
        toml::from_str(text).map_err(|e| KbErrorKind::Config(e.to_string()).into())
    }

    /// Load from a TOML file; relative store roots resolve against its directory
    ///
    /// # Errors
    /// Returns [`KbErrorKind::Config`] if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, KbError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            KbError::from(KbErrorKind::Config(format!("{}: {e}", path.display())))
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if config.store_root.is_relative() {
            if let Some(dir) = path.parent() {
                config.store_root = dir.join(&config.store_root);
            }
        }
        Ok(config)
    }

    /// Settings for `kind`, defaults if unconfigured
    #[must_use]
    pub fn posting(&self, kind: &str) -> PostingConfig {
        self.kinds.get(kind).cloned().unwrap_or_default()
    }

    /// Settings of the base environment
    #[must_use]
    pub fn environment(&self) -> EnvironmentConfig {
        EnvironmentConfig {
            read_misses: self.read_misses,
        }
    }
}

/// Posting settings for one document kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostingConfig {
    /// Column partitioning
    pub strategy: StrategyConfig,
    /// Entity at the document root; defaults to the leftmost entity
    pub root_entity: Option<String>,
    /// UID prefix of root instances
    pub root_uid: Option<String>,
    /// Reuse UIDs supplied in identifier columns
    pub reuse_uids: bool,
    /// Columns holding UIDs of other documents
    pub references: Vec<ReferenceSpec>,
}

impl Default for PostingConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyConfig::default(),
            root_entity: None,
            root_uid: None,
            reuse_uids: true,
            references: Vec::new(),
        }
    }
}

impl PostingConfig {
    /// With a strategy
    #[must_use]
    pub fn with_strategy(mut self, strategy: StrategyConfig) -> Self {
        self.strategy = strategy;
        self
    }

    /// With a reference column
    #[must_use]
    pub fn with_reference(mut self, reference: ReferenceSpec) -> Self {
        self.references.push(reference);
        self
    }

    /// Builder settings
    ///
    /// # Errors
    /// Returns error if `root_uid` is malformed
    pub fn build_config(&self, uid_start: UidStart) -> Result<BuildConfig, KbError> {
        let root_uid = self
            .root_uid
            .as_deref()
            .map(str::parse::<UidPath>)
            .transpose()?;
        Ok(BuildConfig {
            root_entity: self.root_entity.clone(),
            root_uid,
            uid_start,
            update_policy: UpdatePolicy {
                reuse_uids: self.reuse_uids,
            },
        })
    }
}

/// Column partitioning policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// One interval over every column
    Greedy {
        /// Columns that must be present
        #[serde(default)]
        mandatory_columns: Vec<String>,
    },
    /// One interval per non-identifier column
    Minimalist,
    /// Intervals starting at the named columns
    ClosedOpen {
        /// First column of every interval after the first
        #[serde(default)]
        split_points: Vec<String>,
        /// Columns that must be present
        #[serde(default)]
        mandatory_columns: Vec<String>,
    },
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::Greedy {
            mandatory_columns: Vec::new(),
        }
    }
}

impl StrategyConfig {
    /// Split at `columns`, no mandatory columns
    #[must_use]
    pub fn split_at(columns: &[&str]) -> Self {
        Self::ClosedOpen {
            split_points: columns.iter().map(ToString::to_string).collect(),
            mandatory_columns: Vec::new(),
        }
    }

    /// Instantiate the strategy
    #[must_use]
    pub fn build(&self) -> Box<dyn IntervalStrategy> {
        match self {
            Self::Greedy { mandatory_columns } => {
                Box::new(GreedyIntervals::new(mandatory_columns.clone()))
            }
            Self::Minimalist => Box::new(MinimalistIntervals),
            Self::ClosedOpen {
                split_points,
                mandatory_columns,
            } => Box::new(
                ClosedOpenIntervals::new(split_points.clone())
                    .with_mandatory(mandatory_columns.clone()),
            ),
        }
    }
}

/// Column whose cells hold UIDs of another document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSpec {
    /// Column header
    pub column: String,
    /// Referenced document
    pub referenced: ManifestIdentity,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_from_empty_toml() {
        assert_eq!(KbConfig::from_toml_str("").unwrap(), KbConfig::default());
    }

    #[test]
    fn full_toml() {
        let config = KbConfig::from_toml_str(
            r#"
store_root = "/srv/kb"
read_misses = "fail_on_read_misses"
uid_start = "zero"
log_filter = "debug"

[kinds.Workstream]
root_uid = "P1"
strategy = { type = "closed_open", split_points = ["Deliverable"] }

[[kinds.Workstream.references]]
column = "Depends On"
referenced = { namespace = "acme", name = "plan", kind = "Workstream" }
"#,
        )
        .unwrap();
        assert_eq!(config.read_misses, ReadMissPolicy::FailOnReadMisses);
        assert_eq!(config.uid_start, UidStart::Zero);

        let posting = config.posting("Workstream");
        assert_eq!(posting.strategy, StrategyConfig::split_at(&["Deliverable"]));
        assert!(posting.reuse_uids);
        assert_eq!(
            posting.references[0].referenced,
            ManifestIdentity::new("acme", "plan", "Workstream")
        );
        let build = posting.build_config(config.uid_start).unwrap();
        assert_eq!(build.root_uid.unwrap().to_string(), "P1");

        assert_eq!(config.posting("Other"), PostingConfig::default());
    }

    #[test]
    fn invalid_root_uid() {
        let posting = PostingConfig {
            root_uid: Some("p1".into()),
            ..PostingConfig::default()
        };
        assert!(posting.build_config(UidStart::One).is_err());
    }

    #[test]
    fn strategy_names() {
        assert_eq!(StrategyConfig::default().build().name(), "greedy");
        assert_eq!(StrategyConfig::Minimalist.build().name(), "minimalist");
        assert_eq!(StrategyConfig::split_at(&["A"]).build().name(), "closed-open");
    }

    #[test]
    fn relative_store_root_resolves_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.toml");
        std::fs::write(&path, "store_root = \"data\"\n").unwrap();
        let config = KbConfig::load(&path).unwrap();
        assert_eq!(config.store_root, dir.path().join("data"));
    }
}
