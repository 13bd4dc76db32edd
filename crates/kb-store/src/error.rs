//! Error types for the store
//!
//! Covers:
//! - File-system failures, including locked files
//! - Version sequencing violations
//! - Foreign-key violations
//! - Transaction and environment misuse

use crate::environment::Area;
use crate::foreign_key::ForeignKeyError;
use kb_uid::UidError;
use std::path::PathBuf;

/// Main store error type
#[derive(Debug, thiserror::Error)]
#[allow(missing_docs)]
pub enum StoreError {
    /// File absent from every environment consulted
    #[error("{} not found in area '{}'", .path.display(), .area.dir_name())]
    NotFound { area: Area, path: PathBuf },

    /// File locked or not accessible
    #[error("permission denied on {}; perhaps you have the file open?", .path.display())]
    PermissionDenied { path: PathBuf },

    /// Other I/O failure
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML (de)serialization failure
    #[error("invalid YAML in {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Identity component or relative path unusable in the store layout
    #[error("invalid {component} '{value}'")]
    InvalidIdentity {
        component: &'static str,
        value: String,
    },

    /// Version already exists, or would branch the history
    #[error("{handle} conflicts with existing latest version v{latest}; versions must increase by exactly one")]
    VersionConflict { handle: String, latest: u32 },

    /// Update of a document that has no prior version
    #[error("{handle} requires prior version v{} which does not exist", .version.saturating_sub(1))]
    MissingPriorVersion { handle: String, version: u32 },

    /// Version skips one or more predecessors
    #[error("{handle} skips versions; latest is v{latest}")]
    VersionGap { handle: String, latest: u32 },

    /// Stored manifest does not describe the path it was read from
    #[error("manifest at {} describes {found}, expected {expected}", .path.display())]
    ManifestMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    /// Foreign-key violation
    #[error(transparent)]
    ForeignKey(#[from] ForeignKeyError),

    /// Malformed UID inside a stored document
    #[error(transparent)]
    Uid(#[from] UidError),

    /// Commit or abort without a transaction
    #[error("no transaction is active")]
    NoActiveTransaction,

    /// Operation not allowed inside a transaction
    #[error("cannot {operation} while a transaction is active")]
    TransactionActive { operation: &'static str },

    /// Transaction stack and current environment disagree
    #[error("transaction stack is inconsistent: {detail}")]
    TransactionStackCorrupted { detail: String },

    /// Named environment does not exist
    #[error("environment '{name}' does not exist under '{parent}'")]
    EnvironmentNotFound { name: String, parent: String },

    /// Named environment already exists
    #[error("environment '{name}' already exists")]
    EnvironmentExists { name: String },

    /// Environment name unusable
    #[error("invalid environment name '{name}'")]
    InvalidEnvironmentName { name: String },

    /// Deactivate with only the base environment active
    #[error("the base environment cannot be deactivated")]
    AtBaseEnvironment,
}

impl StoreError {
    /// Map an I/O error on `path`
    pub(crate) fn io(area: Area, path: PathBuf, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { area, path },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source },
        }
    }

    /// Map an I/O error on a path outside any area
    pub(crate) fn fs(path: PathBuf, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source },
        }
    }

    /// True for a read miss
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if the operation was rejected to protect stored data
    #[inline]
    #[must_use]
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            Self::VersionConflict { .. }
                | Self::MissingPriorVersion { .. }
                | Self::VersionGap { .. }
                | Self::ForeignKey(_)
                | Self::NoActiveTransaction
                | Self::TransactionStackCorrupted { .. }
        )
    }

    /// Check if the end user can act on the error
    #[inline]
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied { .. }
                | Self::InvalidIdentity { .. }
                | Self::EnvironmentNotFound { .. }
                | Self::EnvironmentExists { .. }
                | Self::InvalidEnvironmentName { .. }
                | Self::ForeignKey(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_hint() {
        let err = StoreError::io(
            Area::Postings,
            PathBuf::from("p.yaml"),
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(err.is_user_error());
        assert!(err.to_string().contains("perhaps you have the file open?"));
    }

    #[test]
    fn not_found_maps() {
        let err = StoreError::io(
            Area::Client,
            PathBuf::from("x"),
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(err.is_not_found());
        assert!(!err.is_integrity_violation());
    }
}
