//! Foreign-key constraint registry
//!
//! A [`ForeignKeyLink`] records that a field of one document version refers
//! to UIDs of another document. Before a new version of the referenced
//! document is saved, every live link must still find its UIDs there.
//!
//! A link is live when its referencing version is the highest version known
//! for the referencing document. Older versions are immutable and have been
//! superseded, so their links are ignored.

use crate::handle::{ManifestHandle, ManifestIdentity};
use kb_uid::UidPath;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Relative path of the persisted registry inside the system area
pub const REGISTRY_FILE: &str = "foreign_keys.yaml";

/// Reference from a field of one document version to UIDs of another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyLink {
    /// Document version holding the reference
    pub referencing: ManifestHandle,
    /// Field path within the referencing document
    pub path: String,
    /// Referenced document version the link was validated against
    pub referenced: ManifestHandle,
    /// Referenced UIDs
    pub uids: BTreeSet<UidPath>,
}

/// Registered links
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRegistry {
    #[serde(default)]
    links: Vec<ForeignKeyLink>,
}

impl ForeignKeyRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All links, in registration order
    #[must_use]
    pub fn links(&self) -> &[ForeignKeyLink] {
        &self.links
    }

    /// Record a link; an identical link is stored once
    pub fn register(&mut self, link: ForeignKeyLink) {
        if !self.links.contains(&link) {
            self.links.push(link);
        }
    }

    /// Documents holding links to `referenced`
    #[must_use]
    pub fn referencing_identities(&self, referenced: &ManifestIdentity) -> BTreeSet<ManifestIdentity> {
        self.links
            .iter()
            .filter(|l| l.referenced.identity == *referenced)
            .map(|l| l.referencing.identity.clone())
            .collect()
    }

    /// Highest version of `identity` among registered referencing handles
    #[must_use]
    pub fn highest_linked_version(&self, identity: &ManifestIdentity) -> Option<u32> {
        self.links
            .iter()
            .filter(|l| l.referencing.identity == *identity)
            .map(|l| l.referencing.version)
            .max()
    }

    /// Check a candidate version against every live link
    ///
    /// `persisted_versions` maps referencing documents to their latest
    /// persisted version; the highest known version is the larger of that
    /// and the highest linked version. First versions are never checked.
    ///
    /// # Errors
    /// Returns [`ForeignKeyError::Orphaned`] naming the missing UIDs and the
    /// affected referencing documents
    pub fn check_constraints(
        &self,
        candidate: &ManifestHandle,
        candidate_uids: &BTreeSet<UidPath>,
        persisted_versions: &BTreeMap<ManifestIdentity, u32>,
    ) -> Result<(), ForeignKeyError> {
        if candidate.version <= 1 {
            return Ok(());
        }

        let mut missing = BTreeSet::new();
        let mut affected = Vec::new();
        for link in self
            .links
            .iter()
            .filter(|l| l.referenced.identity == candidate.identity)
        {
            let referencing = &link.referencing.identity;
            let highest = self
                .highest_linked_version(referencing)
                .into_iter()
                .chain(persisted_versions.get(referencing).copied())
                .max()
                .unwrap_or(link.referencing.version);
            if link.referencing.version < highest {
                tracing::debug!("ignoring superseded link from {}", link.referencing);
                continue;
            }

            let lost: Vec<&UidPath> = link.uids.difference(candidate_uids).collect();
            if !lost.is_empty() {
                missing.extend(lost.into_iter().map(ToString::to_string));
                affected.push(format!("{} ({})", link.referencing, link.path));
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ForeignKeyError::Orphaned {
                candidate: candidate.to_string(),
                missing: missing.into_iter().collect(),
                referencing: affected,
            })
        }
    }
}

/// Foreign-key violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[allow(missing_docs)]
pub enum ForeignKeyError {
    /// Saving the candidate would orphan live references
    #[error("cannot save {candidate}: UIDs {missing:?} are still referenced by {referencing:?}")]
    Orphaned {
        candidate: String,
        missing: Vec<String>,
        referencing: Vec<String>,
    },

    /// Link refers to UIDs absent from the referenced document
    #[error("{referencing} refers to UIDs {missing:?} that {referenced} does not contain")]
    DanglingReference {
        referencing: String,
        referenced: String,
        missing: Vec<String>,
    },

    /// Link refers to a document version that is not the latest
    #[error("{referencing} must reference the latest version of {referenced}, which is v{latest}")]
    StaleReference {
        referencing: String,
        referenced: String,
        latest: u32,
    },
}
