//! Transaction bookkeeping
//!
//! Each active transaction owns an environment one level below its parent
//! and records every write and delete as a relative-path event so commit
//! can replay them onto the parent.

use crate::environment::Area;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Prefix of generated transaction ids
pub const TXN_PREFIX: &str = "txn-";

/// Generate a transaction id: `txn-<uuid>`
#[must_use]
pub fn new_transaction_id() -> String {
    format!("{TXN_PREFIX}{}", uuid::Uuid::new_v4().simple())
}

/// Kind of tracked change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// File written in the transaction environment
    Write,
    /// File deleted in the transaction environment
    Delete,
}

/// One tracked change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedEvent {
    /// Area of the file
    pub area: Area,
    /// Path relative to the area root
    pub rel_path: PathBuf,
    /// Write or delete
    pub kind: EventKind,
}

/// Active transaction
#[derive(Debug, Clone)]
pub(crate) struct TransactionFrame {
    /// Transaction id, also the environment name
    pub(crate) id: String,
    /// Environment current when the transaction began
    pub(crate) parent: String,
    pub(crate) events: Vec<TrackedEvent>,
    /// Files deleted here that ancestors may still hold
    pub(crate) tombstones: BTreeSet<(Area, PathBuf)>,
}

impl TransactionFrame {
    pub(crate) fn new(id: String, parent: String) -> Self {
        Self {
            id,
            parent,
            events: Vec::new(),
            tombstones: BTreeSet::new(),
        }
    }

    pub(crate) fn record(&mut self, area: Area, rel_path: PathBuf, kind: EventKind) {
        let key = (area, rel_path.clone());
        match kind {
            EventKind::Write => {
                self.tombstones.remove(&key);
            }
            EventKind::Delete => {
                self.tombstones.insert(key);
            }
        }
        self.events.push(TrackedEvent {
            area,
            rel_path,
            kind,
        });
    }

    pub(crate) fn is_deleted(&self, area: Area, rel_path: &Path) -> bool {
        self.tombstones.contains(&(area, rel_path.to_path_buf()))
    }
}
