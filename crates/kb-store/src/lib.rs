//! KB Store
//!
//! File-backed storage for versioned manifests.
//!
//! # Layout
//!
//! ```text
//! <root>/
//!   postings/                      raw postings and posting records
//!   manifests/<ns>/<name>/<kind>.v<N>.yaml
//!   client/                        client-facing exports
//!   _SYSTEM/foreign_keys.yaml      foreign-key registry
//!   _ENVS/<name or txn id>/...     child environments, same layout
//! ```
//!
//! # Guarantees
//!
//! - Versions of a document increase by exactly one, starting at 1
//! - A version that would orphan a live foreign-key reference is rejected
//!   before anything is written
//! - Writes inside a transaction reach the parent environment only on commit
//!
//! # Example
//!
//! ```rust
//! use kb_store::{EnvironmentConfig, Manifest, ManifestHandle, Store};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let mut store = Store::open(dir.path(), EnvironmentConfig::default()).unwrap();
//!
//! store.begin_transaction().unwrap();
//! let handle = ManifestHandle::new("acme", "plan", "Workstream", 1);
//! store
//!     .persist_manifest(&Manifest::new(&handle, serde_yaml::Value::Null))
//!     .unwrap();
//! store.commit_transaction().unwrap();
//!
//! assert_eq!(store.versions(&handle.identity).unwrap(), vec![1]);
//! ```

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

mod environment;
mod error;
mod foreign_key;
mod handle;
mod manifest;
mod store;
mod transaction;

pub use environment::{Area, Environment, EnvironmentConfig, ReadMissPolicy, CONFIG_FILE, ENVS_DIR};
pub use error::StoreError;
pub use foreign_key::{ForeignKeyError, ForeignKeyLink, ForeignKeyRegistry, REGISTRY_FILE};
pub use handle::{ManifestHandle, ManifestIdentity};
pub use manifest::{Manifest, ManifestMetadata, API_VERSION};
pub use store::{Store, BASE_ENVIRONMENT};
pub use transaction::{new_transaction_id, EventKind, TrackedEvent, TXN_PREFIX};
