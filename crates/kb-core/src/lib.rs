//! KB Core
//!
//! Turns posted tables into versioned manifests:
//! - Loads configuration per document kind
//! - Drives partitioning, tree building and serialization
//! - Persists each posting atomically, with reference links
//! - Reports failures with the trace of operations in progress
//!
//! # Example
//!
//! ```rust
//! use kb_core::{KbConfig, PostingConfig, PostingController, StrategyConfig};
//! use kb_breakdown::{Cell, Table};
//! use kb_store::{ManifestIdentity, Store};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let config = KbConfig::new()
//!     .with_store_root(dir.path())
//!     .with_kind(
//!         "Plan",
//!         PostingConfig::default().with_strategy(StrategyConfig::split_at(&["Deliverable"])),
//!     );
//! let mut store = Store::open(&config.store_root, config.environment()).unwrap();
//!
//! let mut table = Table::new(
//!     vec!["Workstream".into(), "Deliverable".into()],
//!     vec![vec![Cell::from("Ops"), Cell::from("Runbook")]],
//! )
//! .unwrap();
//!
//! let controller = PostingController::new(&config, ManifestIdentity::new("acme", "q3", "Plan"));
//! let outcome = controller.post(&mut store, &mut table, "q3.yaml").unwrap();
//! assert_eq!(outcome.handle.version, 1);
//! ```

#![warn(unreachable_pub)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod posting;
pub mod trace;

pub use config::{KbConfig, PostingConfig, ReferenceSpec, StrategyConfig};
pub use error::{KbError, KbErrorKind};
pub use posting::{PostingController, PostingOutcome, PostingRecord, POSTING_LABEL};
pub use trace::{FunctionalTrace, TraceFrame};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
