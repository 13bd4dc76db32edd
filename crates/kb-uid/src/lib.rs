//! KB UID System
//!
//! Hierarchical, dot-separated identifiers for entity instances.
//!
//! # Core Concepts
//!
//! - [`UidPath`]: parsed UID such as `W3.E12.AC1`
//! - [`UidGenerator`]: monotonic counters scoped by `(parent, acronym)`
//! - [`AcronymRegistry`]: stable entity type -> acronym assignment
//! - [`collect_uids`]: every UID present in a serialized document
//!
//! # Example
//!
//! ```rust
//! use kb_uid::{UidGenerator, UidPath};
//!
//! let mut gen = UidGenerator::new();
//! let prior: UidPath = "W1.E3".parse().unwrap();
//! gen.reserve(&prior);
//!
//! let (uid, _) = gen.generate("E", prior.parent().as_ref()).unwrap();
//! assert_eq!(uid.to_string(), "W1.E4");
//! ```

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

mod acronym;
mod collect;
mod generator;
mod uid;

pub use acronym::{AcronymError, AcronymRegistry};
pub use collect::{collect_uids, UID_KEY};
pub use generator::{UidGenerator, UidStart};
pub use uid::{is_valid_acronym, UidError, UidPath, UidSegment, UID_GRAMMAR};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
