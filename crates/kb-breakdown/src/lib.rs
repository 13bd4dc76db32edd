//! KB Breakdown
//!
//! Turns a posted table into a [`BreakdownTree`]: the columns are split into
//! [`Interval`]s by an [`IntervalStrategy`], then each row is read interval by
//! interval and every named entity is docked under its nearest ancestor.
//!
//! # Example
//!
//! ```rust
//! use kb_breakdown::{
//!     BreakdownBuilder, BuildConfig, Cell, ClosedOpenIntervals, IntervalStrategy, Table,
//! };
//!
//! let mut table = Table::new(
//!     vec!["Workstream".into(), "Deliverable".into()],
//!     vec![
//!         vec![Cell::from("Plan"), Cell::from("Budget")],
//!         vec![Cell::Blank, Cell::from("Timeline")],
//!     ],
//! )
//! .unwrap();
//!
//! let intervals = ClosedOpenIntervals::new(vec!["Deliverable".into()])
//!     .intervals(table.columns())
//!     .unwrap();
//! let mut builder = BreakdownBuilder::new(BuildConfig::default());
//! builder.read_table(&intervals, &mut table).unwrap();
//!
//! let tree = builder.finish().unwrap();
//! let uids: Vec<String> = tree.uids().iter().map(ToString::to_string).collect();
//! assert_eq!(uids, ["W1", "W1.D1", "W1.D2"]);
//! ```

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

mod builder;
mod interval;
mod serialize;
mod table;
mod tree;

pub use builder::{BreakdownBuilder, BreakdownError, BuildConfig, UpdatePolicy};
pub use interval::{
    ClosedOpenIntervals, GreedyIntervals, Interval, IntervalError, IntervalStrategy,
    MinimalistIntervals,
};
pub use serialize::{
    from_document, from_nested_mapping, to_document, to_nested_mapping, yaml_field_name,
    SerializeError, NAME_SUFFIX,
};
pub use table::{base_name, is_uid_column, Cell, Table, TableError, TableSource, UID_COLUMN};
pub use tree::{BreakdownTree, EntityInstance, FlatInstance};
