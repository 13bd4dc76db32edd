//! Testing utilities for the KB workspace
//!
//! Shared fixtures: tables, temporary stores and small manifests.

#![allow(missing_docs)]

use kb_breakdown::{Cell, Table, TableSource};
use kb_store::{EnvironmentConfig, Manifest, ManifestHandle, Store};
use tempfile::TempDir;

/// Store in a temporary directory; the directory lives as long as this value
pub struct TempStore {
    pub dir: TempDir,
    pub store: Store,
}

pub fn temp_store() -> TempStore {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path(), EnvironmentConfig::default()).unwrap();
    TempStore { dir, store }
}

/// Text cell, blank for `""`
pub fn cell(text: &str) -> Cell {
    if text.is_empty() {
        Cell::Blank
    } else {
        Cell::from(text)
    }
}

pub fn table(columns: &[&str], rows: &[&[&str]]) -> Table {
    Table::new(
        columns.iter().map(ToString::to_string).collect(),
        rows.iter()
            .map(|row| row.iter().map(|c| cell(c)).collect())
            .collect(),
    )
    .unwrap()
    .with_source(TableSource {
        sheet: Some("Fixture".to_string()),
        range: Some(format!("A1:{}{}", column_letter(columns.len()), rows.len() + 1)),
        first_row_number: 2,
    })
}

fn column_letter(count: usize) -> char {
    let offset = u8::try_from(count.clamp(1, 26) - 1).unwrap_or(0);
    char::from(b'A' + offset)
}

/// Root set on row 0 only, Mid on rows 0 and 2, Leaf on every row
pub fn root_mid_leaf_table() -> Table {
    table(
        &["Root", "Mid", "Leaf"],
        &[
            &["r", "m1", "l1"],
            &["", "", "l2"],
            &["", "m2", "l3"],
            &["", "", "l4"],
        ],
    )
}

/// Mid named on row 0 with nothing to its right, then omitted on row 1
pub fn carried_forward_table() -> Table {
    table(
        &["Root", "Mid", "Mid Note", "Leaf"],
        &[&["r", "m1", "", ""], &["", "", "note", "l1"]],
    )
}

/// Mid omitted on row 1 although row 0 has data to its right
pub fn blank_mid_table() -> Table {
    table(
        &["Root", "Mid", "Mid Note", "Leaf"],
        &[&["r", "m1", "x", "l0"], &["", "", "note", "l1"]],
    )
}

/// Manifest whose assertion holds one instance per UID
pub fn manifest_with_uids(handle: &ManifestHandle, uids: &[&str]) -> Manifest {
    let mut yaml = String::from("items:\n");
    for (i, uid) in uids.iter().enumerate() {
        yaml.push_str(&format!("  I{i}:\n    UID: {uid}\n"));
    }
    if uids.is_empty() {
        yaml = "items: {}\n".to_string();
    }
    Manifest::new(handle, serde_yaml::from_str(&yaml).unwrap())
}
