//! Posting controller
//!
//! Drives one posting end to end:
//!
//! 1. Partition the table's columns with the kind's interval strategy
//! 2. Reserve the UIDs of every earlier version of the document
//! 3. Build the breakdown tree and serialize it into the next manifest
//! 4. In one transaction, archive the table and its posting record, persist
//!    the manifest, register reference links and refresh the client export
//!
//! Any failure aborts the transaction, leaving the store as it was.

use crate::config::{KbConfig, PostingConfig, ReferenceSpec};
use crate::error::{KbError, KbErrorKind};
use crate::trace::{FunctionalTrace, TraceFrame};
use chrono::{DateTime, Utc};
use kb_breakdown::{
    base_name, to_document, yaml_field_name, BreakdownBuilder, BreakdownTree, Cell, Interval,
    IntervalError, Table,
};
use kb_store::{Area, ForeignKeyLink, Manifest, ManifestHandle, ManifestIdentity, Store};
use kb_uid::{UidPath, UidStart};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Label key holding the posting record id
pub const POSTING_LABEL: &str = "posting";

/// Archived metadata of one posting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingRecord {
    /// Record id: timestamp plus checksum prefix
    pub id: String,
    /// Caller-supplied description, e.g. the source file
    pub label: String,
    /// Manifest version produced
    pub manifest: ManifestHandle,
    /// blake3 of the archived table, hex encoded
    pub checksum: String,
    /// Data rows posted
    pub rows: usize,
    /// Column headers posted
    pub columns: Vec<String>,
    /// Posting time
    pub posted_at: DateTime<Utc>,
}

/// Result of a successful posting
#[derive(Debug, Clone)]
pub struct PostingOutcome {
    /// Manifest version written
    pub handle: ManifestHandle,
    /// Archived record
    pub record: PostingRecord,
    /// Every UID in the new version, depth first
    pub uids: Vec<UidPath>,
    /// Reference links registered
    pub links: Vec<ForeignKeyLink>,
}

/// Posts tables as new versions of one document
#[derive(Debug, Clone)]
pub struct PostingController {
    identity: ManifestIdentity,
    posting: PostingConfig,
    uid_start: UidStart,
}

impl PostingController {
    /// Controller for `identity` using the settings of its kind
    #[must_use]
    pub fn new(config: &KbConfig, identity: ManifestIdentity) -> Self {
        let posting = config.posting(&identity.kind);
        Self {
            identity,
            posting,
            uid_start: config.uid_start,
        }
    }

    /// Controller with explicit settings
    #[must_use]
    pub fn with_posting_config(
        identity: ManifestIdentity,
        posting: PostingConfig,
        uid_start: UidStart,
    ) -> Self {
        Self {
            identity,
            posting,
            uid_start,
        }
    }

    /// Document this controller posts to
    #[must_use]
    pub fn identity(&self) -> &ManifestIdentity {
        &self.identity
    }

    /// Post `table` as the next version of the document
    ///
    /// The table may be repaired in place (carried-forward entity names).
    ///
    /// # Errors
    /// Returns a [`KbError`] whose trace names the posting; the store is
    /// left unchanged
    pub fn post(
        &self,
        store: &mut Store,
        table: &mut Table,
        label: &str,
    ) -> Result<PostingOutcome, KbError> {
        let mut trace = FunctionalTrace::new();
        let frame = TraceFrame::new("posting table")
            .with("document", &self.identity)
            .with("source", table.source())
            .with("label", label);
        trace.doing(frame, |trace| self.post_traced(trace, store, table, label))
    }

    fn post_traced(
        &self,
        trace: &mut FunctionalTrace,
        store: &mut Store,
        table: &mut Table,
        label: &str,
    ) -> Result<PostingOutcome, KbError> {
        let strategy = self.posting.strategy.build();
        let intervals = trace.doing(
            TraceFrame::new("partitioning columns").with("strategy", strategy.name()),
            |_| Ok(strategy.intervals(table.columns())?),
        )?;

        let versions = store.versions(&self.identity)?;
        let version = versions.last().map_or(1, |v| v + 1);

        let mut builder = BreakdownBuilder::new(self.posting.build_config(self.uid_start)?);
        trace.doing(
            TraceFrame::new("reserving prior UIDs").with("versions", versions.len()),
            |_| {
                for v in &versions {
                    let prior = store.retrieve_manifest(&self.identity.at_version(*v))?;
                    builder.reserve_uids(&prior.uids()?);
                }
                Ok(())
            },
        )?;

        trace.doing(
            TraceFrame::new("building breakdown tree").with("rows", table.len()),
            |_| Ok(builder.read_table(&intervals, table)?),
        )?;
        let tree = match builder.finish() {
            Some(tree) => tree,
            None => self.empty_tree(&intervals)?,
        };

        let handle = self.identity.at_version(version);
        let table_yaml = table.to_yaml_string()?;
        let checksum = hex::encode(blake3::hash(table_yaml.as_bytes()).as_bytes());
        let posted_at = Utc::now();
        let record = PostingRecord {
            id: format!("{}-{}", posted_at.format("%Y%m%dT%H%M%S%3fZ"), &checksum[..12]),
            label: label.to_string(),
            manifest: handle.clone(),
            checksum,
            rows: table.len(),
            columns: table.columns().to_vec(),
            posted_at,
        };
        let manifest = Manifest::new(&handle, serde_yaml::Value::Mapping(to_document(&tree)))
            .with_label(POSTING_LABEL, record.id.clone());

        let links = trace.doing(TraceFrame::new("resolving reference columns"), |_| {
            self.reference_links(store, table, &tree, &handle)
        })?;

        trace.doing(
            TraceFrame::new("persisting posting").with("manifest", &handle),
            |_| {
                store.begin_transaction()?;
                let result = self.persist(store, &record, &table_yaml, &manifest, &links);
                match result {
                    Ok(()) => store.commit_transaction().map_err(KbError::from),
                    Err(err) => {
                        if let Err(abort) = store.abort_transaction() {
                            tracing::error!("Failed to abort posting transaction: {}", abort);
                        }
                        Err(err)
                    }
                }
            },
        )?;

        let uids = tree.uids();
        tracing::info!(
            "Posted {} ({} instances, {} links) as record {}",
            handle,
            uids.len(),
            links.len(),
            record.id
        );
        Ok(PostingOutcome {
            handle,
            record,
            uids,
            links,
        })
    }

    /// Tree for a table with no data rows
    fn empty_tree(&self, intervals: &[Interval]) -> Result<BreakdownTree, KbError> {
        let root = self
            .posting
            .root_entity
            .clone()
            .or_else(|| intervals.first().map(|i| i.entity_name().to_string()))
            .ok_or(KbErrorKind::Interval(IntervalError::Empty))?;
        let root_uid = self.posting.build_config(self.uid_start)?.root_uid;
        Ok(BreakdownTree::new(root, root_uid))
    }

    fn persist(
        &self,
        store: &mut Store,
        record: &PostingRecord,
        table_yaml: &str,
        manifest: &Manifest,
        links: &[ForeignKeyLink],
    ) -> Result<(), KbError> {
        let dir = self.identity.rel_dir();
        store.write(
            Area::Postings,
            dir.join(format!("{}.table.yaml", record.id)),
            table_yaml.as_bytes(),
        )?;
        let record_yaml = serde_yaml::to_string(record)
            .map_err(|e| KbErrorKind::Config(format!("cannot serialize posting record: {e}")))?;
        store.write(
            Area::Postings,
            dir.join(format!("{}.record.yaml", record.id)),
            record_yaml.as_bytes(),
        )?;

        store.persist_manifest(manifest)?;
        for link in links {
            store.register_foreign_key(link.clone())?;
        }

        let export = serde_yaml::to_string(&manifest.assertion)
            .map_err(|e| KbErrorKind::Config(format!("cannot serialize client export: {e}")))?;
        store.write(Area::Client, self.client_export_path(), export.as_bytes())?;
        Ok(())
    }

    /// Latest view of the document in the client area
    #[must_use]
    pub fn client_export_path(&self) -> PathBuf {
        self.identity
            .rel_dir()
            .join(format!("{}.yaml", self.identity.kind))
    }

    /// One link per instance carrying a reference cell
    fn reference_links(
        &self,
        store: &Store,
        table: &Table,
        tree: &BreakdownTree,
        handle: &ManifestHandle,
    ) -> Result<Vec<ForeignKeyLink>, KbError> {
        let mut links = Vec::new();
        for spec in &self.posting.references {
            if table.column_index(&spec.column).is_none() {
                tracing::warn!(
                    "Reference column '{}' is not in the posted table; skipping",
                    spec.column
                );
                continue;
            }
            let referenced = self.referenced_handle(store, spec)?;
            let field = yaml_field_name(base_name(&spec.column));
            for instance in tree.flatten() {
                let Some(cell) = instance.scalars.get(&field).filter(|c| !c.is_blank()) else {
                    continue;
                };
                links.push(ForeignKeyLink {
                    referencing: handle.clone(),
                    path: format!("{}.{field}", instance.uid),
                    referenced: referenced.clone(),
                    uids: parse_reference_cell(spec, cell)?,
                });
            }
        }
        Ok(links)
    }

    fn referenced_handle(
        &self,
        store: &Store,
        spec: &ReferenceSpec,
    ) -> Result<ManifestHandle, KbError> {
        let latest = store.latest_version(&spec.referenced)?.ok_or_else(|| {
            KbErrorKind::Reference {
                column: spec.column.clone(),
                detail: format!("referenced document {} has no versions", spec.referenced),
            }
        })?;
        Ok(spec.referenced.at_version(latest))
    }
}

/// UIDs in a reference cell, separated by commas, semicolons or whitespace
fn parse_reference_cell(spec: &ReferenceSpec, cell: &Cell) -> Result<BTreeSet<UidPath>, KbError> {
    cell.display()
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<UidPath>().map_err(|e| {
                KbError::from(KbErrorKind::Reference {
                    column: spec.column.clone(),
                    detail: e.to_string(),
                })
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ReferenceSpec {
        ReferenceSpec {
            column: "Depends On".into(),
            referenced: ManifestIdentity::new("acme", "plan", "Workstream"),
        }
    }

    #[test]
    fn reference_cells_split_on_separators() {
        let uids = parse_reference_cell(&spec(), &Cell::from("W1.E3, W2;W4  W5")).unwrap();
        let got: Vec<String> = uids.iter().map(ToString::to_string).collect();
        assert_eq!(got, vec!["W1.E3", "W2", "W4", "W5"]);
    }

    #[test]
    fn malformed_reference_is_a_user_error() {
        let err = parse_reference_cell(&spec(), &Cell::from("W1.e3")).unwrap_err();
        assert!(err.is_user_error());
        assert!(err.to_string().contains("Depends On"));
    }
}
