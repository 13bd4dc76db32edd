//! Posting Tests
//!
//! End-to-end postings through the controller into a temporary store.

use kb_breakdown::{from_document, BreakdownError};
use kb_core::{
    KbConfig, KbErrorKind, PostingConfig, PostingController, ReferenceSpec, StrategyConfig,
    POSTING_LABEL,
};
use kb_store::{Area, ForeignKeyError, ManifestIdentity, StoreError};
use kb_test_utils::{
    blank_mid_table, carried_forward_table, root_mid_leaf_table, table, temp_store,
};
use pretty_assertions::assert_eq;

fn plan_id() -> ManifestIdentity {
    ManifestIdentity::new("acme", "q3", "Plan")
}

fn report_id() -> ManifestIdentity {
    ManifestIdentity::new("acme", "q3-status", "Report")
}

fn config() -> KbConfig {
    KbConfig::new()
        .with_kind(
            "Plan",
            PostingConfig::default().with_strategy(StrategyConfig::split_at(&["Mid", "Leaf"])),
        )
        .with_kind(
            "Report",
            PostingConfig::default()
                .with_strategy(StrategyConfig::Greedy {
                    mandatory_columns: vec!["Status".into()],
                })
                .with_reference(ReferenceSpec {
                    column: "Covers".into(),
                    referenced: plan_id(),
                }),
        )
}

fn uid_strings(uids: &[kb_uid::UidPath]) -> Vec<String> {
    uids.iter().map(ToString::to_string).collect()
}

#[test]
fn test_leaves_dock_under_nearest_mid() {
    let mut ts = temp_store();
    let controller = PostingController::new(&config(), plan_id());
    let outcome = controller
        .post(&mut ts.store, &mut root_mid_leaf_table(), "fixture")
        .unwrap();
    assert_eq!(
        uid_strings(&outcome.uids),
        vec![
            "R1", "R1.M1", "R1.M1.L1", "R1.M1.L2", "R1.M2", "R1.M2.L1", "R1.M2.L2"
        ]
    );
    assert_eq!(outcome.handle.version, 1);
}

#[test]
fn test_carried_forward_name_is_repaired() {
    let mut ts = temp_store();
    let controller = PostingController::new(&config(), plan_id());
    let mut table = carried_forward_table();
    let outcome = controller.post(&mut ts.store, &mut table, "fixture").unwrap();
    assert_eq!(uid_strings(&outcome.uids), vec!["R1", "R1.M1", "R1.M1.L1"]);
}

#[test]
fn test_true_blank_fails_with_row_and_trace() {
    let mut ts = temp_store();
    let controller = PostingController::new(&config(), plan_id());
    let err = controller
        .post(&mut ts.store, &mut blank_mid_table(), "q3.xlsx")
        .unwrap_err();

    match &err.kind {
        KbErrorKind::Breakdown(BreakdownError::EntityNameBlank {
            entity, row_number, ..
        }) => {
            assert_eq!(entity, "Mid");
            assert_eq!(*row_number, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_user_error());
    let activities: Vec<&str> = err.trace.iter().map(|f| f.activity.as_str()).collect();
    assert_eq!(activities, vec!["posting table", "building breakdown tree"]);
    assert!(err.to_string().contains("label=q3.xlsx"));
    assert!(ts.store.versions(&plan_id()).unwrap().is_empty());
}

#[test]
fn test_persisted_manifest_round_trips() {
    let mut ts = temp_store();
    let controller = PostingController::new(&config(), plan_id());
    let outcome = controller
        .post(&mut ts.store, &mut root_mid_leaf_table(), "fixture")
        .unwrap();

    let manifest = ts.store.retrieve_manifest(&outcome.handle).unwrap();
    assert_eq!(
        manifest.metadata.labels.get(POSTING_LABEL),
        Some(&outcome.record.id)
    );
    let doc = manifest.assertion.as_mapping().unwrap();
    let tree = from_document(doc, "root", None).unwrap();
    let uids: Vec<String> = tree.uids().iter().map(ToString::to_string).collect();
    assert_eq!(uids, uid_strings(&outcome.uids));
    assert_eq!(
        tree.find(&"R1.M2.L2".parse().unwrap()).unwrap().name(),
        "l4"
    );
}

#[test]
fn test_posting_archives_table_and_client_export() {
    let mut ts = temp_store();
    let controller = PostingController::new(&config(), plan_id());
    let outcome = controller
        .post(&mut ts.store, &mut root_mid_leaf_table(), "fixture")
        .unwrap();

    let record = &outcome.record;
    assert_eq!(record.checksum.len(), 64);
    assert_eq!(record.rows, 4);
    let archived = ts
        .store
        .read_to_string(Area::Postings, format!("acme/q3/{}.table.yaml", record.id))
        .unwrap();
    assert_eq!(
        blake3::hash(archived.as_bytes()).to_hex().to_string(),
        record.checksum
    );
    assert!(ts.store.exists(Area::Client, controller.client_export_path()));
    assert!(!ts.store.in_transaction());
}

#[test]
fn test_second_posting_keeps_supplied_uids_and_extends_counters() {
    let mut ts = temp_store();
    let controller = PostingController::new(&config(), plan_id());
    controller
        .post(&mut ts.store, &mut root_mid_leaf_table(), "first")
        .unwrap();

    let mut update = table(
        &["UID", "Root", "UID.1", "Mid", "Leaf"],
        &[&["R1", "r", "R1.M2", "m2 renamed", "new leaf"], &["", "", "", "m3", ""]],
    );
    let outcome = controller.post(&mut ts.store, &mut update, "second").unwrap();
    assert_eq!(outcome.handle.version, 2);
    assert_eq!(
        uid_strings(&outcome.uids),
        vec!["R1", "R1.M2", "R1.M2.L3", "R1.M3"]
    );
    assert_eq!(ts.store.versions(&plan_id()).unwrap(), vec![1, 2]);
}

#[test]
fn test_reference_links_protect_referenced_uids() {
    let mut ts = temp_store();
    let cfg = config();
    let plan = PostingController::new(&cfg, plan_id());
    plan.post(&mut ts.store, &mut root_mid_leaf_table(), "plan v1")
        .unwrap();

    let report = PostingController::new(&cfg, report_id());
    let outcome = report
        .post(
            &mut ts.store,
            &mut table(&["Status", "Covers"], &[&["green", "R1.M1.L2, R1.M2"]]),
            "status v1",
        )
        .unwrap();
    assert_eq!(outcome.links.len(), 1);
    assert_eq!(outcome.links[0].path, "S1.covers");

    // Plan v2 drops R1.M1.L2: rejected, nothing written
    let err = plan
        .post(
            &mut ts.store,
            &mut table(
                &["UID", "Root", "UID.1", "Mid", "UID.2", "Leaf"],
                &[&["R1", "r", "R1.M2", "m2", "", ""]],
            ),
            "plan v2",
        )
        .unwrap_err();
    assert!(err.is_integrity_violation());
    assert!(matches!(
        err.kind,
        KbErrorKind::Store(StoreError::ForeignKey(ForeignKeyError::Orphaned { .. }))
    ));
    assert_eq!(ts.store.versions(&plan_id()).unwrap(), vec![1]);
    assert!(!ts.store.in_transaction());

    // Keeping both referenced UIDs succeeds
    let ok = plan
        .post(
            &mut ts.store,
            &mut table(
                &["UID", "Root", "UID.1", "Mid", "UID.2", "Leaf"],
                &[
                    &["R1", "r", "R1.M1", "m1", "R1.M1.L2", "l2"],
                    &["", "", "R1.M2", "m2", "", ""],
                ],
            ),
            "plan v2",
        )
        .unwrap();
    assert_eq!(ok.handle.version, 2);
}

#[test]
fn test_reference_to_unknown_uid_aborts_posting() {
    let mut ts = temp_store();
    let cfg = config();
    PostingController::new(&cfg, plan_id())
        .post(&mut ts.store, &mut root_mid_leaf_table(), "plan v1")
        .unwrap();

    let err = PostingController::new(&cfg, report_id())
        .post(
            &mut ts.store,
            &mut table(&["Status", "Covers"], &[&["red", "R9"]]),
            "status v1",
        )
        .unwrap_err();
    assert!(matches!(
        err.kind,
        KbErrorKind::Store(StoreError::ForeignKey(ForeignKeyError::DanglingReference { .. }))
    ));
    assert!(ts.store.versions(&report_id()).unwrap().is_empty());
    assert!(ts.store.list(Area::Postings, "acme/q3-status").unwrap().is_empty());
}

#[test]
fn test_missing_split_column_is_reported() {
    let mut ts = temp_store();
    let controller = PostingController::new(&config(), plan_id());
    let err = controller
        .post(&mut ts.store, &mut table(&["Root", "Leaf"], &[&["r", "l"]]), "bad")
        .unwrap_err();
    assert!(err.is_user_error());
    assert!(err
        .to_string()
        .contains("the posting ranges likely don't cover all the data"));
}
