//! Change bitmaps checked against before/after snapshots

use crate::common::*;
use pageaudit::pageaudit_verify::{IndexEntry, MemoryCatalog};
use pageaudit::{
    check_all_tracked, check_clean, check_map_sanity, decode, Finding, RelationKind,
    TrackedRelation, VerifyError,
};

const REL: &str = "base/1/16385";

fn entry(data: &TestDataDir, before: &Snapshot, kind: RelationKind) -> IndexEntry {
    let after = data.snapshot();
    IndexEntry {
        path: data.path(REL),
        kind,
        old_pages: before.file(REL).unwrap().page_digests.clone(),
        new_pages: after.file(REL).unwrap().page_digests.clone(),
        bitmap: decode(&data.path(REL)).unwrap(),
    }
}

#[test]
fn test_updates_and_growth_tracked() {
    let data = TestDataDir::new();
    data.write_relation(REL, 5, 1);
    let before = data.snapshot();

    data.touch_page(REL, 1);
    data.touch_page(REL, 3);
    data.extend_relation(REL, 2, 2);
    data.write_bitmap(REL, 7, &[1, 3, 5, 6]);

    let report = entry(&data, &before, RelationKind::Heap).check().unwrap();
    assert!(report.success(), "{}", report);
}

#[test]
fn test_missed_update_fails() {
    let data = TestDataDir::new();
    data.write_relation(REL, 5, 3);
    let before = data.snapshot();

    data.touch_page(REL, 1);
    data.touch_page(REL, 3);
    data.write_bitmap(REL, 5, &[1]);

    let report = entry(&data, &before, RelationKind::Btree).check().unwrap();
    assert!(!report.success());
    assert_eq!(report.failed_pages(), vec![3]);
    assert!(report.into_result().is_err());
}

#[test]
fn test_over_tracking_is_safe() {
    let data = TestDataDir::new();
    data.write_relation(REL, 4, 4);
    let before = data.snapshot();
    data.write_bitmap(REL, 4, &[0, 1, 2, 3]);

    let report = entry(&data, &before, RelationKind::Heap).check().unwrap();
    assert!(report.success());
    assert_eq!(report.findings().len(), 4);
    assert!(report
        .findings()
        .iter()
        .all(|f| matches!(f, Finding::SpuriousTracking { .. })));
}

#[test]
fn test_spgist_metapage_exception() {
    let data = TestDataDir::new();
    data.write_relation(REL, 3, 5);
    let before = data.snapshot();
    data.touch_page(REL, 0);
    data.write_bitmap(REL, 3, &[]);

    let report = entry(&data, &before, RelationKind::Spgist).check().unwrap();
    assert!(report.success(), "{}", report);

    let report = entry(&data, &before, RelationKind::Gin).check().unwrap();
    assert_eq!(report.failed_pages(), vec![0]);
}

#[test]
fn test_recovery_and_reset_states() {
    let data = TestDataDir::new();
    data.write_relation(REL, 6, 6);

    data.write_bitmap(REL, 6, &[0, 1, 2, 3, 4, 5]);
    let bitmap = decode(&data.path(REL)).unwrap();
    assert!(check_all_tracked(&data.path(REL), &bitmap, 6).success());
    assert!(!check_clean(&data.path(REL), &bitmap, 6).success());

    data.write_bitmap(REL, 6, &[]);
    let bitmap = decode(&data.path(REL)).unwrap();
    assert!(check_clean(&data.path(REL), &bitmap, 6).success());
    assert_eq!(
        check_all_tracked(&data.path(REL), &bitmap, 6).failed_pages(),
        vec![0, 1, 2, 3, 4, 5]
    );
}

#[test]
fn test_map_sanity_over_several_relations() {
    let data = TestDataDir::new();
    data.write_relation("base/1/16385", 3, 7);
    data.write_relation("base/1/16390", 2, 8);

    let mut catalog = MemoryCatalog::new()
        .with_relation("t_heap", 3, "base/1/16385")
        .with_relation("t_idx", 2, "base/1/16390");
    let relations = vec![
        TrackedRelation::capture("t_heap", RelationKind::Heap, &data.root, &mut catalog).unwrap(),
        TrackedRelation::capture("t_idx", RelationKind::Btree, &data.root, &mut catalog).unwrap(),
    ];

    data.touch_page("base/1/16385", 2);
    data.touch_page("base/1/16390", 1);
    data.write_bitmap("base/1/16385", 3, &[2]);
    data.write_bitmap("base/1/16390", 2, &[]);

    let report = check_map_sanity(&data.root, &relations, &mut catalog).unwrap();
    assert!(!report.success());
    assert_eq!(report.reports().len(), 2, "every relation is checked");
    let failed: Vec<_> = report.failures().map(|r| r.relation().to_path_buf()).collect();
    assert_eq!(failed, vec![data.path("base/1/16390")]);
}

#[test]
fn test_misaligned_bitmap_aborts() {
    let data = TestDataDir::new();
    data.write_relation(REL, 2, 9);
    write_file(&data.path("base/1/16385_ptrack"), &[0u8; 100]);

    let mut catalog = MemoryCatalog::new().with_relation("t", 2, REL);
    let relation = TrackedRelation::capture("t", RelationKind::Heap, &data.root, &mut catalog).unwrap();
    let err = check_map_sanity(&data.root, &[relation], &mut catalog).unwrap_err();
    assert!(matches!(err, VerifyError::Storage(ref e) if e.is_corruption()));
}
