//! Backup/restore round trips compared with the differ

use crate::common::*;
use pageaudit::{compare_directories, diff, CaptureConfig, ExclusionSet, Finding, Snapshot};

#[test]
fn test_exact_restore_passes() {
    let data = TestDataDir::new();
    data.write_relation("base/1/16385", 12, 1);
    data.write_relation("base/1/16390", 3, 2);
    let restored = data.restore_copy();

    let report = compare_directories(
        &data.root,
        &restored,
        &CaptureConfig::default(),
        &ExclusionSet::new(),
    )
    .unwrap();
    assert!(report.ok(), "{}", report);
    report.into_result().unwrap();
}

#[test]
fn test_transient_files_are_ignored() {
    let data = TestDataDir::new();
    data.write_relation("base/1/16385", 2, 3);
    data.write_bitmap("base/1/16385", 2, &[0]);
    let restored = data.restore_copy();

    write_file(&restored.join("postmaster.pid"), b"999\n");
    write_file(&restored.join("pg_wal/000000010000000000000002"), b"segment");
    write_bitmap(&restored.join("base/1/16385_ptrack"), 2, &[1]);

    let report = compare_directories(
        &data.root,
        &restored,
        &CaptureConfig::default(),
        &ExclusionSet::new(),
    )
    .unwrap();
    assert!(report.ok(), "{}", report);
}

#[test]
fn test_against_persisted_before_snapshot() {
    let data = TestDataDir::new();
    data.write_relation("base/1/16385", 6, 4);
    let saved = data.dir.path().join("before.json");
    data.snapshot().save(&saved).unwrap();

    data.touch_page("base/1/16385", 5);

    let before = Snapshot::load(&saved).unwrap();
    let report = diff(&before, &data.snapshot(), &ExclusionSet::new());
    let pages: Vec<u64> = report.findings().iter().filter_map(Finding::page).collect();
    assert_eq!(pages, vec![5]);
}

#[test]
fn test_truncated_restore_reports_lost_pages() {
    let data = TestDataDir::new();
    data.write_relation("base/1/16385", 4, 5);
    let restored = data.restore_copy();
    std::fs::OpenOptions::new()
        .write(true)
        .open(restored.join("base/1/16385"))
        .unwrap()
        .set_len(2 * PAGE_SIZE as u64)
        .unwrap();

    let report = compare_directories(
        &data.root,
        &restored,
        &CaptureConfig::default(),
        &ExclusionSet::new(),
    )
    .unwrap();

    let lost: Vec<u64> = report
        .findings()
        .iter()
        .filter(|f| matches!(f, Finding::PageDisappeared { .. }))
        .filter_map(Finding::page)
        .collect();
    assert_eq!(lost, vec![2, 3]);
    assert!(report
        .findings()
        .iter()
        .any(|f| matches!(f, Finding::FileDigestMismatch { .. })));

    let err = report.into_result().unwrap_err();
    assert!(err
        .to_string()
        .starts_with("Restored directory is not equal to original!"));
}

#[test]
fn test_report_lists_every_divergence() {
    let data = TestDataDir::new();
    data.write_relation("base/1/16385", 8, 6);
    data.write_relation("base/1/16390", 8, 7);
    let restored = data.restore_copy();
    flip_byte(&restored.join("base/1/16385"), 100);
    flip_byte(&restored.join("base/1/16390"), 7 * PAGE_SIZE as u64);
    std::fs::remove_file(restored.join("PG_VERSION")).unwrap();

    let report = compare_directories(
        &data.root,
        &restored,
        &CaptureConfig::default(),
        &ExclusionSet::new(),
    )
    .unwrap();

    let text = report.report();
    assert!(text.contains("PG_VERSION"));
    assert!(text.contains("16385"));
    assert!(text.contains("16390"));
    assert_eq!(report.hard_findings().count(), 5);
}
