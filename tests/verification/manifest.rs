//! Backup manifests cross-checked against captured directories

use crate::common::*;
use pageaudit::BackupManifest;

fn manifest_for(snapshot: &Snapshot) -> String {
    snapshot
        .files()
        .iter()
        .map(|(path, entry)| {
            serde_json::json!({
                "path": path,
                "size": entry.len.to_string(),
                "is_datafile": if entry.is_data_page_file { "1" } else { "0" },
            })
            .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn test_complete_manifest_has_no_findings() {
    let data = TestDataDir::new();
    data.write_relation("base/1/16385", 2, 1);
    let snapshot = data.snapshot();

    let manifest = BackupManifest::parse(&manifest_for(&snapshot)).unwrap();
    assert_eq!(manifest.len(), snapshot.files().len());
    assert!(manifest
        .cross_check(&snapshot, &CaptureConfig::default())
        .is_empty());
}

#[test]
fn test_incremental_manifest_misses_new_relation() {
    let data = TestDataDir::new();
    data.write_relation("base/1/16385", 2, 2);
    let full = BackupManifest::parse(&manifest_for(&data.snapshot())).unwrap();

    data.write_relation("base/1/16390", 1, 3);
    let page = BackupManifest::parse(&manifest_for(&data.snapshot())).unwrap();

    assert_eq!(page.missing_from(&full), vec!["base/1/16390"]);
    assert!(full.missing_from(&page).is_empty());

    let findings = full.cross_check(&data.snapshot(), &CaptureConfig::default());
    assert_eq!(
        findings,
        vec![Finding::UnlistedFile {
            path: data.path("base/1/16390")
        }]
    );
}

#[test]
fn test_manifest_file_round_trip() {
    let data = TestDataDir::new();
    let snapshot = data.snapshot();
    let path = data.dir.path().join("backup_content.control");
    write_file(&path, manifest_for(&snapshot).as_bytes());

    let manifest = BackupManifest::load(&path).unwrap();
    let entry = manifest.get("PG_VERSION").unwrap();
    assert_eq!(entry.metadata["size"], "3");
}
