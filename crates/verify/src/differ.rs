//! Snapshot differ
//!
//! Compares a snapshot of an original directory with a snapshot of its
//! restored copy. Every stage returns its own findings; [`diff`] chains
//! them into one [`DiffReport`], so a single run lists every divergence.
//!
//! The [`ExclusionSet`] is the only sanctioned suppression. A file listed
//! in it has its whole-file mismatch waived and is judged by the digests
//! of the pages both sides share; excluded pages are skipped silently.
//! Pages present on one side only are reported but never fail a diff on
//! their own.

use std::path::Path;

use pageaudit_core::Digest;
use pageaudit_storage::{CaptureConfig, FileEntry, Snapshot};
use tracing::{debug, info};

use crate::error::VerifyResult;
use crate::exclusion::ExclusionSet;
use crate::finding::{DiffReport, Finding};

/// Compare two snapshots
pub fn diff(original: &Snapshot, restored: &Snapshot, exclusions: &ExclusionSet) -> DiffReport {
    let mut findings = diff_dirs(original, restored);
    findings.extend(diff_files(original, restored, exclusions));

    let report = DiffReport::new(findings);
    for finding in report.hard_findings() {
        debug!(target: "pageaudit::diff", %finding, "Hard finding");
    }
    info!(
        target: "pageaudit::diff",
        original = %original.root().display(),
        restored = %restored.root().display(),
        ok = report.ok(),
        findings = report.findings().len(),
        "Snapshot comparison finished"
    );
    report
}

/// Capture both directories and compare them
pub fn compare_directories(
    original_root: impl AsRef<Path>,
    restored_root: impl AsRef<Path>,
    config: &CaptureConfig,
    exclusions: &ExclusionSet,
) -> VerifyResult<DiffReport> {
    let original = Snapshot::capture(original_root, config)?;
    let restored = Snapshot::capture(restored_root, config)?;
    Ok(diff(&original, &restored, exclusions))
}

/// Directory appearance, disappearance and mode findings
pub fn diff_dirs(original: &Snapshot, restored: &Snapshot) -> Vec<Finding> {
    let mut findings = Vec::new();

    for (key, restored_dir) in restored.dirs() {
        match original.dir(key) {
            None => findings.push(Finding::DirAppeared {
                path: restored.absolute(key),
            }),
            Some(original_dir) if original_dir.permission_bits != restored_dir.permission_bits => {
                findings.push(Finding::DirModeMismatch {
                    original: original.absolute(key),
                    restored: restored.absolute(key),
                    original_mode: original_dir.permission_bits,
                    restored_mode: restored_dir.permission_bits,
                })
            }
            Some(_) => {}
        }
    }

    for key in original.dirs().keys() {
        if restored.dir(key).is_none() {
            findings.push(Finding::DirDisappeared {
                path: original.absolute(key),
            });
        }
    }

    findings
}

/// File appearance, disappearance, mode and content findings
pub fn diff_files(
    original: &Snapshot,
    restored: &Snapshot,
    exclusions: &ExclusionSet,
) -> Vec<Finding> {
    let mut findings = Vec::new();

    for key in restored.files().keys() {
        if original.file(key).is_none() {
            findings.push(Finding::FileAppeared {
                path: restored.absolute(key),
            });
        }
    }

    for (key, original_file) in original.files() {
        let Some(restored_file) = restored.file(key) else {
            findings.push(Finding::FileDisappeared {
                path: original.absolute(key),
            });
            continue;
        };

        if original_file.permission_bits != restored_file.permission_bits {
            findings.push(Finding::FileModeMismatch {
                original: original.absolute(key),
                restored: restored.absolute(key),
                original_mode: original_file.permission_bits,
                restored_mode: restored_file.permission_bits,
            });
        }

        if original_file.whole_file_digest == restored_file.whole_file_digest {
            continue;
        }

        if !exclusions.contains_file(key) {
            findings.push(Finding::FileDigestMismatch {
                original: original.absolute(key),
                restored: restored.absolute(key),
                original_digest: original_file.whole_file_digest,
                restored_digest: restored_file.whole_file_digest,
            });
        }

        if original_file.is_data_page_file {
            findings.extend(diff_pages(
                key,
                &restored.absolute(key),
                original_file,
                restored_file,
                exclusions,
            ));
        }
    }

    findings
}

/// Page-level findings for one data-page file present on both sides
pub fn diff_pages(
    key: &str,
    restored_path: &Path,
    original: &FileEntry,
    restored: &FileEntry,
    exclusions: &ExclusionSet,
) -> Vec<Finding> {
    let mut findings = Vec::new();

    for (&page, &original_digest) in &original.page_digests {
        if exclusions.is_excluded(key, page) {
            continue;
        }
        match restored.page(page) {
            None => findings.push(Finding::PageDisappeared {
                path: restored_path.to_path_buf(),
                page,
            }),
            Some(restored_digest) if restored_digest != original_digest => {
                findings.push(page_mismatch(restored_path, page, original_digest, restored_digest))
            }
            Some(_) => {}
        }
    }

    for &page in restored.page_digests.keys() {
        if original.page(page).is_none() && !exclusions.is_excluded(key, page) {
            findings.push(Finding::ExtraPage {
                path: restored_path.to_path_buf(),
                page,
            });
        }
    }

    findings
}

fn page_mismatch(path: &Path, page: u64, original: Digest, restored: Digest) -> Finding {
    Finding::PageDigestMismatch {
        path: path.to_path_buf(),
        page,
        original_digest: original,
        restored_digest: restored,
    }
}
