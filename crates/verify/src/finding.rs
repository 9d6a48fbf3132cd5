//! Findings and reports
//!
//! Every check in this crate returns the findings it made instead of
//! writing into shared state. Reports are assembled from those lists, so
//! checks compose freely and a single run surfaces every divergence.
//!
//! A finding is either hard (fails the verification) or soft (logged and
//! rendered for context, never fails anything).

use std::fmt;
use std::path::PathBuf;

use pageaudit_core::{Digest, RelationKind};

/// One divergence or observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    /// Directory exists only in the restored tree
    DirAppeared {
        /// Restored directory path
        path: PathBuf,
    },
    /// Directory exists only in the original tree
    DirDisappeared {
        /// Original directory path
        path: PathBuf,
    },
    /// Directory mode differs
    DirModeMismatch {
        /// Original directory path
        original: PathBuf,
        /// Restored directory path
        restored: PathBuf,
        /// Original mode bits
        original_mode: u32,
        /// Restored mode bits
        restored_mode: u32,
    },
    /// File exists only in the restored tree
    FileAppeared {
        /// Restored file path
        path: PathBuf,
    },
    /// File exists only in the original tree
    FileDisappeared {
        /// Original file path
        path: PathBuf,
    },
    /// File mode differs
    FileModeMismatch {
        /// Original file path
        original: PathBuf,
        /// Restored file path
        restored: PathBuf,
        /// Original mode bits
        original_mode: u32,
        /// Restored mode bits
        restored_mode: u32,
    },
    /// Whole-file digest differs
    FileDigestMismatch {
        /// Original file path
        original: PathBuf,
        /// Restored file path
        restored: PathBuf,
        /// Original digest
        original_digest: Digest,
        /// Restored digest
        restored_digest: Digest,
    },
    /// Page present in the original file only
    ///
    /// Soft: a length change already fails the file through
    /// `FileDigestMismatch` unless the file is in the exclusion set.
    PageDisappeared {
        /// Restored file path
        path: PathBuf,
        /// Page index
        page: u64,
    },
    /// Page present in the restored file only (soft, like `PageDisappeared`)
    ExtraPage {
        /// Restored file path
        path: PathBuf,
        /// Page index
        page: u64,
    },
    /// Page digest differs
    PageDigestMismatch {
        /// Restored file path
        path: PathBuf,
        /// Page index
        page: u64,
        /// Original digest
        original_digest: Digest,
        /// Restored digest
        restored_digest: Digest,
    },
    /// Relation grew but the new page is not flagged
    UntrackedNewPage {
        /// Data file
        path: PathBuf,
        /// Page index
        page: u64,
        /// Relation kind
        kind: RelationKind,
    },
    /// Page content changed but the page is not flagged
    UntrackedChangedPage {
        /// Data file
        path: PathBuf,
        /// Page index
        page: u64,
        /// Relation kind
        kind: RelationKind,
        /// Digest before
        old_digest: Digest,
        /// Digest after
        new_digest: Digest,
    },
    /// Changed page not flagged, covered by a documented exception
    ToleratedUntrackedPage {
        /// Data file
        path: PathBuf,
        /// Page index
        page: u64,
        /// Relation kind
        kind: RelationKind,
        /// Why the exception exists
        reason: &'static str,
    },
    /// Relation shrank; the page is gone
    ShrunkPage {
        /// Data file
        path: PathBuf,
        /// Page index
        page: u64,
        /// Relation kind
        kind: RelationKind,
        /// Flag of the vanished page, if the bitmap still covers it
        bit: Option<bool>,
    },
    /// Unchanged page flagged as changed
    SpuriousTracking {
        /// Data file
        path: PathBuf,
        /// Page index
        page: u64,
        /// Relation kind
        kind: RelationKind,
    },
    /// Page expected to be flagged (e.g. after recovery) is not
    NotTracked {
        /// Data file
        path: PathBuf,
        /// Page index
        page: u64,
        /// Flag found, `None` if the bitmap does not cover the page
        bit: Option<bool>,
    },
    /// Page expected to be clear (e.g. after a tracking reset) is flagged
    NotClean {
        /// Data file
        path: PathBuf,
        /// Page index
        page: u64,
    },
    /// File in the directory that the backup manifest does not list
    UnlistedFile {
        /// File path
        path: PathBuf,
    },
    /// Manifest entry with no counterpart in the directory
    ListedButMissing {
        /// Relative path as listed
        path: String,
    },
}

impl Finding {
    /// Check whether this finding fails a verification
    pub fn is_hard(&self) -> bool {
        !matches!(
            self,
            Finding::PageDisappeared { .. }
                | Finding::ExtraPage { .. }
                | Finding::ToleratedUntrackedPage { .. }
                | Finding::ShrunkPage { .. }
                | Finding::SpuriousTracking { .. }
        )
    }

    /// Page index this finding concerns, if any
    pub fn page(&self) -> Option<u64> {
        match self {
            Finding::PageDisappeared { page, .. }
            | Finding::ExtraPage { page, .. }
            | Finding::PageDigestMismatch { page, .. }
            | Finding::UntrackedNewPage { page, .. }
            | Finding::UntrackedChangedPage { page, .. }
            | Finding::ToleratedUntrackedPage { page, .. }
            | Finding::ShrunkPage { page, .. }
            | Finding::SpuriousTracking { page, .. }
            | Finding::NotTracked { page, .. }
            | Finding::NotClean { page, .. } => Some(*page),
            _ => None,
        }
    }
}

fn bit_str(bit: Option<bool>) -> &'static str {
    match bit {
        Some(true) => "1",
        Some(false) => "0",
        None => "absent",
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::DirAppeared { path } => {
                write!(f, "Directory was not present in original: {}", path.display())
            }
            Finding::DirDisappeared { path } => {
                write!(f, "Directory disappeared in restored: {}", path.display())
            }
            Finding::DirModeMismatch {
                original,
                restored,
                original_mode,
                restored_mode,
            } => write!(
                f,
                "Dir permissions mismatch:\n Dir old: {} Permissions: {:o}\n Dir new: {} Permissions: {:o}",
                original.display(),
                original_mode,
                restored.display(),
                restored_mode
            ),
            Finding::FileAppeared { path } => {
                write!(f, "File is not present in original: {}", path.display())
            }
            Finding::FileDisappeared { path } => {
                write!(f, "File disappeared in restored: {}", path.display())
            }
            Finding::FileModeMismatch {
                original,
                restored,
                original_mode,
                restored_mode,
            } => write!(
                f,
                "File permissions mismatch:\n File old: {} Permissions: {:o}\n File new: {} Permissions: {:o}",
                original.display(),
                original_mode,
                restored.display(),
                restored_mode
            ),
            Finding::FileDigestMismatch {
                original,
                restored,
                original_digest,
                restored_digest,
            } => write!(
                f,
                "File checksum mismatch:\n File old: {}\n Checksum old: {}\n File new: {}\n Checksum new: {}",
                original.display(),
                original_digest,
                restored.display(),
                restored_digest
            ),
            Finding::PageDisappeared { path, page } => {
                write!(f, "Page {} disappeared:\n File: {}", page, path.display())
            }
            Finding::ExtraPage { path, page } => {
                write!(f, "Extra page {}:\n File: {}", page, path.display())
            }
            Finding::PageDigestMismatch {
                path,
                page,
                original_digest,
                restored_digest,
            } => write!(
                f,
                "Page checksum mismatch: {}\n Page checksum old: {}\n Page checksum new: {}\n File: {}",
                page,
                original_digest,
                restored_digest,
                path.display()
            ),
            Finding::UntrackedNewPage { path, page, kind } => write!(
                f,
                "File: {}\n Page {} of type {} was added, but bitmap value is 0",
                path.display(),
                page,
                kind
            ),
            Finding::UntrackedChangedPage {
                path,
                page,
                kind,
                old_digest,
                new_digest,
            } => write!(
                f,
                "File: {}\n Page {} of type {} was changed, but bitmap value is 0\n Old checksum: {}\n New checksum: {}",
                path.display(),
                page,
                kind,
                old_digest,
                new_digest
            ),
            Finding::ToleratedUntrackedPage {
                path,
                page,
                kind,
                reason,
            } => write!(
                f,
                "File: {}\n Page {} of type {} was changed, but bitmap value is 0 (tolerated: {})",
                path.display(),
                page,
                kind,
                reason
            ),
            Finding::ShrunkPage {
                path,
                page,
                kind,
                bit,
            } => write!(
                f,
                "File: {}\n Page {} of type {} was deleted, bitmap value is {}",
                path.display(),
                page,
                kind,
                bit_str(*bit)
            ),
            Finding::SpuriousTracking { path, page, kind } => write!(
                f,
                "File: {}\n Page {} of type {} was not changed, but bitmap value is 1",
                path.display(),
                page,
                kind
            ),
            Finding::NotTracked { path, page, bit } => write!(
                f,
                "File: {}\n Page {} should be tracked, but bitmap value is {}",
                path.display(),
                page,
                bit_str(*bit)
            ),
            Finding::NotClean { path, page } => write!(
                f,
                "File: {}\n Page {} should be clean, but bitmap value is 1",
                path.display(),
                page
            ),
            Finding::UnlistedFile { path } => {
                write!(f, "File is not listed in backup manifest: {}", path.display())
            }
            Finding::ListedButMissing { path } => {
                write!(f, "Manifest entry has no counterpart in directory: {}", path)
            }
        }
    }
}

/// Render findings under a header, one block per finding
pub fn render(header: &str, findings: &[Finding]) -> String {
    if findings.is_empty() {
        return String::new();
    }
    let mut out = String::from(header);
    out.push('\n');
    for finding in findings {
        out.push('\n');
        out.push_str(&finding.to_string());
        out.push('\n');
    }
    out
}

/// Outcome of comparing two snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffReport {
    findings: Vec<Finding>,
}

impl DiffReport {
    /// Header line of a failed comparison
    pub const HEADER: &'static str = "Restored directory is not equal to original!";

    /// Wrap accumulated findings
    pub fn new(findings: Vec<Finding>) -> Self {
        DiffReport { findings }
    }

    /// True if no hard finding was made
    pub fn ok(&self) -> bool {
        !self.findings.iter().any(Finding::is_hard)
    }

    /// All findings in report order
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Hard findings only
    pub fn hard_findings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_hard())
    }

    /// Full diagnostic text; empty when nothing was found
    pub fn report(&self) -> String {
        render(Self::HEADER, &self.findings)
    }

    /// `Ok(())` when the comparison passed, otherwise the rendered report
    pub fn into_result(self) -> crate::VerifyResult<()> {
        if self.ok() {
            Ok(())
        } else {
            Err(crate::VerifyError::Mismatch(self.report()))
        }
    }
}

impl fmt::Display for DiffReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.report())
    }
}
