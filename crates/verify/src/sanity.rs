//! Bitmap sanity checks
//!
//! Given page digests of a relation before and after some activity, and
//! the change bitmap decoded afterwards, verify that every page that
//! changed or appeared is flagged. Under-tracking fails the check.
//! Over-tracking is safe and only logged.
//!
//! Per page `p` in `[0, max(old_count, new_count))`:
//!
//! | old      | new      | requirement                                  |
//! |----------|----------|----------------------------------------------|
//! | absent   | present  | bit 1                                        |
//! | present  | absent   | none (logged)                                |
//! | `a`      | `b != a` | bit 1 unless a tracking exception applies    |
//! | `a`      | `a`      | bit 0 expected; a 1 is logged, never fails   |
//!
//! Every page is evaluated; the report names all violations at once.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use pageaudit_core::{Digest, Error, RelationKind};
use pageaudit_storage::{decode, relation_page_digests, Bitmap};
use tracing::{debug, info, warn};

use crate::catalog::CatalogConnection;
use crate::error::{VerifyError, VerifyResult};
use crate::exclusion::{KnownDivergence, KNOWN_DIVERGENCES};
use crate::finding::{render, Finding};

// A page the differ may ignore is also a page that may change unflagged.
fn tracking_exception(kind: RelationKind, page: u64) -> Option<&'static KnownDivergence> {
    KNOWN_DIVERGENCES
        .iter()
        .find(|e| e.access_method == kind && e.pages.contains(&page))
}

/// Outcome of checking one relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanityReport {
    relation: PathBuf,
    findings: Vec<Finding>,
}

impl SanityReport {
    /// Wrap findings made for a relation
    pub fn new(relation: impl Into<PathBuf>, findings: Vec<Finding>) -> Self {
        SanityReport {
            relation: relation.into(),
            findings,
        }
    }

    /// Data file the report is about
    pub fn relation(&self) -> &Path {
        &self.relation
    }

    /// True if no hard violation was found
    pub fn success(&self) -> bool {
        !self.findings.iter().any(Finding::is_hard)
    }

    /// All findings, hard and soft, in page order
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Pages with hard violations
    pub fn failed_pages(&self) -> Vec<u64> {
        self.findings
            .iter()
            .filter(|f| f.is_hard())
            .filter_map(Finding::page)
            .collect()
    }

    /// Diagnostic text; empty when nothing was found
    pub fn report(&self) -> String {
        render(
            &format!("Bitmap sanity check failed for {}", self.relation.display()),
            &self.findings,
        )
    }

    /// `Ok(())` on success, otherwise the rendered report
    pub fn into_result(self) -> VerifyResult<()> {
        if self.success() {
            Ok(())
        } else {
            Err(VerifyError::Mismatch(self.report()))
        }
    }
}

impl fmt::Display for SanityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.report())
    }
}

/// Outcome of checking a whole set of tracked relations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapSanityReport {
    reports: Vec<SanityReport>,
}

impl MapSanityReport {
    /// True if every relation passed
    pub fn success(&self) -> bool {
        self.reports.iter().all(SanityReport::success)
    }

    /// Per-relation reports, in the order checked
    pub fn reports(&self) -> &[SanityReport] {
        &self.reports
    }

    /// Reports of relations that failed
    pub fn failures(&self) -> impl Iterator<Item = &SanityReport> {
        self.reports.iter().filter(|r| !r.success())
    }

    /// Concatenated diagnostics of every relation with findings
    pub fn report(&self) -> String {
        self.reports
            .iter()
            .map(SanityReport::report)
            .filter(|r| !r.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// `Ok(())` on success, otherwise the combined report
    pub fn into_result(self) -> VerifyResult<()> {
        if self.success() {
            Ok(())
        } else {
            Err(VerifyError::Mismatch(self.report()))
        }
    }
}

/// Check one relation's bitmap against its before/after page digests
///
/// # Errors
///
/// `Corruption` if the bitmap covers fewer pages than the relation now has.
pub fn check(
    relation: &Path,
    old_pages: &BTreeMap<u64, Digest>,
    new_pages: &BTreeMap<u64, Digest>,
    bitmap: &Bitmap,
    kind: RelationKind,
) -> VerifyResult<SanityReport> {
    let end_of = |pages: &BTreeMap<u64, Digest>| pages.keys().next_back().map_or(0, |p| p + 1);
    let new_end = end_of(new_pages);
    let end = end_of(old_pages).max(new_end);

    if bitmap.len() < new_end {
        return Err(Error::Corruption(format!(
            "bitmap of {} covers {} pages, relation has {}",
            relation.display(),
            bitmap.len(),
            new_end
        ))
        .into());
    }

    let path = relation.to_path_buf();
    let mut findings = Vec::new();

    for page in 0..end {
        let bit = bitmap.get(page);
        let tracked = bit == Some(true);

        let finding = match (old_pages.get(&page), new_pages.get(&page)) {
            (None, Some(_)) if !tracked => Some(Finding::UntrackedNewPage {
                path: path.clone(),
                page,
                kind,
            }),
            (Some(_), None) => Some(Finding::ShrunkPage {
                path: path.clone(),
                page,
                kind,
                bit,
            }),
            (Some(old), Some(new)) if old != new && !tracked => {
                Some(match tracking_exception(kind, page) {
                    Some(exception) => Finding::ToleratedUntrackedPage {
                        path: path.clone(),
                        page,
                        kind,
                        reason: exception.reason,
                    },
                    None => Finding::UntrackedChangedPage {
                        path: path.clone(),
                        page,
                        kind,
                        old_digest: *old,
                        new_digest: *new,
                    },
                })
            }
            (Some(old), Some(new)) if old == new && tracked => Some(Finding::SpuriousTracking {
                path: path.clone(),
                page,
                kind,
            }),
            _ => None,
        };

        if let Some(finding) = finding {
            if finding.is_hard() {
                warn!(target: "pageaudit::sanity", %finding, "Bitmap violation");
            } else {
                debug!(target: "pageaudit::sanity", %finding, "Bitmap note");
            }
            findings.push(finding);
        }
    }

    let report = SanityReport::new(path, findings);
    debug!(
        target: "pageaudit::sanity",
        relation = %relation.display(),
        pages = end,
        success = report.success(),
        "Relation checked"
    );
    Ok(report)
}

/// Every page below `size_in_pages` must be flagged
///
/// Holds after crash recovery: each replayed page is tracked.
pub fn check_all_tracked(relation: &Path, bitmap: &Bitmap, size_in_pages: u64) -> SanityReport {
    let findings = (0..size_in_pages)
        .filter_map(|page| {
            let bit = bitmap.get(page);
            (bit != Some(true)).then(|| Finding::NotTracked {
                path: relation.to_path_buf(),
                page,
                bit,
            })
        })
        .collect::<Vec<_>>();
    for finding in &findings {
        warn!(target: "pageaudit::sanity", %finding, "Bitmap violation");
    }
    SanityReport::new(relation, findings)
}

/// No page below `size_in_pages` may be flagged
///
/// Holds right after a backup has reset tracking.
pub fn check_clean(relation: &Path, bitmap: &Bitmap, size_in_pages: u64) -> SanityReport {
    let findings = (0..size_in_pages)
        .filter(|&page| bitmap.is_set(page))
        .map(|page| Finding::NotClean {
            path: relation.to_path_buf(),
            page,
        })
        .collect::<Vec<_>>();
    for finding in &findings {
        warn!(target: "pageaudit::sanity", %finding, "Bitmap violation");
    }
    SanityReport::new(relation, findings)
}

/// One relation prepared for checking
#[derive(Debug, Clone)]
pub struct IndexEntry {
    /// Data file of the relation's main fork
    pub path: PathBuf,
    /// Access method
    pub kind: RelationKind,
    /// Page digests before
    pub old_pages: BTreeMap<u64, Digest>,
    /// Page digests after
    pub new_pages: BTreeMap<u64, Digest>,
    /// Decoded bitmap after
    pub bitmap: Bitmap,
}

impl IndexEntry {
    /// Run [`check`] on this entry
    pub fn check(&self) -> VerifyResult<SanityReport> {
        check(
            &self.path,
            &self.old_pages,
            &self.new_pages,
            &self.bitmap,
            self.kind,
        )
    }
}

/// "Before" state of a relation, as recorded by [`TrackedRelation::capture`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedRelation {
    /// Relation name as known to the catalogs
    pub name: String,
    /// Access method
    pub kind: RelationKind,
    /// Path relative to the data directory at capture time
    pub filepath: String,
    /// Size in pages at capture time
    pub size_pages: u64,
    /// Page digests at capture time
    pub pages: BTreeMap<u64, Digest>,
}

impl TrackedRelation {
    /// Record a relation's current size, path and page digests
    pub fn capture<C: CatalogConnection + ?Sized>(
        name: impl Into<String>,
        kind: RelationKind,
        data_dir: &Path,
        catalog: &mut C,
    ) -> VerifyResult<Self> {
        let name = name.into();
        let size_pages = catalog.relation_size_pages(&name)?;
        let filepath = catalog.relation_filepath(&name)?;
        let pages = relation_page_digests(&data_dir.join(&filepath), size_pages)?;
        debug!(
            target: "pageaudit::sanity",
            relation = %name,
            %filepath,
            size_pages,
            "Recorded relation state"
        );
        Ok(TrackedRelation {
            name,
            kind,
            filepath,
            size_pages,
            pages,
        })
    }
}

/// Check the bitmaps of every tracked relation against their current state
///
/// Refreshes size, path and page digests through `catalog` (the file may
/// have been rewritten), decodes each bitmap and checks every relation.
/// Relations are all checked even after one fails.
pub fn check_map_sanity<C: CatalogConnection + ?Sized>(
    data_dir: &Path,
    relations: &[TrackedRelation],
    catalog: &mut C,
) -> VerifyResult<MapSanityReport> {
    let mut reports = Vec::with_capacity(relations.len());

    for relation in relations {
        let size_pages = catalog.relation_size_pages(&relation.name)?;
        let filepath = catalog.relation_filepath(&relation.name)?;
        let data_file = data_dir.join(&filepath);

        let entry = IndexEntry {
            new_pages: relation_page_digests(&data_file, size_pages)?,
            bitmap: decode(&data_file)?,
            path: data_file,
            kind: relation.kind,
            old_pages: relation.pages.clone(),
        };
        reports.push(entry.check()?);
    }

    let report = MapSanityReport { reports };
    info!(
        target: "pageaudit::sanity",
        relations = relations.len(),
        failed = report.failures().count(),
        "Bitmap map sanity check finished"
    );
    Ok(report)
}
