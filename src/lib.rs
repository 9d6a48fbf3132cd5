//! pageaudit - page-level verification of database storage directories
//!
//! pageaudit proves that a backup/restore round trip is byte exact, and
//! that a per-relation change bitmap flagged every page that changed.
//!
//! # Quick Start
//!
//! ```ignore
//! use pageaudit::{compare_directories, CaptureConfig, ExclusionSet};
//!
//! let report = compare_directories(
//!     "/var/lib/pg/original",
//!     "/var/lib/pg/restored",
//!     &CaptureConfig::default(),
//!     &ExclusionSet::new(),
//! )?;
//! report.into_result()?;
//! ```
//!
//! # Architecture
//!
//! - [`pageaudit_core`]: page layout, digests, relation kinds, errors
//! - [`pageaudit_storage`]: snapshot capture, bitmap decoding, relation page digests
//! - [`pageaudit_verify`]: differ, exclusions, bitmap sanity, backup manifests
//!
//! The most used items of each layer are re-exported at the crate root.

pub use pageaudit_core;
pub use pageaudit_storage;
pub use pageaudit_verify;

pub use pageaudit_core::{Digest, Error, RelationKind, Result, PAGE_SIZE, PAGES_PER_SEGMENT};
pub use pageaudit_storage::{capture, decode, Bitmap, CaptureConfig, FileEntry, Snapshot};
pub use pageaudit_verify::{
    build_exclusions, check, check_all_tracked, check_clean, check_map_sanity,
    compare_directories, diff, BackupManifest, CatalogConnection, DiffReport, ExclusionSet,
    Finding, MapSanityReport, SanityReport, TrackedRelation, VerifyError, VerifyResult,
};
