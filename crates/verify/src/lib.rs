//! Verification layer for pageaudit
//!
//! Everything here turns captured state into findings:
//! - Differ: structural comparison of an original and a restored snapshot
//! - Exclusion: the allow-list of pages known to diverge, built from the
//!   live catalogs through the [`CatalogConnection`] seam
//! - Sanity: change bitmaps checked against before/after page digests,
//!   per relation or over every tracked relation
//! - Manifest: a backup tool's JSON-lines file list, cross-checked
//!   against a snapshot
//!
//! Ordinary divergences are [`Finding`]s collected into reports. Errors
//! are reserved for conditions that make a comparison meaningless.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod differ;
pub mod error;
pub mod exclusion;
pub mod finding;
pub mod manifest;
pub mod sanity;

pub use catalog::{CatalogConnection, CatalogError, MemoryCatalog, Row};
pub use differ::{compare_directories, diff, diff_dirs, diff_files, diff_pages};
pub use error::{VerifyError, VerifyResult};
pub use exclusion::{build as build_exclusions, ExclusionSet, KnownDivergence, KNOWN_DIVERGENCES};
pub use finding::{DiffReport, Finding};
pub use manifest::{BackupManifest, ManifestEntry, ManifestError};
pub use sanity::{
    check, check_all_tracked, check_clean, check_map_sanity, IndexEntry, MapSanityReport,
    SanityReport, TrackedRelation,
};
