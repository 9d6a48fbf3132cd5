//! Storage-side capture for pageaudit
//!
//! This crate reads a data directory and its change-tracking side channel:
//! - Snapshot: walks a directory tree into an immutable, keyed model with
//!   permission bits, whole-file digests and per-page digests
//! - CaptureConfig: ignore lists, read chunk size, optional parallel digesting
//! - Bitmap: decodes `*_ptrack` companions into per-page change flags,
//!   across multi-segment relations
//! - Relation: logical page digests and page counts across segments

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bitmap;
pub mod config;
pub mod relation;
pub mod snapshot;

pub use bitmap::{decode, decode_bitmap_file, Bitmap};
pub use config::{
    CaptureConfig, ConfigError, DEFAULT_IGNORED_DIRS, DEFAULT_IGNORED_FILES,
    DEFAULT_READ_CHUNK_SIZE,
};
pub use relation::{relation_page_count, relation_page_digests};
pub use snapshot::{capture, digest_file, DirEntry, FileEntry, Snapshot};
