//! Core types for pageaudit
//!
//! This crate defines the foundational pieces shared by the snapshot and
//! verification layers:
//! - Layout: page size, bitmap geometry, segment and companion file naming
//! - Digest: page and streamed whole-file digests (Page Hasher)
//! - RelationKind: storage access methods with known tracking exceptions
//! - Error: error type for I/O and corruption conditions

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod digest;
pub mod error;
pub mod layout;
pub mod relation;

pub use digest::{Digest, DigestParseError, StreamDigest};
pub use error::{Error, Result};
pub use layout::{
    bitmap_path, is_bitmap_file_name, is_data_page_file_name, pages_for_len, segment_path,
    BITMAP_PAGE_BODY_SIZE, BITMAP_PAGE_HEADER_SIZE, BITMAP_SUFFIX, PAGES_PER_BITMAP_PAGE,
    PAGES_PER_SEGMENT, PAGE_SIZE,
};
pub use relation::{RelationKind, UnknownRelationKind};
