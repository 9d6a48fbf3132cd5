//! Storage directory layout
//!
//! Constants and path conventions of a page-structured data directory:
//!
//! ```text
//! base/16384/
//! ├── 16385            # data-page file, segment 0
//! ├── 16385.1          # segment 1 (pages 131072..)
//! ├── 16385_ptrack     # change bitmap for segment 0
//! ├── 16385_ptrack.1   # change bitmap for segment 1
//! └── 16385_fsm        # other forks are plain files
//! ```
//!
//! ## Contract
//!
//! These values describe an external on-disk format and are FROZEN.

use std::path::{Path, PathBuf};

/// Logical page size of a data-page file in bytes
pub const PAGE_SIZE: usize = 8192;

/// Size of the header at the start of every change-bitmap page
pub const BITMAP_PAGE_HEADER_SIZE: usize = 24;

/// Usable bitmap bytes per change-bitmap page
pub const BITMAP_PAGE_BODY_SIZE: usize = PAGE_SIZE - BITMAP_PAGE_HEADER_SIZE;

/// Number of data pages tracked by one change-bitmap page
pub const PAGES_PER_BITMAP_PAGE: usize = BITMAP_PAGE_BODY_SIZE * 8;

/// Pages per relation segment (1 GiB at 8 KiB pages)
pub const PAGES_PER_SEGMENT: u64 = 131_072;

/// Suffix of the change-bitmap companion file
pub const BITMAP_SUFFIX: &str = "_ptrack";

/// Check whether a base name follows the data-page file convention
///
/// Only names made of ASCII digits qualify. Segment continuations
/// (`16385.1`) and other forks (`16385_fsm`) do not.
pub fn is_data_page_file_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit())
}

/// Check whether a base name is a change-bitmap companion
pub fn is_bitmap_file_name(name: &str) -> bool {
    match name.rsplit_once(BITMAP_SUFFIX) {
        Some((stem, rest)) => {
            !stem.is_empty()
                && (rest.is_empty()
                    || rest
                        .strip_prefix('.')
                        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit())))
        }
        None => false,
    }
}

/// Number of pages needed to hold `len` bytes (a trailing partial page counts)
pub fn pages_for_len(len: u64) -> u64 {
    len.div_ceil(PAGE_SIZE as u64)
}

/// Path of data segment `segment` of a relation
///
/// Segment 0 is the base file itself.
pub fn segment_path(data_file: &Path, segment: u64) -> PathBuf {
    if segment == 0 {
        data_file.to_path_buf()
    } else {
        append_to_file_name(data_file, &format!(".{}", segment))
    }
}

/// Path of the change-bitmap companion for data segment `segment`
pub fn bitmap_path(data_file: &Path, segment: u64) -> PathBuf {
    if segment == 0 {
        append_to_file_name(data_file, BITMAP_SUFFIX)
    } else {
        append_to_file_name(data_file, &format!("{}.{}", BITMAP_SUFFIX, segment))
    }
}

fn append_to_file_name(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
