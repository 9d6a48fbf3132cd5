//! Shared test utilities for the integration suites.
//!
//! Import via `mod common;` from any test's main.rs.

#![allow(dead_code)]

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Once;

pub use pageaudit::{
    pageaudit_core::{bitmap_path, BITMAP_PAGE_HEADER_SIZE, PAGES_PER_BITMAP_PAGE},
    CaptureConfig, ExclusionSet, Finding, RelationKind, Snapshot, PAGE_SIZE,
};
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route library logs to the test harness output (shown on failure)
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// TestDataDir - synthetic data directory
// ============================================================================

/// A throwaway data directory with helpers to lay out relations
pub struct TestDataDir {
    pub dir: TempDir,
    pub root: PathBuf,
}

impl TestDataDir {
    /// Create an empty data directory with the usual top-level layout
    pub fn new() -> Self {
        init_tracing();
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("data");
        for sub in ["base/1", "global", "pg_wal", "pg_tblspc"] {
            fs::create_dir_all(root.join(sub)).unwrap();
        }
        write_file(&root.join("PG_VERSION"), b"16\n");
        write_file(&root.join("global/pg_control"), &random_pages(1, 0));
        write_file(&root.join("postmaster.pid"), b"4242\n");
        TestDataDir { dir, root }
    }

    /// Absolute path of a relative key
    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Write `pages` random pages as relation `rel`
    pub fn write_relation(&self, rel: &str, pages: usize, seed: u64) -> PathBuf {
        let path = self.path(rel);
        write_file(&path, &random_pages(pages, seed));
        path
    }

    /// Append random pages to an existing relation
    pub fn extend_relation(&self, rel: &str, pages: usize, seed: u64) {
        let mut file = OpenOptions::new().append(true).open(self.path(rel)).unwrap();
        file.write_all(&random_pages(pages, seed)).unwrap();
    }

    /// Invert one byte of a page
    pub fn touch_page(&self, rel: &str, page: u64) {
        flip_byte(&self.path(rel), page * PAGE_SIZE as u64 + 100);
    }

    /// Write the bitmap companion of `rel`
    pub fn write_bitmap(&self, rel: &str, pages: u64, set: &[u64]) {
        write_bitmap(&bitmap_path(&self.path(rel), 0), pages, set);
    }

    /// Capture with default settings
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.root, &CaptureConfig::default()).unwrap()
    }

    /// Copy the whole directory next to the original, as a restore would
    pub fn restore_copy(&self) -> PathBuf {
        let target = self.dir.path().join("restored");
        copy_tree(&self.root, &target);
        target
    }
}

impl Default for TestDataDir {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// File helpers
// ============================================================================

/// Random page contents, reproducible per seed
pub fn random_pages(count: usize, seed: u64) -> Vec<u8> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; count * PAGE_SIZE];
    rng.fill(&mut data[..]);
    data
}

pub fn write_file(path: &Path, data: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    File::create(path).unwrap().write_all(data).unwrap();
}

pub fn flip_byte(path: &Path, offset: u64) {
    let mut file = OpenOptions::new().read(true).write(true).open(path).unwrap();
    let mut byte = [0u8; 1];
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.read_exact(&mut byte).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(&[byte[0] ^ 0xFF]).unwrap();
}

/// Bitmap companion with every bit in `set` flagged
pub fn write_bitmap(path: &Path, pages: u64, set: &[u64]) {
    let map_pages = pages.div_ceil(PAGES_PER_BITMAP_PAGE as u64).max(1) as usize;
    let mut data = vec![0u8; map_pages * PAGE_SIZE];
    for &page in set {
        let map_page = (page / PAGES_PER_BITMAP_PAGE as u64) as usize;
        let bit = (page % PAGES_PER_BITMAP_PAGE as u64) as usize;
        data[map_page * PAGE_SIZE + BITMAP_PAGE_HEADER_SIZE + bit / 8] |= 1 << (bit % 8);
    }
    write_file(path, &data);
}

/// Recursive copy preserving permission bits
pub fn copy_tree(from: &Path, to: &Path) {
    fs::create_dir_all(to).unwrap();
    fs::set_permissions(to, fs::metadata(from).unwrap().permissions()).unwrap();
    for entry in fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let target = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_tree(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), &target).unwrap();
        }
    }
}
