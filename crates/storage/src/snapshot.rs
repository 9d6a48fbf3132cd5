//! Directory snapshots
//!
//! A [`Snapshot`] is an immutable record of a data directory at one
//! instant: permission bits for every retained file and directory, a
//! streamed digest of every file, and per-page digests for data-page files.
//!
//! # Invariants
//!
//! - Keys are relative to the snapshot root, `/`-separated, with no
//!   leading or trailing separator.
//! - Collections are keyed maps. Two captures of the same quiescent
//!   directory compare equal regardless of enumeration order.
//! - A directory is recorded only at its deepest retained path: a
//!   directory that is the parent of another recorded directory is
//!   dropped in favour of the child.
//! - Any file that vanishes or becomes unreadable mid-walk fails the
//!   whole capture. A vanished file is itself a finding and is never
//!   silently skipped.
//!
//! The caller is responsible for making sure nothing writes to the
//! directory while it is being captured.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use pageaudit_core::{is_data_page_file_name, Digest, Error, Result, StreamDigest, PAGE_SIZE};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::{CaptureConfig, ConfigError};

/// Captured state of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Mode bits at capture time (`st_mode` on unix)
    pub permission_bits: u32,
    /// Digest over the entire file content
    pub whole_file_digest: Digest,
    /// File size in bytes
    pub len: u64,
    /// True if the base name is purely numeric
    pub is_data_page_file: bool,
    /// Digest per zero-based page index; empty unless `is_data_page_file`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub page_digests: BTreeMap<u64, Digest>,
}

impl FileEntry {
    /// Number of pages digested
    pub fn page_count(&self) -> u64 {
        self.page_digests.len() as u64
    }

    /// Digest of one page, if the page exists
    pub fn page(&self, page: u64) -> Option<Digest> {
        self.page_digests.get(&page).copied()
    }
}

/// Captured state of one directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Mode bits at capture time
    pub permission_bits: u32,
}

/// Immutable model of a directory tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    root: PathBuf,
    files: BTreeMap<String, FileEntry>,
    dirs: BTreeMap<String, DirEntry>,
}

/// Root is identity only, never compared
impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.files == other.files && self.dirs == other.dirs
    }
}

impl Eq for Snapshot {}

impl Snapshot {
    /// Assemble a snapshot from already-built entries
    ///
    /// Directory entries are deduplicated to their deepest paths.
    pub fn from_parts(
        root: impl Into<PathBuf>,
        files: BTreeMap<String, FileEntry>,
        dirs: BTreeMap<String, DirEntry>,
    ) -> Self {
        Snapshot {
            root: root.into(),
            files,
            dirs: collapse_parent_dirs(dirs),
        }
    }

    /// Capture a directory tree
    ///
    /// Walks `root` following symbolic links, pruning ignored directories
    /// before descent and skipping ignored files.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig`: the configuration failed validation
    /// - `Io`: the walk failed, or a file vanished or could not be read
    pub fn capture(root: impl AsRef<Path>, config: &CaptureConfig) -> Result<Snapshot> {
        config.validate()?;
        let root = root.as_ref();
        let start = Instant::now();
        info!(target: "pageaudit::capture", root = %root.display(), "Snapshot capture started");

        let (file_paths, dir_paths) = walk(root, config)?;

        let files = digest_all(&file_paths, config)?;

        let mut dirs = BTreeMap::new();
        for (key, path) in dir_paths {
            let metadata = fs::metadata(&path).map_err(|e| Error::io(&path, e))?;
            dirs.insert(
                key,
                DirEntry {
                    permission_bits: permission_bits(&metadata),
                },
            );
        }

        let snapshot = Snapshot::from_parts(root, files.into_iter().collect(), dirs);
        info!(
            target: "pageaudit::capture",
            root = %root.display(),
            files = snapshot.files.len(),
            dirs = snapshot.dirs.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Snapshot capture completed"
        );
        Ok(snapshot)
    }

    /// Root directory this snapshot was taken of
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All recorded files keyed by relative path
    pub fn files(&self) -> &BTreeMap<String, FileEntry> {
        &self.files
    }

    /// All recorded directories keyed by relative path
    pub fn dirs(&self) -> &BTreeMap<String, DirEntry> {
        &self.dirs
    }

    /// Look up a file by relative path
    pub fn file(&self, key: &str) -> Option<&FileEntry> {
        self.files.get(key)
    }

    /// Look up a directory by relative path
    pub fn dir(&self, key: &str) -> Option<&DirEntry> {
        self.dirs.get(key)
    }

    /// Absolute path of a relative key under this snapshot's root
    pub fn absolute(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Sorted listing of every recorded directory and file
    pub fn relative_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self
            .dirs
            .keys()
            .chain(self.files.keys())
            .map(String::as_str)
            .collect();
        paths.sort_unstable();
        paths
    }

    /// Persist this snapshot as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| Error::Snapshot(format!("{}: {}", path.display(), e)))?;
        writer.flush().map_err(|e| Error::io(path, e))
    }

    /// Load a snapshot persisted with [`Snapshot::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Snapshot> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::Snapshot(format!("{}: {}", path.display(), e)))?;
        Ok(Snapshot {
            dirs: collapse_parent_dirs(snapshot.dirs),
            ..snapshot
        })
    }
}

/// Capture with explicit ignore lists
///
/// The given names extend the default ignore sets. Change-bitmap companions
/// are skipped when `ignore_bitmap_files` is set.
pub fn capture<D, F>(
    root: impl AsRef<Path>,
    ignored_dir_names: D,
    ignored_file_names: F,
    ignore_bitmap_files: bool,
) -> Result<Snapshot>
where
    D: IntoIterator,
    D::Item: Into<String>,
    F: IntoIterator,
    F::Item: Into<String>,
{
    let config = CaptureConfig::default()
        .with_ignored_dirs(ignored_dir_names)
        .with_ignored_files(ignored_file_names)
        .with_bitmap_files_ignored(ignore_bitmap_files);
    Snapshot::capture(root, &config)
}

/// Digest one file
///
/// Streams the file in `chunk_size` reads. When `data_pages` is set, also
/// digests every page-sized slice; the final partial page, if any, is
/// digested over the bytes present.
///
/// # Errors
///
/// - `InvalidConfig`: `chunk_size` is zero or not a multiple of the page size
/// - `Io`: the file vanished or could not be read
pub fn digest_file(path: &Path, data_pages: bool, chunk_size: usize) -> Result<FileEntry> {
    if chunk_size == 0 || chunk_size % PAGE_SIZE != 0 {
        return Err(ConfigError::InvalidChunkSize(chunk_size).into());
    }
    let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
    let metadata = file.metadata().map_err(|e| Error::io(path, e))?;

    let mut buf = vec![0u8; chunk_size];
    let mut whole = StreamDigest::new();
    let mut page_digests = BTreeMap::new();
    let mut next_page = 0u64;

    loop {
        let n = read_full(&mut file, &mut buf).map_err(|e| Error::io(path, e))?;
        if n == 0 {
            break;
        }
        let chunk = &buf[..n];
        whole.update(chunk);
        if data_pages {
            for page in chunk.chunks(PAGE_SIZE) {
                page_digests.insert(next_page, Digest::of_page(page));
                next_page += 1;
            }
        }
        if n < buf.len() {
            break;
        }
    }

    Ok(FileEntry {
        permission_bits: permission_bits(&metadata),
        whole_file_digest: whole.finish(),
        len: whole.len(),
        is_data_page_file: data_pages,
        page_digests,
    })
}

/// Digest every listed file; the first failure fails the whole batch
fn digest_all(file_paths: &PathList, config: &CaptureConfig) -> Result<Vec<(String, FileEntry)>> {
    let digest = |(key, path): &(String, PathBuf)| {
        digest_file(path, is_data_page_name_of(key), config.read_chunk_size)
            .map(|entry| (key.clone(), entry))
    };
    if config.parallel {
        file_paths.par_iter().map(digest).collect()
    } else {
        file_paths.iter().map(digest).collect()
    }
}

/// Fill `buf` unless EOF comes first; returns bytes read
pub(crate) fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

type PathList = Vec<(String, PathBuf)>;

/// Enumerate retained files and directories under `root`
fn walk(root: &Path, config: &CaptureConfig) -> Result<(PathList, PathList)> {
    let mut files = Vec::new();
    let mut dirs = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(true)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| {
            if entry.file_type().is_dir() {
                let name = entry.file_name().to_string_lossy();
                if config.is_ignored_dir(&name) {
                    debug!(target: "pageaudit::capture", path = %entry.path().display(), "Pruned ignored directory");
                    return false;
                }
            }
            true
        });

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            Error::io(path, io::Error::from(e))
        })?;
        let key = relative_key(root, entry.path());
        if entry.file_type().is_dir() {
            dirs.push((key, entry.into_path()));
        } else if !config.is_ignored_file(&entry.file_name().to_string_lossy()) {
            files.push((key, entry.into_path()));
        }
    }

    Ok((files, dirs))
}

/// Normalized `/`-separated key of `path` relative to `root`
fn relative_key(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn base_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

fn is_data_page_name_of(key: &str) -> bool {
    is_data_page_file_name(base_name(key))
}

/// Keep only directories that are not the parent of another recorded one
fn collapse_parent_dirs(mut dirs: BTreeMap<String, DirEntry>) -> BTreeMap<String, DirEntry> {
    let parents: BTreeSet<String> = dirs
        .keys()
        .filter_map(|key| key.rsplit_once('/').map(|(parent, _)| parent.to_string()))
        .collect();
    dirs.retain(|key, _| !parents.contains(key));
    dirs
}

#[cfg(unix)]
fn permission_bits(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn permission_bits(metadata: &fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o666
    }
}
