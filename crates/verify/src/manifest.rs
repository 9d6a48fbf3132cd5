//! Backup manifests
//!
//! A backup tool lists what it captured as JSON lines, one object per
//! file or directory with a mandatory `path` (relative to the data
//! directory) and arbitrary metadata. [`BackupManifest`] keys those records
//! by path so they can be compared with each other or with a [`Snapshot`].

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use pageaudit_storage::{CaptureConfig, Snapshot};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::finding::Finding;

/// Manifest read failures
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Line is not a JSON object
    #[error("line {line}: {message}")]
    InvalidLine {
        /// One-based line number
        line: usize,
        /// Parser message
        message: String,
    },

    /// Record without a string `path`
    #[error("line {line}: record has no string \"path\"")]
    MissingPath {
        /// One-based line number
        line: usize,
    },

    /// Manifest file could not be read
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// Manifest path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// One manifest record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the data directory
    pub path: String,
    /// Every other field of the record
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Records of one backup, keyed by path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackupManifest {
    entries: BTreeMap<String, ManifestEntry>,
}

impl BackupManifest {
    /// Parse JSON-lines text; blank lines are skipped
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let mut entries = BTreeMap::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let value: serde_json::Value =
                serde_json::from_str(raw).map_err(|e| ManifestError::InvalidLine {
                    line,
                    message: e.to_string(),
                })?;
            let serde_json::Value::Object(mut metadata) = value else {
                return Err(ManifestError::InvalidLine {
                    line,
                    message: "expected a JSON object".to_string(),
                });
            };
            let path = match metadata.remove("path") {
                Some(serde_json::Value::String(path)) => normalize(&path),
                _ => return Err(ManifestError::MissingPath { line }),
            };
            entries.insert(path.clone(), ManifestEntry { path, metadata });
        }

        debug!(target: "pageaudit::manifest", entries = entries.len(), "Parsed manifest");
        Ok(BackupManifest { entries })
    }

    /// Read and parse a manifest file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Record for a path
    pub fn get(&self, path: &str) -> Option<&ManifestEntry> {
        self.entries.get(path)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the manifest lists nothing
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate records in path order
    pub fn iter(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.values()
    }

    /// Paths listed here but not in `other`
    pub fn missing_from<'a>(&'a self, other: &BackupManifest) -> Vec<&'a str> {
        self.entries
            .keys()
            .filter(|path| !other.entries.contains_key(*path))
            .map(String::as_str)
            .collect()
    }

    /// Compare the manifest with a snapshot of the directory it describes
    ///
    /// Reports snapshot files the manifest does not list, and records that
    /// match no recorded file, directory or ancestor of one. Records under
    /// directories or with names that `config` ignores are skipped.
    pub fn cross_check(&self, snapshot: &Snapshot, config: &CaptureConfig) -> Vec<Finding> {
        let mut findings = Vec::new();

        for key in snapshot.files().keys() {
            if !self.entries.contains_key(key) {
                findings.push(Finding::UnlistedFile {
                    path: snapshot.absolute(key),
                });
            }
        }

        let known = known_paths(snapshot);
        for path in self.entries.keys() {
            if is_ignored(path, config) || known.contains(path.as_str()) {
                continue;
            }
            findings.push(Finding::ListedButMissing { path: path.clone() });
        }

        info!(
            target: "pageaudit::manifest",
            entries = self.entries.len(),
            files = snapshot.files().len(),
            findings = findings.len(),
            "Manifest cross-check finished"
        );
        findings
    }
}

fn normalize(path: &str) -> String {
    path.trim_matches('/').replace('\\', "/")
}

/// Every recorded file and directory plus all of their ancestors
fn known_paths(snapshot: &Snapshot) -> BTreeSet<&str> {
    let mut known = BTreeSet::new();
    for key in snapshot.files().keys().chain(snapshot.dirs().keys()) {
        let mut path = key.as_str();
        known.insert(path);
        while let Some((parent, _)) = path.rsplit_once('/') {
            known.insert(parent);
            path = parent;
        }
    }
    known
}

fn is_ignored(path: &str, config: &CaptureConfig) -> bool {
    let mut components = path.split('/').peekable();
    while let Some(component) = components.next() {
        let last = components.peek().is_none();
        if config.is_ignored_dir(component) || (last && config.is_ignored_file(component)) {
            return true;
        }
    }
    false
}
