//! Capture configuration
//!
//! Controls which parts of a data directory a snapshot skips and how files
//! are read. The defaults cover the transient subdirectories and control
//! files of a running server, which legitimately differ between an original
//! directory and its restored copy.

use std::collections::BTreeSet;

use pageaudit_core::{Error, PAGE_SIZE};

/// Directories skipped by default (pruned before descent)
pub const DEFAULT_IGNORED_DIRS: &[&str] = &[
    "pg_xlog",
    "pg_wal",
    "pg_log",
    "pg_stat_tmp",
    "pg_subtrans",
    "pg_notify",
];

/// Files skipped by default
pub const DEFAULT_IGNORED_FILES: &[&str] = &[
    "postmaster.pid",
    "postmaster.opts",
    "pg_internal.init",
    "postgresql.auto.conf",
    "backup_label",
    "tablespace_map",
    "recovery.conf",
    "ptrack_control",
    "ptrack_init",
    "pg_control",
    "probackup_recovery.conf",
    "recovery.signal",
    "standby.signal",
    "ptrack.map",
    "ptrack.map.mmap",
    "ptrack.map.tmp",
];

/// Default read chunk size for streaming digests (64 KiB)
pub const DEFAULT_READ_CHUNK_SIZE: usize = 64 * 1024;

/// Snapshot capture configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Directory base names to prune
    pub ignored_dir_names: BTreeSet<String>,
    /// File base names to skip
    pub ignored_file_names: BTreeSet<String>,
    /// Skip change-bitmap companion files (`*_ptrack`, `*_ptrack.N`)
    pub ignore_bitmap_files: bool,
    /// Bytes read per I/O call while digesting (multiple of the page size)
    pub read_chunk_size: usize,
    /// Digest files on a worker pool instead of the calling thread
    pub parallel: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            ignored_dir_names: DEFAULT_IGNORED_DIRS.iter().map(|s| s.to_string()).collect(),
            ignored_file_names: DEFAULT_IGNORED_FILES.iter().map(|s| s.to_string()).collect(),
            ignore_bitmap_files: true,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            parallel: false,
        }
    }
}

impl CaptureConfig {
    /// Create config that skips nothing
    ///
    /// Useful for comparing arbitrary directories outside a server.
    pub fn bare() -> Self {
        CaptureConfig {
            ignored_dir_names: BTreeSet::new(),
            ignored_file_names: BTreeSet::new(),
            ignore_bitmap_files: false,
            ..Default::default()
        }
    }

    /// Prune an additional directory name
    pub fn with_ignored_dir(mut self, name: impl Into<String>) -> Self {
        self.ignored_dir_names.insert(name.into());
        self
    }

    /// Prune several additional directory names
    pub fn with_ignored_dirs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_dir_names.extend(names.into_iter().map(Into::into));
        self
    }

    /// Skip an additional file name
    pub fn with_ignored_file(mut self, name: impl Into<String>) -> Self {
        self.ignored_file_names.insert(name.into());
        self
    }

    /// Skip several additional file names
    pub fn with_ignored_files<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_file_names.extend(names.into_iter().map(Into::into));
        self
    }

    /// Include or skip change-bitmap companion files
    pub fn with_bitmap_files_ignored(mut self, ignore: bool) -> Self {
        self.ignore_bitmap_files = ignore;
        self
    }

    /// Set the read chunk size
    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }

    /// Digest files in parallel
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Check whether a directory base name is pruned
    pub fn is_ignored_dir(&self, name: &str) -> bool {
        self.ignored_dir_names.contains(name)
    }

    /// Check whether a file base name is skipped
    pub fn is_ignored_file(&self, name: &str) -> bool {
        self.ignored_file_names.contains(name)
            || (self.ignore_bitmap_files && pageaudit_core::is_bitmap_file_name(name))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.read_chunk_size == 0 || self.read_chunk_size % PAGE_SIZE != 0 {
            return Err(ConfigError::InvalidChunkSize(self.read_chunk_size));
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Chunk size is zero or not page aligned
    #[error("Invalid read chunk size {0}: must be a non-zero multiple of {PAGE_SIZE}")]
    InvalidChunkSize(usize),
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CaptureConfig::default();
        assert!(config.is_ignored_dir("pg_wal"));
        assert!(config.is_ignored_dir("pg_stat_tmp"));
        assert!(config.is_ignored_file("postmaster.pid"));
        assert!(config.is_ignored_file("ptrack.map.mmap"));
        assert!(config.ignore_bitmap_files);
        assert!(!config.parallel);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bitmap_files_follow_toggle() {
        let config = CaptureConfig::default();
        assert!(config.is_ignored_file("16385_ptrack"));
        assert!(config.is_ignored_file("16385_ptrack.1"));
        assert!(!config.is_ignored_file("16385"));

        let config = config.with_bitmap_files_ignored(false);
        assert!(!config.is_ignored_file("16385_ptrack"));
    }

    #[test]
    fn test_builder_pattern() {
        let config = CaptureConfig::default()
            .with_ignored_dir("pg_replslot")
            .with_ignored_dirs(["tmp_a", "tmp_b"])
            .with_ignored_file("current_logfiles")
            .with_parallel(true)
            .with_read_chunk_size(4 * PAGE_SIZE);

        assert!(config.is_ignored_dir("pg_replslot"));
        assert!(config.is_ignored_dir("tmp_b"));
        assert!(config.is_ignored_dir("pg_wal"), "defaults are kept");
        assert!(config.is_ignored_file("current_logfiles"));
        assert!(config.parallel);
        assert_eq!(config.read_chunk_size, 4 * PAGE_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bare_config_skips_nothing() {
        let config = CaptureConfig::bare();
        assert!(!config.is_ignored_dir("pg_wal"));
        assert!(!config.is_ignored_file("postmaster.pid"));
        assert!(!config.is_ignored_file("16385_ptrack"));
    }

    #[test]
    fn test_validate_invalid_chunk_size() {
        let config = CaptureConfig::default().with_read_chunk_size(1000);
        assert_eq!(config.validate(), Err(ConfigError::InvalidChunkSize(1000)));

        let config = CaptureConfig::default().with_read_chunk_size(0);
        assert!(config.validate().is_err());
    }
}
