//! Error types for page auditing
//!
//! Only conditions that make a comparison meaningless are errors: a file
//! that vanished or became unreadable mid-walk, and a corrupted change
//! bitmap. Ordinary divergences between two directories are reported as
//! findings by the verify crate and never surface here.
//!
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for audit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for snapshotting and bitmap decoding
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on a specific path (vanished file, unreadable directory, ...)
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// A required companion file does not exist
    #[error("Not found: {}", path.display())]
    NotFound {
        /// Path that was expected to exist
        path: PathBuf,
    },

    /// Change bitmap body is not a whole number of pages
    #[error("Misaligned bitmap {}: {size} bytes is not a multiple of the page size", path.display())]
    MisalignedBitmap {
        /// Bitmap file
        path: PathBuf,
        /// Actual file size in bytes
        size: u64,
    },

    /// Data corruption detected (bitmap shorter than the relation, etc.)
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Configuration failed validation
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Persisted snapshot could not be read back
    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

impl Error {
    /// Wrap an I/O error with the path it occurred on
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// True if this error was caused by a missing file or companion
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Io { source, .. } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// True if this error indicates on-disk corruption rather than I/O trouble
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::MisalignedBitmap { .. } | Error::Corruption(_))
    }
}
