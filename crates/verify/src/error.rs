//! Verification error types
//!
//! Divergences between directories are findings, not errors. The variants
//! here cover the conditions that make a comparison meaningless, plus
//! `Mismatch`, which carries a failed report for callers that prefer
//! `Result`-style assertions.

use pageaudit_core::Error as StorageError;
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::manifest::ManifestError;

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerifyError>;

/// Errors that can occur during verification
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Snapshot capture or bitmap decoding failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Catalog query failed or returned an unusable row
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Backup manifest could not be read
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// A verification ran to completion and found hard divergences
    #[error("{0}")]
    Mismatch(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_storage_error_is_transparent() {
        let err: VerifyError = StorageError::NotFound {
            path: PathBuf::from("16385_ptrack"),
        }
        .into();
        assert_eq!(err.to_string(), "Not found: 16385_ptrack");
    }

    #[test]
    fn test_catalog_error_display() {
        let err: VerifyError = CatalogError::Query {
            sql: "select 1".to_string(),
            message: "connection refused".to_string(),
        }
        .into();
        let msg = err.to_string();
        assert!(msg.contains("Catalog error"));
        assert!(msg.contains("connection refused"));
    }
}
