//! Error types for s3h-core
//!
//! Provides a unified error type that can be converted to appropriate exit codes.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Result type alias for s3h-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// A single failed item inside a batch operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    /// Object key or local path of the item
    pub item: String,
    /// Human-readable failure reason
    pub reason: String,
}

impl ItemFailure {
    pub fn new(item: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.item, self.reason)
    }
}

/// Error types for s3h-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Empty key, or a path escaping its declared root
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Bucket does not exist
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    /// Object (or folder) does not exist
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// Bucket already exists
    #[error("Bucket already exists: {0}")]
    BucketAlreadyExists(String),

    /// An object or folder already occupies the destination
    #[error("Object already exists: {0}")]
    ObjectAlreadyExists(String),

    /// Access denied by the store
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Some items of a batch failed
    #[error("{} item(s) failed: {}", .0.len(), summarize(.0))]
    PartialTransferFailure(Vec<ItemFailure>),

    /// A rename stopped before deleting any unverified source
    #[error(
        "Rename aborted: {} item(s) migrated, {} not migrated",
        .migrated.len(),
        .not_migrated.len()
    )]
    RenameAborted {
        /// Items whose copy was verified at the destination
        migrated: Vec<String>,
        /// Items whose copy failed or never ran
        not_migrated: Vec<ItemFailure>,
    },

    /// Network or service-side failure (retryable)
    #[error("Transient store error: {0}")]
    TransientStoreError(String),

    /// Bucket deletion refused because objects remain
    #[error("Bucket is not empty: {0}")]
    NonEmptyBucket(String),

    /// Unsupported text encoding for read_file
    #[error("Unsupported encoding: {0}")]
    InvalidEncoding(String),

    /// Batch operation cancelled before it started any work
    #[error("Operation cancelled")]
    Cancelled,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// General error
    #[error("{0}")]
    General(String),
}

fn summarize(failures: &[ItemFailure]) -> String {
    const SHOWN: usize = 3;
    let mut parts: Vec<String> = failures.iter().take(SHOWN).map(|f| f.to_string()).collect();
    if failures.len() > SHOWN {
        parts.push(format!("and {} more", failures.len() - SHOWN));
    }
    parts.join("; ")
}

impl Error {
    /// Get the appropriate exit code for this error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidPath(_) | Error::Config(_) | Error::InvalidEncoding(_) => 2, // UsageError
            Error::TransientStoreError(_) => 3, // NetworkError
            Error::PermissionDenied(_) => 4,    // AuthError
            Error::BucketNotFound(_) | Error::ObjectNotFound(_) => 5, // NotFound
            Error::BucketAlreadyExists(_)
            | Error::ObjectAlreadyExists(_)
            | Error::NonEmptyBucket(_)
            | Error::RenameAborted { .. } => 6, // Conflict
            Error::Cancelled => 130,            // Interrupted
            _ => 1,                             // GeneralError
        }
    }

    /// Whether a caller may retry the operation unchanged
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Error::TransientStoreError(_))
    }

    /// Whether this is one of the not-found kinds
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Error::BucketNotFound(_) | Error::ObjectNotFound(_))
    }
}
