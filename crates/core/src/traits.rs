//! ObjectStore trait definition
//!
//! This trait is the seam between the folder/transfer logic in this crate
//! and a concrete storage backend (the AWS SDK adapter, or the in-memory
//! store used by tests).

use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::path::RemotePath;

/// Metadata for an object or bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Object key or bucket name
    pub key: String,

    /// Size in bytes (None for buckets)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,

    /// Human-readable size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_human: Option<String>,

    /// Last modified timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Timestamp>,

    /// ETag (usually MD5 for single-part uploads)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    /// Content type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Whether this is a directory/prefix
    pub is_dir: bool,
}

impl ObjectInfo {
    /// Create a new ObjectInfo for a file
    pub fn file(key: impl Into<String>, size: i64) -> Self {
        Self {
            key: key.into(),
            size_bytes: Some(size),
            size_human: Some(humansize::format_size(size.max(0) as u64, humansize::BINARY)),
            last_modified: None,
            etag: None,
            content_type: None,
            is_dir: false,
        }
    }

    /// Create a new ObjectInfo for a bucket
    pub fn bucket(name: impl Into<String>) -> Self {
        Self {
            key: name.into(),
            size_bytes: None,
            size_human: None,
            last_modified: None,
            etag: None,
            content_type: None,
            is_dir: true,
        }
    }

    /// Whether the key is a folder marker (trailing `/`)
    pub fn is_marker(&self) -> bool {
        self.key.ends_with('/')
    }

    /// Size as an unsigned byte count, zero when unknown
    pub fn size(&self) -> u64 {
        self.size_bytes.unwrap_or(0).max(0) as u64
    }
}

/// One page of a list operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListResult {
    /// Listed objects
    pub items: Vec<ObjectInfo>,

    /// Whether the result is truncated (more items available)
    pub truncated: bool,

    /// Continuation token for the next page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
}

/// Options for list operations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Prefix to filter by
    pub prefix: Option<String>,

    /// Continuation token for pagination
    pub continuation_token: Option<String>,

    /// Maximum number of keys to return per request
    pub max_keys: Option<i32>,
}

/// Storage operations the helper layer is built on
///
/// Listing is always flat (no delimiter); folders are derived from keys by
/// [`crate::listing`]. Implementations must be safe to share across tasks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List buckets
    async fn list_buckets(&self) -> Result<Vec<ObjectInfo>>;

    /// Check if a bucket exists; `Ok(false)` only for a definite not-found
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// Create a bucket
    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    /// Delete an empty bucket
    async fn delete_bucket(&self, bucket: &str) -> Result<()>;

    /// List one page of objects in a bucket
    async fn list_objects(&self, bucket: &str, options: ListOptions) -> Result<ListResult>;

    /// Get object metadata
    async fn head_object(&self, path: &RemotePath) -> Result<ObjectInfo>;

    /// Get object content as bytes
    async fn get_object(&self, path: &RemotePath) -> Result<Vec<u8>>;

    /// Store an object, replacing any existing one
    async fn put_object(
        &self,
        path: &RemotePath,
        data: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<ObjectInfo>;

    /// Delete an object; deleting a missing key is not an error
    async fn delete_object(&self, path: &RemotePath) -> Result<()>;

    /// Server-side copy, possibly across buckets
    async fn copy_object(&self, src: &RemotePath, dst: &RemotePath) -> Result<ObjectInfo>;

    /// Presigned GET URL valid for `expires`
    async fn presign_get(&self, path: &RemotePath, expires: Duration) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_info_file() {
        let info = ObjectInfo::file("test.txt", 1024);
        assert_eq!(info.key, "test.txt");
        assert_eq!(info.size_bytes, Some(1024));
        assert_eq!(info.size(), 1024);
        assert!(!info.is_dir);
        assert!(!info.is_marker());
    }

    #[test]
    fn test_object_info_marker() {
        let info = ObjectInfo::file("path/to/dir/", 0);
        assert!(info.is_marker());
    }

    #[test]
    fn test_object_info_bucket() {
        let info = ObjectInfo::bucket("my-bucket");
        assert_eq!(info.key, "my-bucket");
        assert!(info.is_dir);
        assert_eq!(info.size(), 0);
    }
}
