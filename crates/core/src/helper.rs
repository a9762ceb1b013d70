//! The `S3Helper` façade
//!
//! One explicitly constructed value per store connection. Every operation
//! normalizes its paths, checks the bucket and source preconditions the
//! store itself would not, and then delegates to the listing, transfer and
//! rename engines.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::listing::{self, Listing, MissingFolderPolicy};
use crate::path::{RemotePath, normalize_key, normalize_prefix, validate_bucket_name};
use crate::progress::ProgressObserver;
use crate::rename;
use crate::traits::{ObjectInfo, ObjectStore};
use crate::transfer::{self, DEFAULT_CONCURRENCY, TransferOptions, TransferReport};

/// Behavior switches for [`S3Helper`]
#[derive(Debug, Clone)]
pub struct HelperConfig {
    /// Log each operation at info level instead of debug
    pub logging_enabled: bool,
    pub concurrency: usize,
    pub presign_ttl: Duration,
    pub missing_folder: MissingFolderPolicy,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            logging_enabled: false,
            concurrency: DEFAULT_CONCURRENCY,
            presign_ttl: Duration::from_secs(3600),
            missing_folder: MissingFolderPolicy::Empty,
        }
    }
}

impl From<&Config> for HelperConfig {
    fn from(config: &Config) -> Self {
        Self {
            logging_enabled: config.defaults.logging_enabled,
            concurrency: config.defaults.concurrency.max(1),
            presign_ttl: Duration::from_secs(config.defaults.presign_ttl_secs),
            missing_folder: config.defaults.missing_folder,
        }
    }
}

/// File and folder operations over an [`ObjectStore`]
#[derive(Clone)]
pub struct S3Helper {
    store: Arc<dyn ObjectStore>,
    config: HelperConfig,
}

impl S3Helper {
    pub fn new(store: Arc<dyn ObjectStore>, config: HelperConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn config(&self) -> &HelperConfig {
        &self.config
    }

    /// Batch options seeded with the configured concurrency
    pub fn transfer_options(&self) -> TransferOptions {
        TransferOptions::new().with_concurrency(self.config.concurrency)
    }

    fn announce(&self, operation: &str, target: &str) {
        if self.config.logging_enabled {
            info!(operation, target, "s3 operation");
        } else {
            debug!(operation, target, "s3 operation");
        }
    }

    fn summarize(&self, operation: &str, report: &TransferReport) {
        if self.config.logging_enabled {
            info!(
                operation,
                items = report.items_done,
                total = report.items_total,
                bytes = report.bytes_done,
                failed = report.failures.len(),
                "batch finished"
            );
        }
    }

    async fn require_bucket(&self, bucket: &str) -> Result<()> {
        if self.store.bucket_exists(bucket).await? {
            Ok(())
        } else {
            Err(Error::BucketNotFound(bucket.to_string()))
        }
    }

    async fn require_object(&self, path: &RemotePath) -> Result<ObjectInfo> {
        self.require_bucket(&path.bucket).await?;
        self.store.head_object(path).await
    }

    // ---------------------------------------------------------------- listing

    /// Names of every bucket visible to the credentials
    pub async fn list_buckets(&self) -> Result<Vec<String>> {
        self.announce("list_buckets", "");
        let buckets = self.store.list_buckets().await?;
        Ok(buckets.into_iter().map(|b| b.key).collect())
    }

    /// Immediate folders and files under `prefix`
    pub async fn list(&self, bucket: &str, prefix: &str) -> Result<Listing> {
        self.announce("list", &format!("{bucket}/{prefix}"));
        self.require_bucket(bucket).await?;
        listing::list(self.store.as_ref(), bucket, prefix, self.config.missing_folder).await
    }

    // ------------------------------------------------------------------ files

    pub async fn read_file(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let path = RemotePath::new(bucket, normalize_key(key)?);
        self.announce("read_file", &path.to_string());
        self.require_bucket(bucket).await?;
        self.store.get_object(&path).await
    }

    /// Read an object as text; only UTF-8 is supported
    pub async fn read_file_string(
        &self,
        bucket: &str,
        key: &str,
        encoding: Option<&str>,
    ) -> Result<String> {
        let encoding = encoding.unwrap_or("utf-8");
        if !matches!(encoding.to_ascii_lowercase().as_str(), "utf-8" | "utf8") {
            return Err(Error::InvalidEncoding(encoding.to_string()));
        }
        let data = self.read_file(bucket, key).await?;
        String::from_utf8(data)
            .map_err(|e| Error::InvalidEncoding(format!("{key} is not valid UTF-8: {e}")))
    }

    pub async fn download_file(
        &self,
        bucket: &str,
        key: &str,
        local: &Path,
        observer: Option<&Arc<dyn ProgressObserver>>,
    ) -> Result<u64> {
        let path = RemotePath::new(bucket, normalize_key(key)?);
        self.announce("download_file", &path.to_string());
        self.require_object(&path).await?;
        transfer::download_file(self.store.as_ref(), &path, local, observer).await
    }

    pub async fn upload_file(
        &self,
        bucket: &str,
        local: &Path,
        key: &str,
        observer: Option<&Arc<dyn ProgressObserver>>,
    ) -> Result<u64> {
        let path = RemotePath::new(bucket, normalize_key(key)?);
        self.announce("upload_file", &path.to_string());
        self.require_bucket(bucket).await?;
        transfer::upload_file(self.store.as_ref(), local, &path, observer).await
    }

    pub async fn delete_file(&self, bucket: &str, key: &str) -> Result<()> {
        let path = RemotePath::new(bucket, normalize_key(key)?);
        self.announce("delete_file", &path.to_string());
        self.require_object(&path).await?;
        self.store.delete_object(&path).await
    }

    /// Presigned GET URL; `ttl` defaults to the configured lifetime
    pub async fn presigned_url(
        &self,
        bucket: &str,
        key: &str,
        ttl: Option<Duration>,
    ) -> Result<String> {
        let path = RemotePath::new(bucket, normalize_key(key)?);
        self.announce("presigned_url", &path.to_string());
        self.require_object(&path).await?;
        self.store
            .presign_get(&path, ttl.unwrap_or(self.config.presign_ttl))
            .await
    }

    // ---------------------------------------------------------------- folders

    pub async fn upload_folder(
        &self,
        bucket: &str,
        local_dir: &Path,
        prefix: &str,
        options: &TransferOptions,
    ) -> Result<TransferReport> {
        self.announce("upload_folder", &format!("{bucket}/{prefix}"));
        self.require_bucket(bucket).await?;
        let report = transfer::upload_folder(&self.store, bucket, local_dir, prefix, options).await?;
        self.summarize("upload_folder", &report);
        report.into_result()
    }

    pub async fn download_folder(
        &self,
        bucket: &str,
        prefix: &str,
        local_dir: &Path,
        options: &TransferOptions,
    ) -> Result<TransferReport> {
        let prefix = normalize_prefix(prefix)?;
        self.announce("download_folder", &format!("{bucket}/{prefix}"));
        self.require_bucket(bucket).await?;
        if !prefix.is_empty() && !listing::folder_exists(self.store.as_ref(), bucket, &prefix).await? {
            return Err(Error::ObjectNotFound(format!("s3://{bucket}/{prefix}")));
        }
        let report = transfer::download_folder(&self.store, bucket, &prefix, local_dir, options).await?;
        self.summarize("download_folder", &report);
        report.into_result()
    }

    /// Delete everything under a non-root prefix
    pub async fn delete_folder(
        &self,
        bucket: &str,
        prefix: &str,
        options: &TransferOptions,
    ) -> Result<TransferReport> {
        let prefix = normalize_prefix(prefix)?;
        if prefix.is_empty() {
            return Err(Error::InvalidPath(
                "Refusing to delete the bucket root as a folder".into(),
            ));
        }
        self.announce("delete_folder", &format!("{bucket}/{prefix}"));
        self.require_bucket(bucket).await?;
        if !listing::folder_exists(self.store.as_ref(), bucket, &prefix).await? {
            return Err(Error::ObjectNotFound(format!("s3://{bucket}/{prefix}")));
        }
        let report = transfer::delete_prefix(&self.store, bucket, &prefix, options).await?;
        self.summarize("delete_folder", &report);
        report.into_result()
    }

    // ---------------------------------------------------------------- renames

    pub async fn rename_file(&self, bucket: &str, old_key: &str, new_key: &str) -> Result<()> {
        self.announce("rename_file", &format!("{bucket}/{old_key} -> {new_key}"));
        self.require_bucket(bucket).await?;
        rename::rename_file(self.store.as_ref(), bucket, old_key, new_key).await
    }

    pub async fn rename_folder(
        &self,
        bucket: &str,
        old_prefix: &str,
        new_prefix: &str,
        options: &TransferOptions,
    ) -> Result<TransferReport> {
        self.announce("rename_folder", &format!("{bucket}/{old_prefix} -> {new_prefix}"));
        self.require_bucket(bucket).await?;
        let report = rename::rename_folder(&self.store, bucket, old_prefix, new_prefix, options).await?;
        self.summarize("rename_folder", &report);
        Ok(report)
    }

    pub async fn rename_bucket(
        &self,
        old_bucket: &str,
        new_bucket: &str,
        options: &TransferOptions,
    ) -> Result<TransferReport> {
        self.announce("rename_bucket", &format!("{old_bucket} -> {new_bucket}"));
        let report = rename::rename_bucket(&self.store, old_bucket, new_bucket, options).await?;
        self.summarize("rename_bucket", &report);
        Ok(report)
    }

    // ---------------------------------------------------------------- buckets

    pub async fn create_bucket(&self, bucket: &str) -> Result<()> {
        validate_bucket_name(bucket)?;
        self.announce("create_bucket", bucket);
        if self.store.bucket_exists(bucket).await? {
            return Err(Error::BucketAlreadyExists(bucket.to_string()));
        }
        self.store.create_bucket(bucket).await
    }

    /// Delete an empty bucket; a bucket with any object left is kept
    pub async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.announce("delete_bucket", bucket);
        self.require_bucket(bucket).await?;
        if listing::folder_exists(self.store.as_ref(), bucket, "").await? {
            return Err(Error::NonEmptyBucket(bucket.to_string()));
        }
        self.store.delete_bucket(bucket).await
    }

    // -------------------------------------------------------------- existence

    pub async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        self.store.bucket_exists(bucket).await
    }

    pub async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        let path = RemotePath::new(bucket, normalize_key(key)?);
        match self.store.head_object(&path).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Existence of a file, or of a folder when `path` ends in `/`
    pub async fn path_exists(&self, bucket: &str, path: &str) -> Result<bool> {
        if !path.ends_with('/') {
            return self.object_exists(bucket, path).await;
        }
        match listing::folder_exists(self.store.as_ref(), bucket, path).await {
            Ok(found) => Ok(found),
            Err(Error::BucketNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Metadata of a single object
    pub async fn stat(&self, bucket: &str, key: &str) -> Result<ObjectInfo> {
        let path = RemotePath::new(bucket, normalize_key(key)?);
        self.announce("stat", &path.to_string());
        self.require_object(&path).await
    }
}
