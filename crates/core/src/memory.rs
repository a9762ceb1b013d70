//! In-memory object store
//!
//! A complete [`ObjectStore`] kept in process memory. It paginates like a
//! real service and can be told to fail specific calls, which is how the
//! batch and rename code is exercised under partial failure.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;

use crate::error::{Error, Result};
use crate::path::RemotePath;
use crate::traits::{ListOptions, ListResult, ObjectInfo, ObjectStore};

/// Default number of keys per page
pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: Option<String>,
    last_modified: Timestamp,
}

impl StoredObject {
    fn info(&self, key: &str) -> ObjectInfo {
        let mut info = ObjectInfo::file(key, self.data.len() as i64);
        info.last_modified = Some(self.last_modified);
        info.content_type = self.content_type.clone();
        info
    }
}

type Bucket = BTreeMap<String, StoredObject>;

#[derive(Debug, Default)]
struct Faults {
    copy: HashSet<String>,
    put: HashSet<String>,
    get: HashSet<String>,
    delete: HashSet<String>,
    denied_buckets: HashSet<String>,
    transient_list: bool,
}

/// Thread-safe in-memory object store
#[derive(Debug)]
pub struct MemoryStore {
    buckets: Mutex<BTreeMap<String, Bucket>>,
    faults: Mutex<Faults>,
    page_size: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(BTreeMap::new()),
            faults: Mutex::new(Faults::default()),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Limit every list page to `size` keys (minimum 1)
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size.max(1);
        self
    }

    /// Create a bucket, builder style
    pub fn with_bucket(self, bucket: &str) -> Self {
        self.buckets().entry(bucket.to_string()).or_default();
        self
    }

    fn buckets(&self) -> MutexGuard<'_, BTreeMap<String, Bucket>> {
        self.buckets.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert an object directly, creating the bucket if needed
    pub fn insert(&self, bucket: &str, key: &str, data: impl Into<Vec<u8>>) {
        self.buckets().entry(bucket.to_string()).or_default().insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                content_type: None,
                last_modified: Timestamp::now(),
            },
        );
    }

    /// All keys in a bucket, sorted
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets()
            .get(bucket)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Raw object content
    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.buckets()
            .get(bucket)
            .and_then(|b| b.get(key))
            .map(|o| o.data.clone())
    }

    /// Whether a bucket is present
    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.buckets().contains_key(bucket)
    }

    /// Make copies whose source key is `key` fail
    pub fn fail_copy(&self, key: &str) {
        self.faults().copy.insert(key.to_string());
    }

    /// Make uploads to `key` fail
    pub fn fail_put(&self, key: &str) {
        self.faults().put.insert(key.to_string());
    }

    /// Make downloads of `key` fail
    pub fn fail_get(&self, key: &str) {
        self.faults().get.insert(key.to_string());
    }

    /// Make deletes of `key` fail
    pub fn fail_delete(&self, key: &str) {
        self.faults().delete.insert(key.to_string());
    }

    /// Answer every call touching `bucket` with access denied
    pub fn deny_bucket(&self, bucket: &str) {
        self.faults().denied_buckets.insert(bucket.to_string());
    }

    /// Make list calls fail with a transient error
    pub fn fail_list_transiently(&self, enabled: bool) {
        self.faults().transient_list = enabled;
    }

    /// Remove every injected fault
    pub fn clear_faults(&self) {
        *self.faults() = Faults::default();
    }

    fn check_access(&self, bucket: &str) -> Result<()> {
        if self.faults().denied_buckets.contains(bucket) {
            return Err(Error::PermissionDenied(format!("access to bucket '{bucket}' denied")));
        }
        Ok(())
    }

    fn injected(&self, select: impl Fn(&Faults) -> &HashSet<String>, key: &str) -> Result<()> {
        if select(&self.faults()).contains(key) {
            return Err(Error::TransientStoreError(format!("injected failure for '{key}'")));
        }
        Ok(())
    }
}

fn missing_bucket(bucket: &str) -> Error {
    Error::BucketNotFound(bucket.to_string())
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_buckets(&self) -> Result<Vec<ObjectInfo>> {
        Ok(self.buckets().keys().map(ObjectInfo::bucket).collect())
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        self.check_access(bucket)?;
        Ok(self.buckets().contains_key(bucket))
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        self.check_access(bucket)?;
        let mut buckets = self.buckets();
        if buckets.contains_key(bucket) {
            return Err(Error::BucketAlreadyExists(bucket.to_string()));
        }
        buckets.insert(bucket.to_string(), Bucket::new());
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.check_access(bucket)?;
        let mut buckets = self.buckets();
        match buckets.get(bucket) {
            None => Err(missing_bucket(bucket)),
            Some(objects) if !objects.is_empty() => Err(Error::NonEmptyBucket(bucket.to_string())),
            Some(_) => {
                buckets.remove(bucket);
                Ok(())
            }
        }
    }

    async fn list_objects(&self, bucket: &str, options: ListOptions) -> Result<ListResult> {
        self.check_access(bucket)?;
        if self.faults().transient_list {
            return Err(Error::TransientStoreError("injected list failure".into()));
        }

        let buckets = self.buckets();
        let objects = buckets.get(bucket).ok_or_else(|| missing_bucket(bucket))?;
        let prefix = options.prefix.unwrap_or_default();
        let page_size = options
            .max_keys
            .map(|m| (m.max(1) as usize).min(self.page_size))
            .unwrap_or(self.page_size);

        let mut matching = objects
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .filter(|(key, _)| match &options.continuation_token {
                Some(token) => key.as_str() > token.as_str(),
                None => true,
            });

        let items: Vec<ObjectInfo> = matching
            .by_ref()
            .take(page_size)
            .map(|(key, object)| object.info(key))
            .collect();
        let truncated = matching.next().is_some();
        let continuation_token = if truncated {
            items.last().map(|i| i.key.clone())
        } else {
            None
        };

        Ok(ListResult {
            items,
            truncated,
            continuation_token,
        })
    }

    async fn head_object(&self, path: &RemotePath) -> Result<ObjectInfo> {
        self.check_access(&path.bucket)?;
        let buckets = self.buckets();
        let objects = buckets
            .get(&path.bucket)
            .ok_or_else(|| missing_bucket(&path.bucket))?;
        objects
            .get(&path.key)
            .map(|o| o.info(&path.key))
            .ok_or_else(|| Error::ObjectNotFound(path.to_string()))
    }

    async fn get_object(&self, path: &RemotePath) -> Result<Vec<u8>> {
        self.check_access(&path.bucket)?;
        self.injected(|f| &f.get, &path.key)?;
        let buckets = self.buckets();
        let objects = buckets
            .get(&path.bucket)
            .ok_or_else(|| missing_bucket(&path.bucket))?;
        objects
            .get(&path.key)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::ObjectNotFound(path.to_string()))
    }

    async fn put_object(
        &self,
        path: &RemotePath,
        data: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<ObjectInfo> {
        self.check_access(&path.bucket)?;
        self.injected(|f| &f.put, &path.key)?;
        let mut buckets = self.buckets();
        let objects = buckets
            .get_mut(&path.bucket)
            .ok_or_else(|| missing_bucket(&path.bucket))?;
        let object = StoredObject {
            data,
            content_type,
            last_modified: Timestamp::now(),
        };
        let info = object.info(&path.key);
        objects.insert(path.key.clone(), object);
        Ok(info)
    }

    async fn delete_object(&self, path: &RemotePath) -> Result<()> {
        self.check_access(&path.bucket)?;
        self.injected(|f| &f.delete, &path.key)?;
        let mut buckets = self.buckets();
        let objects = buckets
            .get_mut(&path.bucket)
            .ok_or_else(|| missing_bucket(&path.bucket))?;
        objects.remove(&path.key);
        Ok(())
    }

    async fn copy_object(&self, src: &RemotePath, dst: &RemotePath) -> Result<ObjectInfo> {
        self.check_access(&src.bucket)?;
        self.check_access(&dst.bucket)?;
        self.injected(|f| &f.copy, &src.key)?;
        let mut buckets = self.buckets();
        let object = buckets
            .get(&src.bucket)
            .ok_or_else(|| missing_bucket(&src.bucket))?
            .get(&src.key)
            .cloned()
            .ok_or_else(|| Error::ObjectNotFound(src.to_string()))?;
        let target = buckets
            .get_mut(&dst.bucket)
            .ok_or_else(|| missing_bucket(&dst.bucket))?;
        let copied = StoredObject {
            last_modified: Timestamp::now(),
            ..object
        };
        let info = copied.info(&dst.key);
        target.insert(dst.key.clone(), copied);
        Ok(info)
    }

    async fn presign_get(&self, path: &RemotePath, expires: Duration) -> Result<String> {
        self.check_access(&path.bucket)?;
        Ok(format!(
            "memory://{}/{}?expires={}",
            path.bucket,
            path.key,
            expires.as_secs()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pagination_is_exhaustive_and_ordered() {
        let store = MemoryStore::new().with_page_size(2);
        for key in ["a", "b", "c", "d", "e"] {
            store.insert("b1", key, "x");
        }

        let first = store.list_objects("b1", ListOptions::default()).await.unwrap();
        assert_eq!(first.items.len(), 2);
        assert!(first.truncated);

        let mut token = first.continuation_token;
        let mut keys: Vec<String> = first.items.into_iter().map(|i| i.key).collect();
        while let Some(t) = token.take() {
            let page = store
                .list_objects(
                    "b1",
                    ListOptions {
                        continuation_token: Some(t),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            keys.extend(page.items.into_iter().map(|i| i.key));
            token = page.continuation_token;
        }
        assert_eq!(keys, vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn test_delete_bucket_refuses_non_empty() {
        let store = MemoryStore::new();
        store.insert("b1", "k", "v");
        let err = store.delete_bucket("b1").await.unwrap_err();
        assert!(matches!(err, Error::NonEmptyBucket(_)));
        assert!(store.has_bucket("b1"));
    }

    #[tokio::test]
    async fn test_copy_across_buckets() {
        let store = MemoryStore::new().with_bucket("dst");
        store.insert("src", "a.txt", "hello");
        store
            .copy_object(&RemotePath::new("src", "a.txt"), &RemotePath::new("dst", "b.txt"))
            .await
            .unwrap();
        assert_eq!(store.object("dst", "b.txt").unwrap(), b"hello");
        assert_eq!(store.object("src", "a.txt").unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let store = MemoryStore::new();
        store.insert("b1", "k", "v");
        store.fail_get("k");
        let err = store.get_object(&RemotePath::new("b1", "k")).await.unwrap_err();
        assert!(err.is_retryable());

        store.deny_bucket("b1");
        let err = store.bucket_exists("b1").await.unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));

        store.clear_faults();
        assert!(store.bucket_exists("b1").await.unwrap());
    }
}
