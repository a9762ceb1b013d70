//! Rename emulation
//!
//! Object stores cannot rename. A rename here is copy, verify, delete: the
//! source of an item is only deleted once every copy in the operation has
//! been confirmed at its destination. If any copy fails, nothing is deleted
//! and the caller gets [`Error::RenameAborted`] with the split between
//! migrated and unmigrated items.

use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, ItemFailure, Result};
use crate::listing;
use crate::path::{RemotePath, normalize_key, normalize_prefix, validate_bucket_name};
use crate::traits::{ObjectInfo, ObjectStore};
use crate::transfer::{TransferOptions, TransferReport, WorkItem, run_batch};

/// Copy `src` to `dst` and confirm the copy is readable with the same size
async fn copy_verified(store: &dyn ObjectStore, src: &RemotePath, dst: &RemotePath) -> Result<()> {
    let source = store.head_object(src).await?;
    store.copy_object(src, dst).await?;
    let copy = store.head_object(dst).await?;
    if copy.size_bytes != source.size_bytes {
        return Err(Error::TransientStoreError(format!(
            "copy of {src} to {dst} has size {:?}, expected {:?}",
            copy.size_bytes, source.size_bytes
        )));
    }
    Ok(())
}

/// Rename a single object inside a bucket
pub async fn rename_file(
    store: &dyn ObjectStore,
    bucket: &str,
    old_key: &str,
    new_key: &str,
) -> Result<()> {
    let old_key = normalize_key(old_key)?;
    let new_key = normalize_key(new_key)?;
    if old_key == new_key {
        return Err(Error::InvalidPath(format!(
            "Source and destination are the same: {old_key}"
        )));
    }

    let src = RemotePath::new(bucket, old_key);
    let dst = RemotePath::new(bucket, new_key);

    store.head_object(&src).await?;
    match store.head_object(&dst).await {
        Ok(_) => return Err(Error::ObjectAlreadyExists(dst.to_string())),
        Err(Error::ObjectNotFound(_)) => {}
        Err(e) => return Err(e),
    }

    if let Err(e) = copy_verified(store, &src, &dst).await {
        return Err(Error::RenameAborted {
            migrated: Vec::new(),
            not_migrated: vec![ItemFailure::new(src.key.clone(), e.to_string())],
        });
    }

    store.delete_object(&src).await?;
    debug!(from = %src, to = %dst, "renamed object");
    Ok(())
}

/// One planned move
struct Migration {
    src: RemotePath,
    dst: RemotePath,
    bytes: u64,
}

/// Copy every migration, and only if all copies verify, delete the sources
async fn migrate(
    store: &Arc<dyn ObjectStore>,
    migrations: Vec<Migration>,
    options: &TransferOptions,
) -> Result<TransferReport> {
    let items: Vec<WorkItem<(RemotePath, RemotePath)>> = migrations
        .into_iter()
        .map(|m| WorkItem {
            name: m.src.key.clone(),
            bytes: m.bytes,
            payload: (m.src, m.dst),
        })
        .collect();
    let sources: Vec<RemotePath> = items.iter().map(|i| i.payload.0.clone()).collect();

    let copied = run_batch(items, options, |(src, dst): (RemotePath, RemotePath)| {
        let store = Arc::clone(store);
        async move { copy_verified(store.as_ref(), &src, &dst).await }
    })
    .await;

    if !copied.is_complete() {
        return Err(Error::RenameAborted {
            migrated: copied.succeeded,
            not_migrated: copied.failures,
        });
    }

    let deletes = sources
        .into_iter()
        .map(|path| WorkItem {
            name: path.key.clone(),
            bytes: 0,
            payload: path,
        })
        .collect();
    let deleted = run_batch(deletes, &options.silent(), |path: RemotePath| {
        let store = Arc::clone(store);
        async move { store.delete_object(&path).await }
    })
    .await;

    if !deleted.is_complete() {
        return Err(Error::PartialTransferFailure(deleted.failures));
    }
    Ok(copied)
}

/// Move every object under `old_prefix` to `new_prefix` in the same bucket
pub async fn rename_folder(
    store: &Arc<dyn ObjectStore>,
    bucket: &str,
    old_prefix: &str,
    new_prefix: &str,
    options: &TransferOptions,
) -> Result<TransferReport> {
    let old_prefix = normalize_prefix(old_prefix)?;
    let new_prefix = normalize_prefix(new_prefix)?;
    if old_prefix.is_empty() || new_prefix.is_empty() {
        return Err(Error::InvalidPath(
            "Folder rename needs a non-root source and destination".into(),
        ));
    }
    if new_prefix.starts_with(&old_prefix) || old_prefix.starts_with(&new_prefix) {
        return Err(Error::InvalidPath(format!(
            "Cannot rename '{old_prefix}' to '{new_prefix}': one contains the other"
        )));
    }

    let objects = listing::list_recursive(store.as_ref(), bucket, &old_prefix).await?;
    if objects.is_empty() {
        return Err(Error::ObjectNotFound(format!("s3://{bucket}/{old_prefix}")));
    }
    if listing::folder_exists(store.as_ref(), bucket, &new_prefix).await? {
        return Err(Error::ObjectAlreadyExists(format!("s3://{bucket}/{new_prefix}")));
    }

    let migrations = objects
        .into_iter()
        .map(|object| Migration {
            dst: RemotePath::new(bucket, object.key.replacen(&old_prefix, &new_prefix, 1)),
            bytes: object.size(),
            src: RemotePath::new(bucket, object.key),
        })
        .collect();

    let report = migrate(store, migrations, options).await?;
    debug!(bucket, from = %old_prefix, to = %new_prefix, items = report.items_done, "renamed folder");
    Ok(report)
}

/// Move a bucket's contents to `new_bucket` and remove the old bucket
///
/// The destination is created when missing; an existing, accessible
/// destination is reused. The old bucket is only deleted once it is empty.
pub async fn rename_bucket(
    store: &Arc<dyn ObjectStore>,
    old_bucket: &str,
    new_bucket: &str,
    options: &TransferOptions,
) -> Result<TransferReport> {
    validate_bucket_name(new_bucket)?;
    if old_bucket == new_bucket {
        return Err(Error::InvalidPath(format!(
            "Source and destination bucket are the same: {old_bucket}"
        )));
    }

    if !store.bucket_exists(old_bucket).await? {
        return Err(Error::BucketNotFound(old_bucket.to_string()));
    }
    if !store.bucket_exists(new_bucket).await? {
        match store.create_bucket(new_bucket).await {
            Ok(()) | Err(Error::BucketAlreadyExists(_)) => {}
            Err(e) => return Err(e),
        }
    }

    let objects: Vec<ObjectInfo> = listing::list_all(store.as_ref(), old_bucket, "").await?;
    let migrations = objects
        .into_iter()
        .map(|object| Migration {
            dst: RemotePath::new(new_bucket, object.key.as_str()),
            bytes: object.size(),
            src: RemotePath::new(old_bucket, object.key),
        })
        .collect();

    let report = migrate(store, migrations, options).await?;

    if listing::folder_exists(store.as_ref(), old_bucket, "").await? {
        return Err(Error::NonEmptyBucket(old_bucket.to_string()));
    }
    store.delete_bucket(old_bucket).await?;

    debug!(from = old_bucket, to = new_bucket, items = report.items_done, "renamed bucket");
    Ok(report)
}
