//! Folder listing over flat keys
//!
//! Object stores have no directories. A folder is derived from the key set:
//! it exists when some key starts with `prefix/`, or when a marker object
//! with that exact key is present.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::path::normalize_prefix;
use crate::traits::{ListOptions, ObjectInfo, ObjectStore};

/// Immediate children of a prefix
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Listing {
    /// Child folder names, without trailing `/`
    pub folders: Vec<String>,
    /// Child file names
    pub files: Vec<String>,
}

impl Listing {
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty() && self.files.is_empty()
    }
}

/// How a listing of a prefix with no objects is reported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingFolderPolicy {
    /// Return an empty listing
    #[default]
    Empty,
    /// Return `ObjectNotFound`
    Error,
}

/// Fetch every object under `prefix`, following continuation tokens
pub async fn list_all(store: &dyn ObjectStore, bucket: &str, prefix: &str) -> Result<Vec<ObjectInfo>> {
    let mut objects = Vec::new();
    let mut token = None;
    let mut pages = 0usize;

    loop {
        let page = store
            .list_objects(
                bucket,
                ListOptions {
                    prefix: (!prefix.is_empty()).then(|| prefix.to_string()),
                    continuation_token: token.take(),
                    max_keys: None,
                },
            )
            .await?;
        pages += 1;
        objects.extend(page.items);

        if !page.truncated {
            break;
        }
        match page.continuation_token {
            Some(next) => token = Some(next),
            None => {
                return Err(Error::TransientStoreError(format!(
                    "listing of '{bucket}/{prefix}' was truncated without a continuation token"
                )));
            }
        }
    }

    debug!(bucket, prefix, pages, objects = objects.len(), "listed prefix");
    Ok(objects)
}

/// Split a flat object list into the immediate folders and files of `prefix`
///
/// `prefix` must already be normalized (empty, or ending in `/`). Keys with
/// an empty segment right after `prefix` (such as `a//x.txt` under `a/`)
/// are left out: no normalized prefix can name that folder.
pub fn derive_listing(prefix: &str, objects: &[ObjectInfo]) -> Listing {
    let mut folders = BTreeSet::new();
    let mut files = BTreeSet::new();

    for object in objects {
        let Some(rest) = object.key.strip_prefix(prefix) else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }
        match rest.split_once('/') {
            Some((folder, _)) if !folder.is_empty() => {
                folders.insert(folder.to_string());
            }
            // Empty folder name
            Some(_) => {}
            None => {
                files.insert(rest.to_string());
            }
        }
    }

    Listing {
        folders: folders.into_iter().collect(),
        files: files.into_iter().collect(),
    }
}

/// List the immediate children of `prefix` in `bucket`
pub async fn list(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
    policy: MissingFolderPolicy,
) -> Result<Listing> {
    let prefix = normalize_prefix(prefix)?;
    let objects = list_all(store, bucket, &prefix).await?;

    if objects.is_empty() && !prefix.is_empty() && policy == MissingFolderPolicy::Error {
        return Err(Error::ObjectNotFound(format!("s3://{bucket}/{prefix}")));
    }

    Ok(derive_listing(&prefix, &objects))
}

/// Whether any object, marker included, lives under `prefix`
pub async fn folder_exists(store: &dyn ObjectStore, bucket: &str, prefix: &str) -> Result<bool> {
    let prefix = normalize_prefix(prefix)?;
    let page = store
        .list_objects(
            bucket,
            ListOptions {
                prefix: (!prefix.is_empty()).then(|| prefix.clone()),
                continuation_token: None,
                max_keys: Some(1),
            },
        )
        .await?;
    Ok(!page.items.is_empty())
}

/// Every object under `prefix`, at any depth, markers included
pub async fn list_recursive(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
) -> Result<Vec<ObjectInfo>> {
    let prefix = normalize_prefix(prefix)?;
    list_all(store, bucket, &prefix).await
}
