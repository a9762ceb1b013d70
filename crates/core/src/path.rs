//! Path parsing and key translation
//!
//! Remote locations are written as `s3://bucket[/key]`; anything else is a
//! local filesystem path. This module also owns the translation between
//! local relative paths and object keys, and the folder-prefix normal form
//! (exactly one trailing `/`).

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// URI scheme that marks a remote path
pub const SCHEME: &str = "s3://";

/// A parsed remote path pointing to an S3 location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePath {
    /// Bucket name
    pub bucket: String,
    /// Object key (empty for bucket root)
    pub key: String,
    /// Whether the path ends with a slash (directory semantics)
    pub is_dir: bool,
}

impl RemotePath {
    /// Create a new RemotePath
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        let key = key.into();
        let is_dir = key.ends_with('/') || key.is_empty();
        Self {
            bucket: bucket.into(),
            key,
            is_dir,
        }
    }

    /// Path to the root of a bucket
    pub fn bucket_root(bucket: impl Into<String>) -> Self {
        Self::new(bucket, "")
    }

    /// Whether this path names a bucket rather than a key inside it
    pub fn is_bucket_root(&self) -> bool {
        self.key.is_empty()
    }

    /// Get the full path as a string (s3://bucket/key)
    pub fn to_full_path(&self) -> String {
        if self.key.is_empty() {
            format!("{SCHEME}{}", self.bucket)
        } else {
            format!("{SCHEME}{}/{}", self.bucket, self.key)
        }
    }

    /// Get the parent path (one level up)
    pub fn parent(&self) -> Option<Self> {
        if self.key.is_empty() {
            return None;
        }
        let key = self.key.trim_end_matches('/');
        let parent_key = match key.rfind('/') {
            Some(pos) => format!("{}/", &key[..pos]),
            None => String::new(),
        };
        Some(Self::new(self.bucket.clone(), parent_key))
    }

    /// Join a child path component
    pub fn join(&self, child: &str) -> Self {
        let base = self.key.trim_end_matches('/');
        let key = if base.is_empty() {
            child.to_string()
        } else {
            format!("{base}/{child}")
        };
        Self::new(self.bucket.clone(), key)
    }
}

impl std::fmt::Display for RemotePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_full_path())
    }
}

/// Parsed path that can be either local or remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedPath {
    /// Local filesystem path
    Local(PathBuf),
    /// Remote S3 path
    Remote(RemotePath),
}

impl ParsedPath {
    /// Check if this is a remote path
    pub fn is_remote(&self) -> bool {
        matches!(self, ParsedPath::Remote(_))
    }

    /// Check if this is a local path
    pub fn is_local(&self) -> bool {
        matches!(self, ParsedPath::Local(_))
    }

    /// Get the remote path if this is a remote path
    pub fn as_remote(&self) -> Option<&RemotePath> {
        match self {
            ParsedPath::Remote(p) => Some(p),
            ParsedPath::Local(_) => None,
        }
    }

    /// Get the local path if this is a local path
    pub fn as_local(&self) -> Option<&PathBuf> {
        match self {
            ParsedPath::Local(p) => Some(p),
            ParsedPath::Remote(_) => None,
        }
    }
}

/// Parse a path string into a ParsedPath
///
/// `s3://bucket[/key]` is remote; everything else is local.
pub fn parse_path(path: &str) -> Result<ParsedPath> {
    if path.is_empty() {
        return Err(Error::InvalidPath("Path cannot be empty".into()));
    }

    let Some(rest) = path.strip_prefix(SCHEME) else {
        return Ok(ParsedPath::Local(PathBuf::from(path)));
    };

    let (bucket, key) = match rest.split_once('/') {
        Some((bucket, key)) => (bucket, key),
        None => (rest, ""),
    };

    if bucket.is_empty() {
        return Err(Error::InvalidPath(format!(
            "Path '{path}' has no bucket. Use format: s3://bucket[/key]"
        )));
    }

    let key = if key.is_empty() {
        String::new()
    } else {
        normalize_key(key)?
    };

    Ok(ParsedPath::Remote(RemotePath::new(bucket, key)))
}

/// Normalize a user-supplied object key
///
/// Leading slashes are dropped and backslashes become `/`. Empty keys and
/// keys containing a `..` segment are rejected.
pub fn normalize_key(key: &str) -> Result<String> {
    let key = key.replace('\\', "/");
    let key = key.trim_start_matches('/');

    if key.is_empty() {
        return Err(Error::InvalidPath("Key cannot be empty".into()));
    }

    if key.split('/').any(|segment| segment == "..") {
        return Err(Error::InvalidPath(format!(
            "Key '{key}' must not contain '..' segments"
        )));
    }

    Ok(key.to_string())
}

/// Normalize a folder prefix so it ends with exactly one `/`
///
/// The bucket root (empty prefix, or only slashes) stays empty.
pub fn normalize_prefix(prefix: &str) -> Result<String> {
    let trimmed = prefix.replace('\\', "/");
    let trimmed = trimmed.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    let key = normalize_key(trimmed)?;
    Ok(format!("{key}/"))
}

/// Validate a bucket name against the S3 naming rules
pub fn validate_bucket_name(name: &str) -> Result<()> {
    if name.len() < 3 || name.len() > 63 {
        return Err(Error::InvalidPath(format!(
            "Bucket name '{name}' must be between 3 and 63 characters"
        )));
    }

    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    let valid_edges = name
        .chars()
        .next()
        .zip(name.chars().last())
        .is_some_and(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric());

    if !valid_chars || !valid_edges || name.contains("..") {
        return Err(Error::InvalidPath(format!(
            "Bucket name '{name}' may only contain lowercase letters, digits, '-' and '.'"
        )));
    }

    Ok(())
}

/// Translate a local file under `root` into a key under `dest_prefix`
pub fn local_to_key(root: &Path, file: &Path, dest_prefix: &str) -> Result<String> {
    let relative = file.strip_prefix(root).map_err(|_| {
        Error::InvalidPath(format!(
            "'{}' is outside of '{}'",
            file.display(),
            root.display()
        ))
    })?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| {
                    Error::InvalidPath(format!("'{}' is not valid UTF-8", file.display()))
                })?;
                segments.push(part);
            }
            Component::CurDir => {}
            _ => {
                return Err(Error::InvalidPath(format!(
                    "'{}' escapes '{}'",
                    file.display(),
                    root.display()
                )));
            }
        }
    }

    if segments.is_empty() {
        return Err(Error::InvalidPath(format!(
            "'{}' has no path relative to its root",
            file.display()
        )));
    }

    let prefix = normalize_prefix(dest_prefix)?;
    Ok(format!("{prefix}{}", segments.join("/")))
}

/// Translate a key under `prefix` into a local path under `root`
///
/// Marker keys (trailing `/`) map to the directory they represent.
pub fn key_to_local(root: &Path, prefix: &str, key: &str) -> Result<PathBuf> {
    let relative = key
        .strip_prefix(prefix)
        .ok_or_else(|| Error::InvalidPath(format!("Key '{key}' is not under '{prefix}'")))?;

    let mut path = root.to_path_buf();
    let mut depth = 0;
    for segment in relative.split('/').filter(|s| !s.is_empty()) {
        if segment == ".." || segment == "." {
            return Err(Error::InvalidPath(format!(
                "Key '{key}' would escape '{}'",
                root.display()
            )));
        }
        path.push(segment);
        depth += 1;
    }

    if depth == 0 {
        return Err(Error::InvalidPath(format!(
            "Key '{key}' has no name below '{prefix}'"
        )));
    }

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_remote_path() {
        let path = parse_path("s3://bucket/file.txt").unwrap();
        assert!(path.is_remote());

        let remote = path.as_remote().unwrap();
        assert_eq!(remote.bucket, "bucket");
        assert_eq!(remote.key, "file.txt");
        assert!(!remote.is_dir);
    }

    #[test]
    fn test_parse_remote_path_dir() {
        let path = parse_path("s3://bucket/dir/").unwrap();
        let remote = path.as_remote().unwrap();
        assert_eq!(remote.key, "dir/");
        assert!(remote.is_dir);
    }

    #[test]
    fn test_parse_remote_path_bucket_only() {
        for input in ["s3://bucket", "s3://bucket/"] {
            let path = parse_path(input).unwrap();
            let remote = path.as_remote().unwrap();
            assert_eq!(remote.bucket, "bucket");
            assert_eq!(remote.key, "");
            assert!(remote.is_bucket_root());
        }
    }

    #[test]
    fn test_parse_remote_path_rejects_escape() {
        assert!(parse_path("s3://bucket/a/../../b").is_err());
        assert!(parse_path("s3:///key").is_err());
    }

    #[test]
    fn test_parse_local_paths() {
        for input in ["/home/user/file.txt", "./file.txt", "../file.txt", "file.txt", "dir/sub"] {
            let path = parse_path(input).unwrap();
            assert!(path.is_local(), "{input} should be local");
        }
    }

    #[test]
    fn test_parse_empty_path() {
        assert!(parse_path("").is_err());
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("/a/b.txt").unwrap(), "a/b.txt");
        assert_eq!(normalize_key("a\\b\\c.txt").unwrap(), "a/b/c.txt");
        assert!(normalize_key("").is_err());
        assert!(normalize_key("/").is_err());
        assert!(normalize_key("a/../b").is_err());
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("").unwrap(), "");
        assert_eq!(normalize_prefix("/").unwrap(), "");
        assert_eq!(normalize_prefix("a").unwrap(), "a/");
        assert_eq!(normalize_prefix("a/").unwrap(), "a/");
        assert_eq!(normalize_prefix("/a/b//").unwrap(), "a/b/");
        assert!(normalize_prefix("a/../").is_err());
    }

    #[test]
    fn test_validate_bucket_name() {
        assert!(validate_bucket_name("my-bucket.01").is_ok());
        assert!(validate_bucket_name("ab").is_err());
        assert!(validate_bucket_name("MyBucket").is_err());
        assert!(validate_bucket_name("-bucket").is_err());
        assert!(validate_bucket_name("bucket-").is_err());
        assert!(validate_bucket_name("my..bucket").is_err());
        assert!(validate_bucket_name(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_local_to_key() {
        let root = Path::new("/data/photos");
        let key = local_to_key(root, Path::new("/data/photos/2024/a.jpg"), "backup").unwrap();
        assert_eq!(key, "backup/2024/a.jpg");

        let key = local_to_key(root, Path::new("/data/photos/a.jpg"), "").unwrap();
        assert_eq!(key, "a.jpg");
    }

    #[test]
    fn test_local_to_key_outside_root() {
        let root = Path::new("/data/photos");
        assert!(local_to_key(root, Path::new("/data/other/a.jpg"), "x/").is_err());
        assert!(local_to_key(root, Path::new("/data/photos/../other/a.jpg"), "x/").is_err());
        assert!(local_to_key(root, root, "x/").is_err());
    }

    #[test]
    fn test_key_to_local() {
        let root = Path::new("/tmp/out");
        let path = key_to_local(root, "dest/", "dest/y/z.txt").unwrap();
        assert_eq!(path, Path::new("/tmp/out/y/z.txt"));

        let path = key_to_local(root, "dest/", "dest/empty/").unwrap();
        assert_eq!(path, Path::new("/tmp/out/empty"));
    }

    #[test]
    fn test_key_to_local_rejects_escape() {
        let root = Path::new("/tmp/out");
        assert!(key_to_local(root, "dest/", "dest/../etc/passwd").is_err());
        assert!(key_to_local(root, "dest/", "other/file").is_err());
        assert!(key_to_local(root, "dest/", "dest/").is_err());
    }

    #[test]
    fn test_key_translation_round_trip() {
        let root = Path::new("/srv/site");
        let file = Path::new("/srv/site/css/main.css");
        let key = local_to_key(root, file, "www/").unwrap();
        assert_eq!(key_to_local(root, "www/", &key).unwrap(), file);
    }

    #[test]
    fn test_remote_path_parent() {
        let path = RemotePath::new("bucket", "a/b/c.txt");
        let parent = path.parent().unwrap();
        assert_eq!(parent.key, "a/b/");

        let parent = parent.parent().unwrap();
        assert_eq!(parent.key, "a/");

        let parent = parent.parent().unwrap();
        assert_eq!(parent.key, "");

        assert!(parent.parent().is_none());
    }

    #[test]
    fn test_remote_path_join() {
        let path = RemotePath::bucket_root("bucket");
        let child = path.join("dir/");
        assert_eq!(child.key, "dir/");
        assert!(child.is_dir);

        let file = child.join("file.txt");
        assert_eq!(file.key, "dir/file.txt");
        assert!(!file.is_dir);
    }

    #[test]
    fn test_remote_path_display() {
        let path = RemotePath::new("bucket", "key/file.txt");
        assert_eq!(path.to_string(), "s3://bucket/key/file.txt");
        assert_eq!(RemotePath::bucket_root("b1").to_string(), "s3://b1");
    }
}
