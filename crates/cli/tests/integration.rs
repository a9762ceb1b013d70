//! Integration tests for the s3h CLI
//!
//! These tests require a running S3-compatible server.
//!
//! Run with:
//! ```bash
//! # Start RustFS container
//! docker run -d --name rustfs -p 9000:9000 \
//!     -e RUSTFS_ACCESS_KEY=accesskey \
//!     -e RUSTFS_SECRET_KEY=secretkey \
//!     rustfs/rustfs:latest
//!
//! # Run tests
//! TEST_S3_ENDPOINT=http://localhost:9000 \
//! TEST_S3_ACCESS_KEY=accesskey TEST_S3_SECRET_KEY=secretkey \
//!     cargo test --features integration
//! ```

#![cfg(feature = "integration")]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::Duration;

use tempfile::TempDir;

/// Get the path to the s3h binary
fn s3h_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_s3h"))
}

/// Get S3 test configuration from environment
fn get_test_config() -> Option<(String, String, String)> {
    let endpoint = std::env::var("TEST_S3_ENDPOINT").ok()?;
    let access_key = std::env::var("TEST_S3_ACCESS_KEY").ok()?;
    let secret_key = std::env::var("TEST_S3_SECRET_KEY").ok()?;
    Some((endpoint, access_key, secret_key))
}

/// Isolated config file pointing at the test server
struct TestEnv {
    dir: TempDir,
    config: PathBuf,
}

impl TestEnv {
    fn new() -> Option<Self> {
        let (endpoint, access_key, secret_key) = get_test_config()?;
        let dir = tempfile::tempdir().ok()?;
        let config = dir.path().join("config.toml");
        let contents = format!(
            "schema_version = 1\n\n[credentials]\naccess_key_id = \"{access_key}\"\n\
             secret_access_key = \"{secret_key}\"\nendpoint = \"{endpoint}\"\n\
             force_path_style = true\n"
        );
        std::fs::write(&config, contents).ok()?;

        let env = Self { dir, config };
        if !env.wait_ready() {
            eprintln!("S3 service did not become ready in time");
            return None;
        }
        Some(env)
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(s3h_binary())
            .arg("--config")
            .arg(&self.config)
            .arg("--no-progress")
            .args(args)
            .env_remove("AWS_ACCESS_KEY_ID")
            .env_remove("AWS_SECRET_ACCESS_KEY")
            .env_remove("S3H_ENDPOINT")
            .output()
            .expect("Failed to execute s3h command")
    }

    fn wait_ready(&self) -> bool {
        for _ in 0..30 {
            if self.run(&["ls", "--json"]).status.success() {
                return true;
            }
            std::thread::sleep(Duration::from_secs(1));
        }
        false
    }

    fn workdir(&self) -> &Path {
        self.dir.path()
    }

    /// Create a uniquely named bucket
    fn bucket(&self, label: &str) -> Option<String> {
        let bucket = format!("test-{label}-{}", uuid_suffix());
        let output = self.run(&["mb", &format!("s3://{bucket}")]);
        if !output.status.success() {
            eprintln!(
                "Failed to create bucket: {}",
                String::from_utf8_lossy(&output.stderr)
            );
            return None;
        }
        Some(bucket)
    }

    /// Delete a bucket and everything in it
    fn cleanup(&self, bucket: &str) {
        let _ = self.run(&["rb", "--force", &format!("s3://{bucket}")]);
    }
}

/// Generate unique suffix for test resources
fn uuid_suffix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{:x}", duration.as_nanos() % 0xFFFFFFFF)
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

macro_rules! setup {
    () => {
        match TestEnv::new() {
            Some(env) => env,
            None => {
                eprintln!("Skipping: S3 test config not available");
                return;
            }
        }
    };
}

mod bucket_operations {
    use super::*;

    #[test]
    fn test_create_list_and_delete_bucket() {
        let env = setup!();
        let bucket = env.bucket("mb").expect("create bucket");

        let output = env.run(&["ls", "--json"]);
        assert!(output.status.success());
        let buckets = stdout_json(&output)["buckets"].clone();
        assert!(
            buckets
                .as_array()
                .unwrap()
                .iter()
                .any(|b| b == bucket.as_str())
        );

        let output = env.run(&["mb", &format!("s3://{bucket}")]);
        assert_eq!(output.status.code(), Some(6), "duplicate bucket is a conflict");

        let output = env.run(&["rb", &format!("s3://{bucket}")]);
        assert!(
            output.status.success(),
            "Failed to delete bucket: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    #[test]
    fn test_delete_non_empty_bucket_fails() {
        let env = setup!();
        let bucket = env.bucket("nonempty").expect("create bucket");
        let file = env.workdir().join("a.txt");
        std::fs::write(&file, "data").unwrap();
        let output = env.run(&["cp", file.to_str().unwrap(), &format!("s3://{bucket}/a.txt")]);
        assert!(output.status.success());

        let output = env.run(&["rb", &format!("s3://{bucket}")]);
        assert_eq!(output.status.code(), Some(6));

        env.cleanup(&bucket);
    }
}

mod folder_operations {
    use super::*;

    fn local_tree(root: &Path) {
        std::fs::create_dir_all(root.join("y")).unwrap();
        std::fs::create_dir_all(root.join("empty")).unwrap();
        std::fs::write(root.join("x.txt"), "0123456789").unwrap();
        std::fs::write(root.join("y").join("z.txt"), "01234567890123456789").unwrap();
    }

    #[test]
    fn test_upload_list_download_folder() {
        let env = setup!();
        let bucket = env.bucket("folders").expect("create bucket");
        let src = env.workdir().join("src");
        local_tree(&src);

        let output = env.run(&[
            "cp",
            "-r",
            src.to_str().unwrap(),
            &format!("s3://{bucket}/data/"),
            "--json",
        ]);
        assert!(
            output.status.success(),
            "upload failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        assert_eq!(stdout_json(&output)["bytes"], 30);

        let output = env.run(&["ls", &format!("s3://{bucket}/data/"), "--json"]);
        assert!(output.status.success());
        let listing = stdout_json(&output);
        assert_eq!(listing["folders"], serde_json::json!(["empty", "y"]));
        assert_eq!(listing["files"], serde_json::json!(["x.txt"]));

        let dst = env.workdir().join("dst");
        let output = env.run(&["cp", &format!("s3://{bucket}/data/"), dst.to_str().unwrap()]);
        assert!(output.status.success());
        assert_eq!(
            std::fs::read_to_string(dst.join("y").join("z.txt")).unwrap(),
            "01234567890123456789"
        );
        assert!(dst.join("empty").is_dir());

        env.cleanup(&bucket);
    }

    #[test]
    fn test_rename_folder() {
        let env = setup!();
        let bucket = env.bucket("rename").expect("create bucket");
        let src = env.workdir().join("src");
        local_tree(&src);
        let output = env.run(&["cp", "-r", src.to_str().unwrap(), &format!("s3://{bucket}/old/")]);
        assert!(output.status.success());

        let output = env.run(&[
            "mv",
            &format!("s3://{bucket}/old/"),
            &format!("s3://{bucket}/new/"),
        ]);
        assert!(
            output.status.success(),
            "rename failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );

        let output = env.run(&["stat", &format!("s3://{bucket}/old/")]);
        assert_eq!(output.status.code(), Some(5));
        let output = env.run(&["stat", &format!("s3://{bucket}/new/y/z.txt"), "--json"]);
        assert!(output.status.success());
        assert_eq!(stdout_json(&output)["size_bytes"], 20);

        env.cleanup(&bucket);
    }

    #[test]
    fn test_remove_folder() {
        let env = setup!();
        let bucket = env.bucket("rm").expect("create bucket");
        let src = env.workdir().join("src");
        local_tree(&src);
        let output = env.run(&["cp", "-r", src.to_str().unwrap(), &format!("s3://{bucket}/data/")]);
        assert!(output.status.success());

        let output = env.run(&["rm", "-r", &format!("s3://{bucket}/data/")]);
        assert!(output.status.success());

        let output = env.run(&["ls", &format!("s3://{bucket}/"), "--json"]);
        assert!(output.status.success());
        assert_eq!(stdout_json(&output)["folders"], serde_json::json!([]));

        env.cleanup(&bucket);
    }
}

mod object_operations {
    use super::*;

    #[test]
    fn test_cat_and_share() {
        let env = setup!();
        let bucket = env.bucket("objects").expect("create bucket");
        let file = env.workdir().join("hello.txt");
        std::fs::write(&file, "hello world").unwrap();
        let output = env.run(&["cp", file.to_str().unwrap(), &format!("s3://{bucket}/")]);
        assert!(output.status.success());

        let output = env.run(&["cat", &format!("s3://{bucket}/hello.txt")]);
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout), "hello world");

        let output = env.run(&[
            "share",
            &format!("s3://{bucket}/hello.txt"),
            "--expire",
            "10m",
            "--json",
        ]);
        assert!(output.status.success());
        let share = stdout_json(&output);
        assert_eq!(share["expires_secs"], 600);
        assert!(share["url"].as_str().unwrap().contains("X-Amz-Signature"));

        env.cleanup(&bucket);
    }

    #[test]
    fn test_missing_object_exit_code() {
        let env = setup!();
        let bucket = env.bucket("missing").expect("create bucket");

        let output = env.run(&["cat", &format!("s3://{bucket}/nope.txt")]);
        assert_eq!(output.status.code(), Some(5));

        let output = env.run(&["stat", "s3://s3h-bucket-that-does-not-exist/key"]);
        assert_eq!(output.status.code(), Some(5));

        env.cleanup(&bucket);
    }
}
