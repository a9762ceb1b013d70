//! ls command - List buckets and folders
//!
//! Lists buckets when no path is given, otherwise the immediate folders and
//! files under a prefix. `--recursive` lists every object key instead.

use clap::Args;
use comfy_table::{Table, presets};
use s3h_core::{Listing, ObjectInfo, listing, path::normalize_prefix};
use serde::Serialize;

use super::{Context, parse_remote};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// List buckets or folder contents
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Remote path (s3://bucket[/prefix]); lists buckets when omitted
    pub path: Option<String>,

    /// List every object under the prefix, at any depth
    #[arg(short, long)]
    pub recursive: bool,
}

#[derive(Debug, Serialize)]
struct BucketsOutput {
    buckets: Vec<String>,
}

/// Output structure for a folder listing (JSON format)
#[derive(Debug, Serialize)]
struct LsOutput {
    bucket: String,
    prefix: String,
    folders: Vec<String>,
    files: Vec<String>,
}

impl LsOutput {
    fn new(bucket: &str, prefix: &str, listing: Listing) -> Self {
        Self {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            folders: listing.folders,
            files: listing.files,
        }
    }
}

/// Execute the ls command
pub async fn execute(args: LsArgs, ctx: &Context, formatter: &Formatter) -> ExitCode {
    let Some(path) = args.path else {
        return list_buckets(ctx, formatter).await;
    };

    let remote = match parse_remote(&path) {
        Ok(remote) => remote,
        Err(e) => {
            formatter.error(&e);
            return ExitCode::UsageError;
        }
    };

    let prefix = match normalize_prefix(&remote.key) {
        Ok(prefix) => prefix,
        Err(e) => return formatter.fail("Invalid prefix", &e),
    };

    if args.recursive {
        return list_recursive(ctx, formatter, &remote.bucket, &prefix).await;
    }

    match ctx.helper.list(&remote.bucket, &prefix).await {
        Ok(listing) => {
            let output = LsOutput::new(&remote.bucket, &prefix, listing);
            if formatter.is_json() {
                formatter.json(&output);
            } else {
                for folder in &output.folders {
                    formatter.println(&formatter.folder(folder));
                }
                for file in &output.files {
                    formatter.println(file);
                }
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail(&format!("Failed to list s3://{}/{prefix}", remote.bucket), &e),
    }
}

async fn list_buckets(ctx: &Context, formatter: &Formatter) -> ExitCode {
    match ctx.helper.list_buckets().await {
        Ok(buckets) => {
            if formatter.is_json() {
                formatter.json(&BucketsOutput { buckets });
            } else {
                for bucket in &buckets {
                    formatter.println(&formatter.folder(bucket));
                }
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail("Failed to list buckets", &e),
    }
}

async fn list_recursive(ctx: &Context, formatter: &Formatter, bucket: &str, prefix: &str) -> ExitCode {
    if let Err(e) = ctx.helper.list(bucket, prefix).await {
        return formatter.fail(&format!("Failed to list s3://{bucket}/{prefix}"), &e);
    }

    match listing::list_recursive(ctx.helper.store().as_ref(), bucket, prefix).await {
        Ok(objects) => {
            if formatter.is_json() {
                formatter.json(&objects);
            } else if !formatter.is_quiet() {
                println!("{}", object_table(&objects));
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail(&format!("Failed to list s3://{bucket}/{prefix}"), &e),
    }
}

fn object_table(objects: &[ObjectInfo]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::NOTHING);
    for object in objects {
        let modified = object
            .last_modified
            .map(|ts| ts.strftime("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        table.add_row(vec![
            modified,
            object.size_human.clone().unwrap_or_default(),
            object.key.clone(),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use s3h_core::MemoryStore;

    use super::*;
    use crate::commands::test_support::{context, quiet};

    fn store() -> Arc<MemoryStore> {
        let memory = Arc::new(MemoryStore::new().with_bucket("b1"));
        memory.insert("b1", "f1/k2", "two");
        memory.insert("b1", "f2/", "");
        memory.insert("b1", "k1", "one");
        memory
    }

    #[test]
    fn test_ls_output_json_shape() {
        let listing = Listing {
            folders: vec!["f1".into(), "f2".into()],
            files: vec!["k1".into()],
        };
        insta::assert_json_snapshot!(LsOutput::new("b1", "", listing), @r#"
        {
          "bucket": "b1",
          "prefix": "",
          "folders": [
            "f1",
            "f2"
          ],
          "files": [
            "k1"
          ]
        }
        "#);
    }

    #[test]
    fn test_object_table_rows() {
        let table = object_table(&[ObjectInfo::file("a/1.txt", 2048)]).to_string();
        assert!(table.contains("a/1.txt"));
        assert!(table.contains("2 KiB"));
    }

    #[tokio::test]
    async fn test_ls_bucket_root() {
        let memory = store();
        let args = LsArgs {
            path: Some("s3://b1".into()),
            recursive: false,
        };
        assert_eq!(execute(args, &context(&memory), &quiet()).await, ExitCode::Success);
    }

    #[tokio::test]
    async fn test_ls_missing_bucket() {
        let memory = store();
        let args = LsArgs {
            path: Some("s3://nope/".into()),
            recursive: true,
        };
        assert_eq!(execute(args, &context(&memory), &quiet()).await, ExitCode::NotFound);
    }

    #[tokio::test]
    async fn test_ls_local_path_is_usage_error() {
        let memory = store();
        let args = LsArgs {
            path: Some("./local".into()),
            recursive: false,
        };
        assert_eq!(execute(args, &context(&memory), &quiet()).await, ExitCode::UsageError);
    }

    #[tokio::test]
    async fn test_ls_buckets() {
        let memory = store();
        let args = LsArgs {
            path: None,
            recursive: false,
        };
        assert_eq!(execute(args, &context(&memory), &quiet()).await, ExitCode::Success);
    }
}
