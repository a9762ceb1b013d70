//! stat command - Show object metadata
//!
//! A path ending in `/` is checked as a folder instead.

use clap::Args;
use comfy_table::{Table, presets};
use s3h_core::ObjectInfo;
use serde::Serialize;

use super::{Context, parse_remote};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Show object metadata
#[derive(Args, Debug)]
pub struct StatArgs {
    /// Object or folder path (s3://bucket/key or s3://bucket/folder/)
    pub path: String,
}

#[derive(Debug, Serialize)]
struct FolderOutput {
    path: String,
    exists: bool,
}

/// Execute the stat command
pub async fn execute(args: StatArgs, ctx: &Context, formatter: &Formatter) -> ExitCode {
    let remote = match parse_remote(&args.path) {
        Ok(remote) => remote,
        Err(e) => {
            formatter.error(&e);
            return ExitCode::UsageError;
        }
    };

    if remote.is_dir {
        return stat_folder(ctx, formatter, &remote.bucket, &remote.key).await;
    }

    match ctx.helper.stat(&remote.bucket, &remote.key).await {
        Ok(info) => {
            if formatter.is_json() {
                formatter.json(&info);
            } else if !formatter.is_quiet() {
                println!("{}", metadata_table(&info));
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail(&format!("Failed to stat {remote}"), &e),
    }
}

async fn stat_folder(ctx: &Context, formatter: &Formatter, bucket: &str, key: &str) -> ExitCode {
    let folder = if key.is_empty() { "/" } else { key };
    let path = format!("s3://{bucket}/{key}");

    match ctx.helper.path_exists(bucket, folder).await {
        Ok(exists) => {
            if formatter.is_json() {
                formatter.json(&FolderOutput { path, exists });
            } else if exists {
                formatter.println(&format!("{path}: folder"));
            } else {
                formatter.error(&format!("Folder not found: {path}"));
            }
            if exists {
                ExitCode::Success
            } else {
                ExitCode::NotFound
            }
        }
        Err(e) => formatter.fail(&format!("Failed to stat {path}"), &e),
    }
}

fn metadata_table(info: &ObjectInfo) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::NOTHING);
    table.add_row(vec!["Key".to_string(), info.key.clone()]);
    table.add_row(vec![
        "Size".to_string(),
        format!(
            "{} ({} bytes)",
            info.size_human.clone().unwrap_or_default(),
            info.size()
        ),
    ]);
    if let Some(modified) = info.last_modified {
        table.add_row(vec![
            "Modified".to_string(),
            modified.strftime("%Y-%m-%d %H:%M:%S UTC").to_string(),
        ]);
    }
    if let Some(etag) = &info.etag {
        table.add_row(vec!["ETag".to_string(), etag.clone()]);
    }
    if let Some(content_type) = &info.content_type {
        table.add_row(vec!["Content-Type".to_string(), content_type.clone()]);
    }
    table
}
