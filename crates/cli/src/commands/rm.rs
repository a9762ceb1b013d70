//! rm command - Remove files and folders

use clap::Args;
use serde::Serialize;

use super::{Context, parse_remote};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, ProgressBar};

/// Remove a file or folder
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Object or folder path (s3://bucket/key or s3://bucket/folder/)
    pub path: String,

    /// Remove a folder and everything under it
    #[arg(short, long)]
    pub recursive: bool,
}

#[derive(Debug, Serialize)]
struct RmOutput {
    status: &'static str,
    path: String,
    deleted: usize,
}

/// Execute the rm command
pub async fn execute(args: RmArgs, ctx: &Context, formatter: &Formatter) -> ExitCode {
    let remote = match parse_remote(&args.path) {
        Ok(remote) => remote,
        Err(e) => {
            formatter.error(&e);
            return ExitCode::UsageError;
        }
    };

    if remote.is_bucket_root() {
        formatter.error(&format!("'{remote}' is a bucket. Use rb to remove buckets."));
        return ExitCode::UsageError;
    }

    let deleted = if args.recursive || remote.is_dir {
        let progress = std::sync::Arc::new(ProgressBar::new(formatter.config(), "delete"));
        let options = ctx.batch_options(&progress);
        let result = ctx
            .helper
            .delete_folder(&remote.bucket, &remote.key, &options)
            .await;
        progress.finish_and_clear();
        result.map(|report| report.items_done)
    } else {
        ctx.helper
            .delete_file(&remote.bucket, &remote.key)
            .await
            .map(|()| 1)
    };

    match deleted {
        Ok(deleted) => {
            if formatter.is_json() {
                formatter.json(&RmOutput {
                    status: "success",
                    path: remote.to_string(),
                    deleted,
                });
            } else {
                formatter.success(&format!("Removed {remote} ({deleted} object(s))"));
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail(&format!("Failed to remove {remote}"), &e),
    }
}
