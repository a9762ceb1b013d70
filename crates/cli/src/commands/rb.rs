//! rb command - Remove bucket
//!
//! Only empty buckets are removed; `--force` deletes the contents first.

use clap::Args;
use serde::Serialize;

use super::{Context, parse_remote};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, ProgressBar};

/// Remove a bucket
#[derive(Args, Debug)]
pub struct RbArgs {
    /// Bucket path (s3://bucket)
    pub target: String,

    /// Delete every object in the bucket first
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
struct RbOutput {
    status: &'static str,
    bucket: String,
}

/// Execute the rb command
pub async fn execute(args: RbArgs, ctx: &Context, formatter: &Formatter) -> ExitCode {
    let bucket = match parse_remote(&args.target) {
        Ok(remote) if remote.is_bucket_root() => remote.bucket,
        Ok(remote) => {
            formatter.error(&format!("'{remote}' is not a bucket path. Expected: s3://bucket"));
            return ExitCode::UsageError;
        }
        Err(e) => {
            formatter.error(&e);
            return ExitCode::UsageError;
        }
    };

    if args.force {
        let progress = std::sync::Arc::new(ProgressBar::new(formatter.config(), "delete"));
        let options = ctx.batch_options(&progress);
        let result = s3h_core::transfer::delete_prefix(ctx.helper.store(), &bucket, "", &options)
            .await
            .and_then(|report| report.into_result());
        progress.finish_and_clear();
        if let Err(e) = result {
            return formatter.fail(&format!("Failed to empty bucket '{bucket}'"), &e);
        }
    }

    match ctx.helper.delete_bucket(&bucket).await {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&RbOutput {
                    status: "success",
                    bucket,
                });
            } else {
                formatter.success(&format!("Bucket 's3://{bucket}' removed successfully."));
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail(&format!("Failed to remove bucket '{bucket}'"), &e),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use s3h_core::MemoryStore;

    use super::*;
    use crate::commands::test_support::{context, quiet};

    fn args(target: &str, force: bool) -> RbArgs {
        RbArgs {
            target: target.into(),
            force,
        }
    }

    #[tokio::test]
    async fn test_rb_non_empty_bucket() {
        let memory = Arc::new(MemoryStore::new().with_bucket("b1"));
        memory.insert("b1", "k", "v");
        let code = execute(args("s3://b1", false), &context(&memory), &quiet()).await;
        assert_eq!(code, ExitCode::Conflict);
        assert!(memory.has_bucket("b1"));
    }

    #[tokio::test]
    async fn test_rb_force_empties_bucket() {
        let memory = Arc::new(MemoryStore::new().with_bucket("b1"));
        memory.insert("b1", "a/k", "v");
        let code = execute(args("s3://b1", true), &context(&memory), &quiet()).await;
        assert_eq!(code, ExitCode::Success);
        assert!(!memory.has_bucket("b1"));
    }

    #[tokio::test]
    async fn test_rb_missing_bucket() {
        let memory = Arc::new(MemoryStore::new());
        let code = execute(args("s3://b1", false), &context(&memory), &quiet()).await;
        assert_eq!(code, ExitCode::NotFound);
    }
}
