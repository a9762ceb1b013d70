//! mv command - Rename files, folders and buckets
//!
//! S3 has no rename. Every item is copied, the copy is verified, and only
//! then is the source deleted. If any copy fails nothing is deleted.

use std::sync::Arc;

use clap::Args;
use s3h_core::{RemotePath, TransferReport};
use serde::Serialize;

use super::{Context, parse_remote};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, ProgressBar};

/// Rename a file, folder or bucket
#[derive(Args, Debug)]
pub struct MvArgs {
    /// Source path (s3://bucket/key, s3://bucket/folder/ or s3://bucket)
    pub source: String,

    /// Destination path in the same bucket, or a new bucket name
    pub target: String,

    /// Treat the source as a folder even without a trailing slash
    #[arg(short, long)]
    pub recursive: bool,
}

#[derive(Debug, Serialize)]
struct MvOutput {
    status: &'static str,
    source: String,
    target: String,
    items: usize,
}

/// Execute the mv command
pub async fn execute(args: MvArgs, ctx: &Context, formatter: &Formatter) -> ExitCode {
    let (source, target) = match (parse_remote(&args.source), parse_remote(&args.target)) {
        (Ok(source), Ok(target)) => (source, target),
        (Err(e), _) | (_, Err(e)) => {
            formatter.error(&e);
            return ExitCode::UsageError;
        }
    };

    if source.is_bucket_root() && target.is_bucket_root() {
        return rename_bucket(ctx, formatter, &source, &target).await;
    }

    if source.bucket != target.bucket {
        formatter.error("Source and target must be in the same bucket, or both be bucket roots");
        return ExitCode::UsageError;
    }

    if args.recursive || source.is_dir {
        return rename_folder(ctx, formatter, &source, &target).await;
    }

    match ctx
        .helper
        .rename_file(&source.bucket, &source.key, &target.key)
        .await
    {
        Ok(()) => report_rename(formatter, &source, &target, 1),
        Err(e) => formatter.fail(&format!("Failed to rename {source}"), &e),
    }
}

async fn rename_folder(
    ctx: &Context,
    formatter: &Formatter,
    source: &RemotePath,
    target: &RemotePath,
) -> ExitCode {
    let progress = Arc::new(ProgressBar::new(formatter.config(), "rename"));
    let options = ctx.batch_options(&progress);
    let result = ctx
        .helper
        .rename_folder(&source.bucket, &source.key, &target.key, &options)
        .await;
    progress.finish_and_clear();
    finish(formatter, source, target, result)
}

async fn rename_bucket(
    ctx: &Context,
    formatter: &Formatter,
    source: &RemotePath,
    target: &RemotePath,
) -> ExitCode {
    let progress = Arc::new(ProgressBar::new(formatter.config(), "rename"));
    let options = ctx.batch_options(&progress);
    let result = ctx
        .helper
        .rename_bucket(&source.bucket, &target.bucket, &options)
        .await;
    progress.finish_and_clear();
    finish(formatter, source, target, result)
}

fn finish(
    formatter: &Formatter,
    source: &RemotePath,
    target: &RemotePath,
    result: s3h_core::Result<TransferReport>,
) -> ExitCode {
    match result {
        Ok(report) => report_rename(formatter, source, target, report.items_done),
        Err(e) => formatter.fail(&format!("Failed to rename {source}"), &e),
    }
}

fn report_rename(
    formatter: &Formatter,
    source: &RemotePath,
    target: &RemotePath,
    items: usize,
) -> ExitCode {
    if formatter.is_json() {
        formatter.json(&MvOutput {
            status: "success",
            source: source.to_string(),
            target: target.to_string(),
            items,
        });
    } else {
        formatter.success(&format!("{source} -> {target} ({items} item(s))"));
    }
    ExitCode::Success
}

#[cfg(test)]
mod tests {
    use s3h_core::MemoryStore;

    use super::*;
    use crate::commands::test_support::{context, quiet};

    fn args(source: &str, target: &str) -> MvArgs {
        MvArgs {
            source: source.into(),
            target: target.into(),
            recursive: false,
        }
    }

    fn store() -> Arc<MemoryStore> {
        let memory = Arc::new(MemoryStore::new().with_bucket("b1"));
        memory.insert("b1", "old/a.txt", "a");
        memory.insert("b1", "old/sub/b.txt", "b");
        memory.insert("b1", "single.txt", "s");
        memory
    }

    #[tokio::test]
    async fn test_mv_folder() {
        let memory = store();
        let code = execute(args("s3://b1/old/", "s3://b1/new/"), &context(&memory), &quiet()).await;
        assert_eq!(code, ExitCode::Success);
        assert!(memory.object("b1", "new/sub/b.txt").is_some());
        assert!(memory.object("b1", "old/a.txt").is_none());
    }

    #[tokio::test]
    async fn test_mv_folder_copy_failure_keeps_source() {
        let memory = store();
        memory.fail_copy("old/sub/b.txt");
        let code = execute(args("s3://b1/old/", "s3://b1/new/"), &context(&memory), &quiet()).await;
        assert_eq!(code, ExitCode::Conflict);
        assert!(memory.object("b1", "old/a.txt").is_some());
        assert!(memory.object("b1", "old/sub/b.txt").is_some());
    }

    #[tokio::test]
    async fn test_mv_file() {
        let memory = store();
        let code = execute(
            args("s3://b1/single.txt", "s3://b1/renamed.txt"),
            &context(&memory),
            &quiet(),
        )
        .await;
        assert_eq!(code, ExitCode::Success);
        assert_eq!(memory.object("b1", "renamed.txt").unwrap(), b"s");
        assert!(memory.object("b1", "single.txt").is_none());
    }

    #[tokio::test]
    async fn test_mv_bucket() {
        let memory = store();
        let code = execute(args("s3://b1", "s3://b1-renamed"), &context(&memory), &quiet()).await;
        assert_eq!(code, ExitCode::Success);
        assert!(!memory.has_bucket("b1"));
        assert!(memory.object("b1-renamed", "old/a.txt").is_some());
    }

    #[tokio::test]
    async fn test_mv_across_buckets_is_usage_error() {
        let memory = store();
        let code = execute(
            args("s3://b1/single.txt", "s3://b2/single.txt"),
            &context(&memory),
            &quiet(),
        )
        .await;
        assert_eq!(code, ExitCode::UsageError);
    }
}
