//! cp command - Copy files and folders
//!
//! Uploads local files and directory trees to S3, and downloads objects and
//! folders back to disk. Folder transfers run concurrently and report every
//! failed item.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use s3h_core::{ParsedPath, ProgressObserver, RemotePath, TransferReport, parse_path};
use serde::Serialize;

use super::Context;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, ProgressBar};

/// Copy files and folders between the local disk and S3
#[derive(Args, Debug)]
pub struct CpArgs {
    /// Source path (local path or s3://bucket/key)
    pub source: String,

    /// Destination path (local path or s3://bucket/key)
    pub target: String,

    /// Copy directories and folders recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Skip local files matching a glob pattern (repeatable)
    #[arg(long, value_name = "PATTERN")]
    pub exclude: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CpOutput {
    status: &'static str,
    source: String,
    target: String,
    items: usize,
    bytes: u64,
}

/// Execute the cp command
pub async fn execute(args: CpArgs, ctx: &Context, formatter: &Formatter) -> ExitCode {
    let source = match parse_path(&args.source) {
        Ok(p) => p,
        Err(e) => {
            formatter.error(&format!("Invalid source path: {e}"));
            return ExitCode::UsageError;
        }
    };

    let target = match parse_path(&args.target) {
        Ok(p) => p,
        Err(e) => {
            formatter.error(&format!("Invalid target path: {e}"));
            return ExitCode::UsageError;
        }
    };

    match (&source, &target) {
        (ParsedPath::Local(src), ParsedPath::Remote(dst)) => {
            upload(ctx, formatter, src, dst, &args).await
        }
        (ParsedPath::Remote(src), ParsedPath::Local(dst)) => {
            download(ctx, formatter, src, dst, &args).await
        }
        (ParsedPath::Remote(_), ParsedPath::Remote(_)) => {
            formatter.error("Copying between remote paths is not supported. Use mv to rename.");
            ExitCode::UsageError
        }
        (ParsedPath::Local(_), ParsedPath::Local(_)) => {
            formatter.error("Cannot copy between two local paths. Use system cp command.");
            ExitCode::UsageError
        }
    }
}

async fn upload(
    ctx: &Context,
    formatter: &Formatter,
    src: &Path,
    dst: &RemotePath,
    args: &CpArgs,
) -> ExitCode {
    let progress = Arc::new(ProgressBar::new(formatter.config(), "upload"));
    let src_display = src.display().to_string();

    if src.is_dir() {
        if !args.recursive {
            formatter.error(&format!(
                "'{src_display}' is a directory. Use -r to copy recursively."
            ));
            return ExitCode::UsageError;
        }

        let options = ctx
            .batch_options(&progress)
            .with_exclude(args.exclude.iter().cloned());
        let result = ctx
            .helper
            .upload_folder(&dst.bucket, src, &dst.key, &options)
            .await;
        progress.finish_and_clear();

        return match result {
            Ok(report) => report_batch(formatter, &src_display, &dst.to_string(), &report),
            Err(e) => formatter.fail(&format!("Failed to upload {src_display}"), &e),
        };
    }

    if !args.exclude.is_empty() {
        formatter.warning("--exclude only applies to recursive copies; ignoring it");
    }

    let key = match upload_key(src, &dst.key) {
        Ok(key) => key,
        Err(e) => {
            formatter.error(&e);
            return ExitCode::UsageError;
        }
    };
    let target = RemotePath::new(dst.bucket.clone(), key);

    let observer: Arc<dyn ProgressObserver> = progress.clone();
    let result = ctx
        .helper
        .upload_file(&target.bucket, src, &target.key, Some(&observer))
        .await;
    progress.finish_and_clear();

    match result {
        Ok(bytes) => report_file(formatter, &src_display, &target.to_string(), bytes),
        Err(e) => formatter.fail(&format!("Failed to upload {src_display}"), &e),
    }
}

async fn download(
    ctx: &Context,
    formatter: &Formatter,
    src: &RemotePath,
    dst: &Path,
    args: &CpArgs,
) -> ExitCode {
    let progress = Arc::new(ProgressBar::new(formatter.config(), "download"));
    let dst_display = dst.display().to_string();

    if args.recursive || src.is_dir {
        let options = ctx.batch_options(&progress);
        let result = ctx
            .helper
            .download_folder(&src.bucket, &src.key, dst, &options)
            .await;
        progress.finish_and_clear();

        return match result {
            Ok(report) => report_batch(formatter, &src.to_string(), &dst_display, &report),
            Err(e) => formatter.fail(&format!("Failed to download {src}"), &e),
        };
    }

    let local = download_target(dst, &src.key);
    let observer: Arc<dyn ProgressObserver> = progress.clone();
    let result = ctx
        .helper
        .download_file(&src.bucket, &src.key, &local, Some(&observer))
        .await;
    progress.finish_and_clear();

    match result {
        Ok(bytes) => report_file(formatter, &src.to_string(), &local.display().to_string(), bytes),
        Err(e) => formatter.fail(&format!("Failed to download {src}"), &e),
    }
}

/// Key for a single uploaded file; a folder-like key receives the file name
fn upload_key(src: &Path, key: &str) -> Result<String, String> {
    if !key.is_empty() && !key.ends_with('/') {
        return Ok(key.to_string());
    }

    let name = src
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| format!("Cannot determine a file name for '{}'", src.display()))?;
    Ok(format!("{key}{name}"))
}

/// Local destination for a single object; an existing directory receives the object's name
fn download_target(dst: &Path, key: &str) -> PathBuf {
    let name = key.rsplit('/').next().unwrap_or(key);
    if dst.is_dir() || dst.to_string_lossy().ends_with(std::path::MAIN_SEPARATOR) {
        dst.join(name)
    } else {
        dst.to_path_buf()
    }
}

fn report_file(formatter: &Formatter, source: &str, target: &str, bytes: u64) -> ExitCode {
    if formatter.is_json() {
        formatter.json(&CpOutput {
            status: "success",
            source: source.to_string(),
            target: target.to_string(),
            items: 1,
            bytes,
        });
    } else {
        let size = humansize::format_size(bytes, humansize::BINARY);
        formatter.success(&format!("{source} -> {target} ({size})"));
    }
    ExitCode::Success
}

fn report_batch(
    formatter: &Formatter,
    source: &str,
    target: &str,
    report: &TransferReport,
) -> ExitCode {
    if formatter.is_json() {
        formatter.json(&CpOutput {
            status: "success",
            source: source.to_string(),
            target: target.to_string(),
            items: report.items_done,
            bytes: report.bytes_done,
        });
    } else {
        let size = humansize::format_size(report.bytes_done, humansize::BINARY);
        formatter.success(&format!(
            "{source} -> {target} ({} item(s), {size})",
            report.items_done
        ));
    }
    ExitCode::Success
}
