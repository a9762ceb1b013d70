//! mb command - Make bucket
//!
//! Creates a new bucket in the configured region.

use clap::Args;
use s3h_core::Error;
use serde::Serialize;

use super::{Context, parse_remote};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Create a bucket
#[derive(Args, Debug)]
pub struct MbArgs {
    /// Bucket path (s3://bucket)
    pub target: String,

    /// Ignore error if bucket already exists
    #[arg(short = 'p', long)]
    pub ignore_existing: bool,
}

#[derive(Debug, Serialize)]
struct MbOutput {
    status: &'static str,
    bucket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

/// Execute the mb command
pub async fn execute(args: MbArgs, ctx: &Context, formatter: &Formatter) -> ExitCode {
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

    let message = match ctx.helper.create_bucket(&bucket).await {
        Ok(()) => None,
        Err(Error::BucketAlreadyExists(_)) if args.ignore_existing => {
            Some("Bucket already exists".to_string())
        }
        Err(e) => return formatter.fail(&format!("Failed to create bucket '{bucket}'"), &e),
    };

    if formatter.is_json() {
        formatter.json(&MbOutput {
            status: "success",
            bucket,
            message,
        });
    } else if message.is_some() {
        formatter.success(&format!("Bucket 's3://{bucket}' already exists."));
    } else {
        formatter.success(&format!("Bucket 's3://{bucket}' created successfully."));
    }
    ExitCode::Success
}
