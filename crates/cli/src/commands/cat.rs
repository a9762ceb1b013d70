//! cat command - Display object contents
//!
//! Writes an object's bytes to stdout, or decodes them as text when an
//! encoding is requested.

use std::io::Write;

use clap::Args;

use super::{Context, parse_remote};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Print an object's contents
#[derive(Args, Debug)]
pub struct CatArgs {
    /// Object path (s3://bucket/key)
    pub path: String,

    /// Decode the object as text (utf-8)
    #[arg(long)]
    pub encoding: Option<String>,
}

/// Execute the cat command
pub async fn execute(args: CatArgs, ctx: &Context, formatter: &Formatter) -> ExitCode {
    let remote = match parse_remote(&args.path) {
        Ok(remote) if !remote.is_bucket_root() => remote,
        Ok(_) => {
            formatter.error("cat requires an object key: s3://bucket/key");
            return ExitCode::UsageError;
        }
        Err(e) => {
            formatter.error(&e);
            return ExitCode::UsageError;
        }
    };

    let data = match args.encoding.as_deref() {
        Some(encoding) => ctx
            .helper
            .read_file_string(&remote.bucket, &remote.key, Some(encoding))
            .await
            .map(String::into_bytes),
        None => ctx.helper.read_file(&remote.bucket, &remote.key).await,
    };

    let data = match data {
        Ok(data) => data,
        Err(e) => return formatter.fail(&format!("Failed to read {remote}"), &e),
    };

    let mut stdout = std::io::stdout().lock();
    if let Err(e) = stdout.write_all(&data).and_then(|()| stdout.flush()) {
        formatter.error(&format!("Failed to write to stdout: {e}"));
        return ExitCode::GeneralError;
    }

    ExitCode::Success
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use s3h_core::MemoryStore;

    use super::*;
    use crate::commands::test_support::{context, quiet};

    #[tokio::test]
    async fn test_cat_unsupported_encoding() {
        let memory = Arc::new(MemoryStore::new().with_bucket("b1"));
        memory.insert("b1", "k", "hello");
        let args = CatArgs {
            path: "s3://b1/k".into(),
            encoding: Some("latin-1".into()),
        };
        assert_eq!(execute(args, &context(&memory), &quiet()).await, ExitCode::UsageError);
    }

    #[tokio::test]
    async fn test_cat_missing_object() {
        let memory = Arc::new(MemoryStore::new().with_bucket("b1"));
        let args = CatArgs {
            path: "s3://b1/missing".into(),
            encoding: None,
        };
        assert_eq!(execute(args, &context(&memory), &quiet()).await, ExitCode::NotFound);
    }

    #[tokio::test]
    async fn test_cat_bucket_root_is_usage_error() {
        let memory = Arc::new(MemoryStore::new().with_bucket("b1"));
        let args = CatArgs {
            path: "s3://b1".into(),
            encoding: None,
        };
        assert_eq!(execute(args, &context(&memory), &quiet()).await, ExitCode::UsageError);
    }
}
