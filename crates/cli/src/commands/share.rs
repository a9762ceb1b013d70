//! share command - Generate a presigned download URL

use std::time::Duration;

use clap::Args;
use serde::Serialize;

use super::{Context, parse_remote};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Longest lifetime SigV4 accepts for a presigned URL
const MAX_EXPIRATION_SECS: u64 = 7 * 86_400;

/// Generate a presigned URL for downloading an object
#[derive(Args, Debug)]
pub struct ShareArgs {
    /// Object path (s3://bucket/key)
    pub path: String,

    /// URL lifetime, e.g. 90s, 30m, 12h, 7d (defaults to the configured TTL)
    #[arg(short, long)]
    pub expire: Option<String>,
}

#[derive(Debug, Serialize)]
struct ShareOutput {
    path: String,
    url: String,
    expires_secs: u64,
}

/// Execute the share command
pub async fn execute(args: ShareArgs, ctx: &Context, formatter: &Formatter) -> ExitCode {
    let remote = match parse_remote(&args.path) {
        Ok(remote) if !remote.is_dir => remote,
        Ok(remote) => {
            formatter.error(&format!("'{remote}' is not an object. Only files can be shared."));
            return ExitCode::UsageError;
        }
        Err(e) => {
            formatter.error(&e);
            return ExitCode::UsageError;
        }
    };

    let ttl = match args.expire.as_deref().map(parse_expiration).transpose() {
        Ok(secs) => secs.map(Duration::from_secs),
        Err(e) => {
            formatter.error(&e);
            return ExitCode::UsageError;
        }
    };

    match ctx
        .helper
        .presigned_url(&remote.bucket, &remote.key, ttl)
        .await
    {
        Ok(url) => {
            let expires_secs = ttl.unwrap_or(ctx.helper.config().presign_ttl).as_secs();
            if formatter.is_json() {
                formatter.json(&ShareOutput {
                    path: remote.to_string(),
                    url,
                    expires_secs,
                });
            } else {
                println!("{url}");
                if !formatter.is_quiet() {
                    eprintln!("Expires in {}", format_duration(expires_secs));
                }
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail(&format!("Failed to share {remote}"), &e),
    }
}

/// Parse a lifetime with an optional s/m/h/d/w suffix into seconds
fn parse_expiration(value: &str) -> Result<u64, String> {
    let value = value.trim();
    let (digits, unit) = match value.char_indices().last() {
        None => return Err("Expiration cannot be empty".to_string()),
        Some((idx, c)) if c.is_ascii_alphabetic() => value.split_at(idx),
        Some(_) => (value, "s"),
    };

    let amount: u64 = digits
        .parse()
        .map_err(|_| format!("Invalid expiration '{value}'"))?;
    let scale = match unit.to_ascii_lowercase().as_str() {
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        "w" => 604_800,
        _ => return Err(format!("Unknown expiration unit '{unit}'")),
    };

    let secs = amount
        .checked_mul(scale)
        .filter(|secs| (1..=MAX_EXPIRATION_SECS).contains(secs))
        .ok_or_else(|| format!("Expiration must be between 1 second and 7 days, got '{value}'"))?;
    Ok(secs)
}

fn format_duration(secs: u64) -> String {
    match secs {
        s if s >= 86_400 && s % 86_400 == 0 => format!("{} day(s)", s / 86_400),
        s if s >= 86_400 => format!("{}d {}h", s / 86_400, (s % 86_400) / 3_600),
        s if s >= 3_600 && s % 3_600 == 0 => format!("{} hour(s)", s / 3_600),
        s if s >= 3_600 => format!("{}h {}m", s / 3_600, (s % 3_600) / 60),
        s if s >= 60 => format!("{} minute(s)", s / 60),
        s => format!("{s} second(s)"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use s3h_core::MemoryStore;

    use super::*;
    use crate::commands::test_support::{context, quiet};

    #[test]
    fn test_parse_expiration() {
        assert_eq!(parse_expiration("60").unwrap(), 60);
        assert_eq!(parse_expiration("45s").unwrap(), 45);
        assert_eq!(parse_expiration("5m").unwrap(), 300);
        assert_eq!(parse_expiration("2H").unwrap(), 7_200);
        assert_eq!(parse_expiration("1w").unwrap(), 604_800);
    }

    #[test]
    fn test_parse_expiration_rejects() {
        assert!(parse_expiration("").is_err());
        assert!(parse_expiration("soon").is_err());
        assert!(parse_expiration("3x").is_err());
        assert!(parse_expiration("0").is_err());
        assert!(parse_expiration("8d").is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30), "30 second(s)");
        assert_eq!(format_duration(600), "10 minute(s)");
        assert_eq!(format_duration(3_600), "1 hour(s)");
        assert_eq!(format_duration(5_400), "1h 30m");
        assert_eq!(format_duration(90_000), "1d 1h");
    }

    #[tokio::test]
    async fn test_share_missing_object() {
        let memory = Arc::new(MemoryStore::new().with_bucket("b1"));
        let args = ShareArgs {
            path: "s3://b1/nothing.txt".into(),
            expire: None,
        };
        assert_eq!(execute(args, &context(&memory), &quiet()).await, ExitCode::NotFound);
    }

    #[tokio::test]
    async fn test_share_folder_is_usage_error() {
        let memory = Arc::new(MemoryStore::new().with_bucket("b1"));
        let args = ShareArgs {
            path: "s3://b1/docs/".into(),
            expire: Some("1h".into()),
        };
        assert_eq!(execute(args, &context(&memory), &quiet()).await, ExitCode::UsageError);
    }
}
