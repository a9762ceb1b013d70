//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from s3h-core.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::debug;

use s3h_core::config::{Credentials, DEFAULT_REGION};
use s3h_core::{Error, ListOptions, ListResult, ObjectInfo, ObjectStore, RemotePath, Result};

/// Characters left as-is in a copy source; `/` separates key segments
const COPY_SOURCE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// S3 client wrapper
pub struct S3Client {
    inner: aws_sdk_s3::Client,
    region: String,
}

impl S3Client {
    /// Create a new S3 client
    ///
    /// Static keys are used when configured; otherwise the SDK's default
    /// provider chain (environment, profile, instance metadata) applies.
    pub async fn new(credentials: &Credentials) -> Result<Self> {
        let region = credentials.region.clone();
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.clone()));

        if let (Some(access_key), Some(secret_key)) =
            (&credentials.access_key_id, &credentials.secret_access_key)
        {
            loader = loader.credentials_provider(aws_credential_types::Credentials::new(
                access_key,
                secret_key,
                None, // session token
                None, // expiry
                "s3h-static-credentials",
            ));
        }

        if let Some(endpoint) = &credentials.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let config = loader.load().await;

        // Custom endpoints are almost always S3-compatible servers without
        // virtual-host bucket routing.
        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(credentials.force_path_style || credentials.endpoint.is_some())
            .build();

        debug!(region = %region, endpoint = ?credentials.endpoint, "s3 client configured");

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
            region,
        })
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }
}

/// Map an SDK failure onto the helper's error kinds
///
/// `object` is the key the request was about, if any; a bare 404 without
/// one means the bucket is missing. Only throttling, 5xx and failures with
/// no response are transient; other client errors are permanent.
fn map_error<E>(err: SdkError<E, HttpResponse>, bucket: &str, object: Option<&RemotePath>) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let status = match &err {
        SdkError::ServiceError(context) => Some(context.raw().status().as_u16()),
        SdkError::ResponseError(context) => Some(context.raw().status().as_u16()),
        _ => None,
    };
    let code = err.code().map(str::to_string);
    let detail = DisplayErrorContext(&err).to_string();
    classify(code.as_deref(), status, bucket, object, detail)
}

fn classify(
    code: Option<&str>,
    status: Option<u16>,
    bucket: &str,
    object: Option<&RemotePath>,
    detail: String,
) -> Error {
    match (code, status) {
        (Some("NoSuchBucket"), _) => Error::BucketNotFound(bucket.to_string()),
        (Some("NoSuchKey" | "NotFound"), _) | (_, Some(404)) => match object {
            Some(path) => Error::ObjectNotFound(path.to_string()),
            None => Error::BucketNotFound(bucket.to_string()),
        },
        (
            Some(
                "AccessDenied" | "AllAccessDisabled" | "InvalidAccessKeyId"
                | "SignatureDoesNotMatch" | "Forbidden",
            ),
            _,
        )
        | (_, Some(403)) => Error::PermissionDenied(detail),
        (Some("BucketAlreadyExists" | "BucketAlreadyOwnedByYou"), _) => {
            Error::BucketAlreadyExists(bucket.to_string())
        }
        (Some("BucketNotEmpty"), _) => Error::NonEmptyBucket(bucket.to_string()),
        (
            Some(
                "SlowDown" | "RequestTimeout" | "RequestTimeTooSkewed" | "Throttling"
                | "ThrottlingException" | "InternalError" | "ServiceUnavailable",
            ),
            _,
        )
        | (_, None)
        | (_, Some(500..=599)) => Error::TransientStoreError(detail),
        (Some("InvalidBucketName" | "KeyTooLongError" | "InvalidObjectName"), _) => {
            Error::InvalidPath(detail)
        }
        _ => Error::General(detail),
    }
}

fn to_timestamp(value: &aws_smithy_types::DateTime) -> Option<jiff::Timestamp> {
    jiff::Timestamp::new(value.secs(), value.subsec_nanos() as i32).ok()
}

fn copy_source(path: &RemotePath) -> String {
    format!(
        "{}/{}",
        path.bucket,
        utf8_percent_encode(&path.key, COPY_SOURCE_SET)
    )
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn list_buckets(&self) -> Result<Vec<ObjectInfo>> {
        let response = self
            .inner
            .list_buckets()
            .send()
            .await
            .map_err(|e| map_error(e, "", None))?;

        let buckets = response
            .buckets()
            .iter()
            .map(|b| {
                let mut info = ObjectInfo::bucket(b.name().unwrap_or_default());
                info.last_modified = b.creation_date().and_then(to_timestamp);
                info
            })
            .collect();

        Ok(buckets)
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.inner.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => match map_error(e, bucket, None) {
                Error::BucketNotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let mut request = self.inner.create_bucket().bucket(bucket);

        // us-east-1 rejects an explicit location constraint
        if self.region != DEFAULT_REGION {
            let configuration = CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                .build();
            request = request.create_bucket_configuration(configuration);
        }

        request
            .send()
            .await
            .map_err(|e| map_error(e, bucket, None))?;

        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.inner
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| map_error(e, bucket, None))?;

        Ok(())
    }

    async fn list_objects(&self, bucket: &str, options: ListOptions) -> Result<ListResult> {
        let response = self
            .inner
            .list_objects_v2()
            .bucket(bucket)
            .set_prefix(options.prefix)
            .set_continuation_token(options.continuation_token)
            .set_max_keys(options.max_keys)
            .send()
            .await
            .map_err(|e| map_error(e, bucket, None))?;

        let items = response
            .contents()
            .iter()
            .map(|object| {
                let mut info =
                    ObjectInfo::file(object.key().unwrap_or_default(), object.size().unwrap_or(0));
                info.last_modified = object.last_modified().and_then(to_timestamp);
                info.etag = object.e_tag().map(|etag| etag.trim_matches('"').to_string());
                info
            })
            .collect();

        Ok(ListResult {
            items,
            truncated: response.is_truncated().unwrap_or(false),
            continuation_token: response.next_continuation_token().map(|s| s.to_string()),
        })
    }

    async fn head_object(&self, path: &RemotePath) -> Result<ObjectInfo> {
        let response = self
            .inner
            .head_object()
            .bucket(&path.bucket)
            .key(&path.key)
            .send()
            .await
            .map_err(|e| map_error(e, &path.bucket, Some(path)))?;

        let mut info = ObjectInfo::file(&path.key, response.content_length().unwrap_or(0));
        info.last_modified = response.last_modified().and_then(to_timestamp);
        info.etag = response.e_tag().map(|etag| etag.trim_matches('"').to_string());
        info.content_type = response.content_type().map(|ct| ct.to_string());

        Ok(info)
    }

    async fn get_object(&self, path: &RemotePath) -> Result<Vec<u8>> {
        let response = self
            .inner
            .get_object()
            .bucket(&path.bucket)
            .key(&path.key)
            .send()
            .await
            .map_err(|e| map_error(e, &path.bucket, Some(path)))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| Error::TransientStoreError(format!("reading {path}: {e}")))?
            .into_bytes()
            .to_vec();

        Ok(data)
    }

    async fn put_object(
        &self,
        path: &RemotePath,
        data: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<ObjectInfo> {
        let size = data.len() as i64;
        let body = aws_sdk_s3::primitives::ByteStream::from(data);

        let response = self
            .inner
            .put_object()
            .bucket(&path.bucket)
            .key(&path.key)
            .body(body)
            .set_content_type(content_type.clone())
            .send()
            .await
            .map_err(|e| map_error(e, &path.bucket, None))?;

        let mut info = ObjectInfo::file(&path.key, size);
        info.etag = response.e_tag().map(|etag| etag.trim_matches('"').to_string());
        info.content_type = content_type;
        info.last_modified = Some(jiff::Timestamp::now());

        Ok(info)
    }

    async fn delete_object(&self, path: &RemotePath) -> Result<()> {
        // S3 answers 204 for missing keys, so not-found only means the bucket
        self.inner
            .delete_object()
            .bucket(&path.bucket)
            .key(&path.key)
            .send()
            .await
            .map_err(|e| map_error(e, &path.bucket, None))?;

        Ok(())
    }

    async fn copy_object(&self, src: &RemotePath, dst: &RemotePath) -> Result<ObjectInfo> {
        let response = self
            .inner
            .copy_object()
            .copy_source(copy_source(src))
            .bucket(&dst.bucket)
            .key(&dst.key)
            .send()
            .await
            .map_err(|e| map_error(e, &dst.bucket, Some(src)))?;

        // Copy does not report the size
        let mut info = self.head_object(dst).await?;
        if let Some(result) = response.copy_object_result()
            && let Some(etag) = result.e_tag()
        {
            info.etag = Some(etag.trim_matches('"').to_string());
        }

        Ok(info)
    }

    async fn presign_get(&self, path: &RemotePath, expires: Duration) -> Result<String> {
        let config = aws_sdk_s3::presigning::PresigningConfig::builder()
            .expires_in(expires)
            .build()
            .map_err(|e| Error::General(format!("presign config: {e}")))?;

        let request = self
            .inner
            .get_object()
            .bucket(&path.bucket)
            .key(&path.key)
            .presigned(config)
            .await
            .map_err(|e| map_error(e, &path.bucket, Some(path)))?;

        Ok(request.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail() -> String {
        "service error".to_string()
    }

    #[test]
    fn test_classify_not_found() {
        let path = RemotePath::new("b1", "k");
        assert!(matches!(
            classify(Some("NoSuchBucket"), Some(404), "b1", Some(&path), detail()),
            Error::BucketNotFound(_)
        ));
        assert!(matches!(
            classify(Some("NoSuchKey"), Some(404), "b1", Some(&path), detail()),
            Error::ObjectNotFound(_)
        ));
        assert!(matches!(
            classify(None, Some(404), "b1", Some(&path), detail()),
            Error::ObjectNotFound(_)
        ));
        assert!(matches!(
            classify(Some("NotFound"), Some(404), "b1", None, detail()),
            Error::BucketNotFound(_)
        ));
    }

    #[test]
    fn test_classify_conflicts_and_permissions() {
        assert!(matches!(
            classify(Some("AccessDenied"), Some(403), "b1", None, detail()),
            Error::PermissionDenied(_)
        ));
        assert!(matches!(
            classify(None, Some(403), "b1", None, detail()),
            Error::PermissionDenied(_)
        ));
        assert!(matches!(
            classify(Some("BucketAlreadyOwnedByYou"), Some(409), "b1", None, detail()),
            Error::BucketAlreadyExists(_)
        ));
        assert!(matches!(
            classify(Some("BucketNotEmpty"), Some(409), "b1", None, detail()),
            Error::NonEmptyBucket(_)
        ));
    }

    #[test]
    fn test_classify_transient_failures() {
        let err = classify(Some("SlowDown"), Some(503), "b1", None, detail());
        assert!(err.is_retryable());
        let err = classify(Some("RequestTimeout"), Some(400), "b1", None, detail());
        assert!(err.is_retryable());
        let err = classify(None, Some(502), "b1", None, detail());
        assert!(err.is_retryable());
        let err = classify(None, None, "b1", None, "dispatch failure".into());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_classify_client_errors_are_permanent() {
        for code in [
            "InvalidArgument",
            "InvalidBucketName",
            "IllegalLocationConstraintException",
            "MalformedXML",
        ] {
            let err = classify(Some(code), Some(400), "b1", None, detail());
            assert!(!err.is_retryable(), "{code} should not be retryable");
            assert_ne!(err.exit_code(), 3, "{code} should not exit as a network error");
        }
        assert!(matches!(
            classify(Some("InvalidBucketName"), Some(400), "b1", None, detail()),
            Error::InvalidPath(_)
        ));
        assert!(matches!(
            classify(None, Some(400), "b1", None, detail()),
            Error::General(_)
        ));
    }

    #[test]
    fn test_copy_source_encoding() {
        let path = RemotePath::new("photos", "2024/summer trip/ä+b.jpg");
        assert_eq!(
            copy_source(&path),
            "photos/2024/summer%20trip/%C3%A4%2Bb.jpg"
        );
    }
}
