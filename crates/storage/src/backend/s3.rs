//! S3-compatible object store.
//!
//! Works with AWS S3 and the S3-compatible services repositories are usually
//! served from (MinIO, Ceph RGW, Backblaze B2, ...).
//!
//! # Credentials
//!
//! Credentials are provided explicitly via the configuration file, and are
//! the same ones handed to `mkrepo` when regenerating metadata.

use crate::error::{ErrorKind, Result};
use crate::key::{validate as validate_key, validate_prefix};
use crate::{Listing, ObjectStore};
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, retry::RetryConfig},
    error::{DisplayErrorContext, SdkError},
    primitives::ByteStream,
    types::ObjectCannedAcl,
};
use exn::ResultExt;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::instrument;

/// Generous default for concurrent S3 requests.
const DEFAULT_CONCURRENT_REQUESTS: usize = 100;

/// S3-compatible object store.
///
/// # Examples
///
/// ```no_run
/// use pkgrepo_storage::backend::S3Backend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = S3Backend::new(
///     "repos",
///     "packages",
///     "us-east-1",
///     Some("https://s3.example.com"),
///     "access_key_id",
///     "secret_access_key",
/// )?
/// .with_public_read(true);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Backend {
    name: String,
    client: Client,
    bucket: String,
    /// Written objects get the `public-read` canned ACL.
    public_read: bool,
    /// Rate limiter for concurrent S3 requests.
    rate_limiter: Arc<Semaphore>,
}

impl S3Backend {
    /// Create a new S3 object store.
    ///
    /// # Arguments
    /// * `name` - A name for this store (used in logging)
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region or provider-specific region
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `key_id` - Access key ID
    /// * `key_secret` - Secret access key
    pub fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Result<Self> {
        let bucket = bucket.into();
        if bucket.is_empty() || bucket.contains('/') {
            exn::bail!(ErrorKind::BackendError(format!("invalid bucket name: {bucket:?}")));
        }
        let credentials = Credentials::new(key_id, key_secret, None, None, "pkgrepo-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region.into()))
            // Exponential backoff: 1 initial attempt + 3 retries.
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            // Path-style addressing for S3-compatible services; `mkrepo`
            // addresses the bucket the same way.
            .force_path_style(true);
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Ok(Self {
            name: name.into(),
            client: Client::from_conf(config_builder.build()),
            bucket,
            public_read: false,
            rate_limiter: Arc::new(Semaphore::new(DEFAULT_CONCURRENT_REQUESTS)),
        })
    }

    pub fn with_public_read(mut self, public_read: bool) -> Self {
        self.public_read = public_read;
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn acl(&self) -> Option<ObjectCannedAcl> {
        self.public_read.then_some(ObjectCannedAcl::PublicRead)
    }

    /// Acquire a rate limiter permit before making an S3 API call.
    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit> {
        self.rate_limiter
            .clone()
            .acquire_owned()
            .await
            .or_raise(|| ErrorKind::BackendError("request limiter closed".to_string()))
    }

    fn is_not_found<E>(err: &SdkError<E>) -> bool {
        matches!(err, SdkError::ServiceError(service_err) if service_err.raw().status().as_u16() == 404)
    }

    /// Maps an SDK error, turning HTTP 404 into [`ErrorKind::NotFound`].
    fn map_sdk_error<E>(err: SdkError<E>, key: &str) -> ErrorKind
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        if Self::is_not_found(&err) {
            return ErrorKind::NotFound(key.to_string());
        }
        match &err {
            SdkError::ServiceError(service_err) if service_err.raw().status().as_u16() == 403 => {
                ErrorKind::PermissionDenied(key.to_string())
            },
            SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
                ErrorKind::Network(DisplayErrorContext(&err).to_string())
            },
            _ => ErrorKind::BackendError(DisplayErrorContext(&err).to_string()),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Backend {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, data), fields(backend = "s3", bytes = data.len()))]
    async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let key = validate_key(key)?;
        let _permit = self.acquire_permit().await?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .set_acl(self.acl())
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, &key))?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn copy(&self, source: &str, destination: &str) -> Result<()> {
        let source = validate_key(source)?;
        let destination = validate_key(destination)?;
        // CopySource is `bucket/key` with the key URL-encoded.
        let copy_source = format!("{}/{}", self.bucket, utf8_percent_encode(&source, NON_ALPHANUMERIC));
        let _permit = self.acquire_permit().await?;
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .key(&destination)
            .copy_source(copy_source)
            .set_acl(self.acl())
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, &source))?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn list(&self, prefix: &str, delimiter: Option<&str>) -> Result<Listing> {
        let prefix = validate_prefix(prefix)?;
        let mut listing = Listing::default();
        let mut continuation_token: Option<String> = None;
        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&prefix)
                .set_delimiter(delimiter.map(ToString::to_string));
            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }
            let output = {
                let _permit = self.acquire_permit().await?;
                request.send().await.map_err(|e| Self::map_sdk_error(e, &prefix))?
            };
            listing.prefixes.extend(output.common_prefixes().iter().filter_map(|p| p.prefix()).map(ToString::to_string));
            listing.objects.extend(output.contents().iter().filter_map(|o| o.key()).map(ToString::to_string));
            match output.is_truncated() {
                Some(true) => continuation_token = output.next_continuation_token().map(ToString::to_string),
                _ => break,
            }
            if continuation_token.is_none() {
                break;
            }
        }
        Ok(listing)
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn exists(&self, key: &str) -> Result<bool> {
        let key = validate_key(key)?;
        let _permit = self.acquire_permit().await?;
        match self.client.head_object().bucket(&self.bucket).key(&key).send().await {
            Ok(_) => Ok(true),
            Err(err) if Self::is_not_found(&err) => Ok(false),
            Err(err) => exn::bail!(Self::map_sdk_error(err, &key)),
        }
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let key = validate_key(key)?;
        let _permit = self.acquire_permit().await?;
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, &key))?;
        let data = output
            .body
            .collect()
            .await
            .or_raise(|| ErrorKind::Network(format!("failed reading body of {key}")))?;
        Ok(data.into_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> S3Backend {
        S3Backend::new("test", "packages", "us-east-1", Some("http://localhost:9000"), "id", "secret").unwrap()
    }

    #[test]
    fn test_public_read_acl() {
        assert_eq!(backend().acl(), None);
        assert_eq!(backend().with_public_read(true).acl(), Some(ObjectCannedAcl::PublicRead));
    }

    #[test]
    fn test_invalid_bucket() {
        let err = S3Backend::new("test", "a/b", "us-east-1", None::<String>, "id", "secret").unwrap_err();
        assert!(matches!(&*err, ErrorKind::BackendError(_)));
        assert!(S3Backend::new("test", "", "us-east-1", None::<String>, "id", "secret").is_err());
    }

    #[test]
    fn test_copy_source_encoding() {
        let encoded = utf8_percent_encode("live/1.10/ubuntu/pool/a b+c.deb", NON_ALPHANUMERIC).to_string();
        assert_eq!(encoded, "live%2F1%2E10%2Fubuntu%2Fpool%2Fa%20b%2Bc%2Edeb");
    }
}
