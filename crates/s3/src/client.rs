//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the StorageBackend trait from sitepush-core.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;

use sitepush_core::{BucketConfig, Error, Result, StorageBackend, UploadOption};

/// S3 client bound to one bucket
pub struct S3Client {
    inner: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Client {
    /// Create a new S3 client from the bucket configuration
    pub async fn new(config: &BucketConfig) -> Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));

        if let Some((access_key, secret_key)) = config.credentials() {
            let credentials = aws_credential_types::Credentials::new(
                access_key,
                secret_key,
                None, // session token
                None, // expiry
                "sitepush-static-credentials",
            );
            loader = loader.credentials_provider(credentials);
        }

        if !config.endpoint.is_empty() {
            loader = loader.endpoint_url(&config.endpoint);
        }

        let sdk_config = loader.load().await;

        // Path-style addressing unless DNS lookup was requested
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style())
            .build();

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.name.clone(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Check that the bucket exists and is reachable with these credentials
    pub async fn bucket_exists(&self) -> Result<bool> {
        match self.inner.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => match classify_error(&Self::format_sdk_error(&e)) {
                Error::NotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    /// Format AWS SDK error into a detailed error message
    fn format_sdk_error<E: std::fmt::Display>(error: &aws_sdk_s3::error::SdkError<E>) -> String {
        match error {
            aws_sdk_s3::error::SdkError::ServiceError(service_err) => {
                let err = service_err.err();
                let meta = service_err.raw();
                let mut msg = format!("Service error: {}", err);
                if let Some(code) = meta.headers().get("x-amz-error-code")
                    && let Ok(code_str) = std::str::from_utf8(code.as_bytes())
                {
                    msg.push_str(&format!(" (code: {})", code_str));
                }
                msg.push_str(&format!(" (status: {})", meta.status().as_u16()));
                msg
            }
            aws_sdk_s3::error::SdkError::ConstructionFailure(err) => {
                format!("Request construction failed: {:?}", err)
            }
            aws_sdk_s3::error::SdkError::TimeoutError(_) => "Request timeout".to_string(),
            aws_sdk_s3::error::SdkError::DispatchFailure(err) => {
                format!("Network dispatch error: {:?}", err)
            }
            aws_sdk_s3::error::SdkError::ResponseError(err) => {
                format!("Response error: {:?}", err)
            }
            _ => error.to_string(),
        }
    }
}

/// Map a formatted SDK error message onto the core error kinds
fn classify_error(message: &str) -> Error {
    if message.contains("NotFound")
        || message.contains("NoSuchBucket")
        || message.contains("status: 404")
    {
        Error::NotFound(message.to_string())
    } else if message.contains("AccessDenied")
        || message.contains("InvalidAccessKeyId")
        || message.contains("SignatureDoesNotMatch")
        || message.contains("status: 403")
    {
        Error::Auth(message.to_string())
    } else {
        Error::Network(message.to_string())
    }
}

/// Content type from the file extension
fn content_type_for(local_path: &Path) -> String {
    mime_guess::from_path(local_path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

#[async_trait]
impl StorageBackend for S3Client {
    async fn put_object_from_file(
        &self,
        key: &str,
        local_path: &Path,
        options: &[UploadOption],
    ) -> Result<()> {
        let body = ByteStream::from_path(local_path).await.map_err(|e| {
            Error::InvalidPath(format!("Cannot read {}: {e}", local_path.display()))
        })?;

        let mut request = self
            .inner
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type_for(local_path))
            .body(body);

        for option in options {
            match option {
                UploadOption::CacheControl(value) => {
                    request = request.cache_control(value);
                }
            }
        }

        request
            .send()
            .await
            .map_err(|e| classify_error(&Self::format_sdk_error(&e)))?;

        tracing::debug!(bucket = %self.bucket, key = key, "Object stored");
        Ok(())
    }
}
