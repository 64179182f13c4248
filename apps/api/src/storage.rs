use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;

pub const RESUME_PREFIX: &str = "resumes";
pub const VIDEO_PREFIX: &str = "videos";

/// Archive of uploaded documents. Keys are opaque to callers.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Stores `bytes` under a fresh key derived from `prefix` and `filename`
    /// and returns that key.
    async fn put(
        &self,
        prefix: &str,
        filename: &str,
        content_type: Option<&str>,
        bytes: Bytes,
    ) -> Result<String, AppError>;

    /// Removes an object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

/// S3-compatible bucket (MinIO locally, AWS in production).
#[derive(Clone)]
pub struct S3DocumentStore {
    s3: S3Client,
    bucket: String,
}

impl S3DocumentStore {
    pub fn new(s3: S3Client, bucket: String) -> Self {
        Self { s3, bucket }
    }
}

#[async_trait]
impl DocumentStore for S3DocumentStore {
    /// Uploads under `<prefix>/<uuid>-<filename>`.
    async fn put(
        &self,
        prefix: &str,
        filename: &str,
        content_type: Option<&str>,
        bytes: Bytes,
    ) -> Result<String, AppError> {
        let key = object_key(prefix, filename);
        self.s3
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .content_type(content_type.unwrap_or("application/octet-stream"))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("upload of {key} failed: {e}")))?;

        info!("Stored upload at s3://{}/{}", self.bucket, key);
        Ok(key)
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.s3
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("delete of {key} failed: {e}")))?;

        info!("Deleted s3://{}/{}", self.bucket, key);
        Ok(())
    }
}

pub fn object_key(prefix: &str, filename: &str) -> String {
    format!("{prefix}/{}-{}", Uuid::new_v4(), sanitize_filename(filename))
}

/// Keeps only the final path component, with anything outside
/// `[A-Za-z0-9._-]` replaced by `_`.
fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches(['.', '_']).is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
pub async fn build_s3_client(config: &Config) -> S3Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "screener-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    // MinIO needs path-style addressing.
    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();

    S3Client::from_conf(s3_config)
}
