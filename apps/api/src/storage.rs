//! Binary object store for resume photos.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::{info, warn};

use crate::errors::SaveError;

/// Object store contract. Both operations are safe to repeat.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` under `key` and returns the public URL.
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<String, SaveError>;

    /// Deletes the object behind a URL previously returned by `put`.
    async fn delete(&self, url: &str) -> Result<(), SaveError>;
}

/// S3 / MinIO backed store.
pub struct S3BlobStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_url: String,
}

impl S3BlobStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: String, public_url: String) -> Self {
        Self {
            client,
            bucket,
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key)
    }

    fn key_for<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(self.public_url.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|key| !key.is_empty())
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<String, SaveError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| SaveError::Upstream(format!("S3 upload failed: {e}")))?;

        info!("Uploaded photo to s3://{}/{}", self.bucket, key);
        Ok(self.url_for(key))
    }

    async fn delete(&self, url: &str) -> Result<(), SaveError> {
        let Some(key) = self.key_for(url) else {
            warn!("Not deleting {url}: not an object in this bucket");
            return Ok(());
        };

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| SaveError::Upstream(format!("S3 delete failed: {e}")))?;

        info!("Deleted s3://{}/{}", self.bucket, key);
        Ok(())
    }
}
