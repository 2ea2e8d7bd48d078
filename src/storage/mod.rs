//! # Object Store
//!
//! Capability interface over the artifact store plus the S3 implementation.
//! `get` hands back a readable stream; callers own the stream and must drain
//! or drop it on every exit path.

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Errors raised fetching objects.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("failed to fetch object {bucket}/{key}: {reason}")]
    Get { bucket: String, key: String, reason: String },
}

/// An object fetched from the store.
pub struct ObjectStream {
    /// Streamed object body.
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    /// Content length when the store reports one.
    pub size: Option<i64>,
}

/// Capability interface over the object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object by bucket and key.
    async fn get(&self, bucket: &str, key: &str) -> Result<ObjectStream, StorageError>;
}

/// S3-backed [`ObjectStore`].
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<ObjectStream, StorageError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Get {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        let size = output.content_length();
        Ok(ObjectStream { reader: Box::new(output.body.into_async_read()), size })
    }
}
