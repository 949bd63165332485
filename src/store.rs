//! Object-store seam: the pipeline's only source of bytes and sink for
//! artifacts.
//!
//! The pipeline never talks to a concrete storage service; it consumes
//! this trait. Production deployments wrap their cloud SDK of choice,
//! tests and development use [`MemoryObjectStore`]. Keeping the seam this
//! narrow (get / put / signed_url) is what lets the whole pipeline run in
//! a unit test without credentials.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// Failures an object store can report.
///
/// The persist stage classifies these into retryable vs. terminal:
/// a missing bucket or denied access will not fix itself, while
/// unavailability and throttling usually will.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// No object at the given bucket/key.
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// The caller lacks permission for the operation.
    #[error("access denied: {bucket}/{key}")]
    AccessDenied { bucket: String, key: String },

    /// The destination bucket does not exist.
    #[error("no such bucket: {bucket}")]
    NoSuchBucket { bucket: String },

    /// The service is temporarily unavailable.
    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },

    /// The caller is being throttled.
    #[error("store throttled the request")]
    Throttled,

    /// Anything the other variants don't cover.
    #[error("store error: {0}")]
    Other(String),
}

impl StoreError {
    /// Whether a retry could plausibly succeed against this failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Throttled)
    }
}

/// A new object to write, with everything the store needs in one place.
#[derive(Debug, Clone)]
pub struct PutRequest {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
    /// Opaque key/value metadata attached to the object.
    pub metadata: HashMap<String, String>,
    /// Request encryption-at-rest from the store.
    pub server_side_encryption: bool,
}

/// Minimal object-store contract the pipeline depends on.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object's bytes.
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Write an object exactly as described by the request.
    async fn put(&self, request: PutRequest) -> Result<(), StoreError>;

    /// Produce a time-limited download URL for an existing object.
    async fn signed_url(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
        download_filename: &str,
    ) -> Result<String, StoreError>;
}

/// One stored object, as [`MemoryObjectStore`] keeps it.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
    pub metadata: HashMap<String, String>,
    pub encrypted: bool,
}

/// In-memory object store for tests and development.
///
/// Buckets must be declared up front with [`MemoryObjectStore::with_bucket`];
/// a put to an undeclared bucket fails with [`StoreError::NoSuchBucket`],
/// which is exactly what the persist stage's terminal-error classification
/// tests need.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<HashMap<(String, String), StoredObject>>>,
    buckets: Arc<RwLock<Vec<String>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a bucket so writes to it succeed.
    pub async fn with_bucket(self, bucket: impl Into<String>) -> Self {
        self.buckets.write().await.push(bucket.into());
        self
    }

    /// Seed an object, creating its bucket if needed.
    pub async fn seed(&self, bucket: &str, key: &str, body: Vec<u8>) {
        let mut buckets = self.buckets.write().await;
        if !buckets.iter().any(|b| b == bucket) {
            buckets.push(bucket.to_string());
        }
        drop(buckets);
        self.objects.write().await.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body,
                content_type: "application/octet-stream".to_string(),
                metadata: HashMap::new(),
                encrypted: false,
            },
        );
    }

    /// Fetch a stored object with its metadata, for test assertions.
    pub async fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Keys currently stored in a bucket, sorted.
    pub async fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .read()
            .await
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.body.clone())
            .ok_or_else(|| StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn put(&self, request: PutRequest) -> Result<(), StoreError> {
        if !self.buckets.read().await.iter().any(|b| *b == request.bucket) {
            return Err(StoreError::NoSuchBucket {
                bucket: request.bucket,
            });
        }
        debug!(
            "MemoryObjectStore put {}/{} ({} bytes)",
            request.bucket,
            request.key,
            request.body.len()
        );
        self.objects.write().await.insert(
            (request.bucket, request.key),
            StoredObject {
                body: request.body,
                content_type: request.content_type,
                metadata: request.metadata,
                encrypted: request.server_side_encryption,
            },
        );
        Ok(())
    }

    async fn signed_url(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
        download_filename: &str,
    ) -> Result<String, StoreError> {
        if self
            .objects
            .read()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .is_none()
        {
            return Err(StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        Ok(format!(
            "memory://{bucket}/{key}?expires={}&filename={download_filename}",
            ttl.as_secs()
        ))
    }
}
