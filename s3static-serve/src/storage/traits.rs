//! Storage backend traits

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use thiserror::Error;

/// Errors from storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// The request never reached the store (refused, DNS, timeout)
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store answered with an error (auth, missing bucket, 5xx)
    #[error("Store error: {0}")]
    Service(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Stream error: {0}")]
    Stream(String),
}

/// An entry returned by a prefix listing
///
/// Common prefixes are reported as entries too, with a zero size and no
/// modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

impl ObjectInfo {
    pub fn prefix(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size: 0,
            last_modified: None,
        }
    }
}

/// Object body as a stream of chunks
pub type BodyStream = BoxStream<'static, Result<Bytes, StoreError>>;

/// A fetched object: metadata plus a body stream
///
/// Dropping the value drops the stream, which releases the underlying store
/// connection.
pub struct ObjectContent {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    pub content_type: Option<String>,
    pub body: BodyStream,
}

impl std::fmt::Debug for ObjectContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectContent")
            .field("key", &self.key)
            .field("size", &self.size)
            .field("last_modified", &self.last_modified)
            .field("etag", &self.etag)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// The two store operations the server relies on
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List one level under `prefix`, in the order the store reports it
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StoreError>;

    /// Fetch an object by its exact key
    async fn get_object(&self, key: &str) -> Result<ObjectContent, StoreError>;
}
