//! In-memory ephemeral storage backend

use super::traits::*;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use md5::{Digest, Md5};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// In-memory stored object
struct InMemoryObject {
    data: Bytes,
    etag: String,
    last_modified: DateTime<Utc>,
    content_type: Option<String>,
}

/// Ephemeral (in-memory) storage backend
///
/// Keys are kept sorted, so listings come back in the lexicographic order
/// S3 uses. Bodies are streamed in fixed-size chunks.
pub struct EphemeralStorage {
    objects: RwLock<BTreeMap<String, InMemoryObject>>,
    chunk_size: usize,
}

impl Default for EphemeralStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl EphemeralStorage {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Stream bodies in chunks of `chunk_size` bytes
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Store an object, replacing any previous one, and return its ETag
    pub fn put_object(
        &self,
        key: &str,
        data: impl Into<Bytes>,
        content_type: Option<&str>,
    ) -> String {
        self.put_object_at(key, data, content_type, Utc::now())
    }

    /// Store an object with an explicit modification time
    pub fn put_object_at(
        &self,
        key: &str,
        data: impl Into<Bytes>,
        content_type: Option<&str>,
        last_modified: DateTime<Utc>,
    ) -> String {
        let data = data.into();
        let etag = Self::compute_etag(&data);
        self.objects.write().insert(
            key.to_string(),
            InMemoryObject {
                data,
                etag: etag.clone(),
                last_modified,
                content_type: content_type.map(String::from),
            },
        );
        etag
    }

    pub fn delete_object(&self, key: &str) -> bool {
        self.objects.write().remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    fn compute_etag(data: &[u8]) -> String {
        let mut hasher = Md5::new();
        hasher.update(data);
        format!("\"{}\"", hex::encode(hasher.finalize()))
    }
}

#[async_trait]
impl ObjectStore for EphemeralStorage {
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StoreError> {
        let objects = self.objects.read();

        let mut entries = Vec::new();
        let mut common_prefixes = BTreeSet::new();

        for (key, object) in objects.range(prefix.to_string()..) {
            if !key.starts_with(prefix) {
                break;
            }

            let suffix = &key[prefix.len()..];
            if let Some(pos) = suffix.find('/') {
                common_prefixes.insert(format!("{}{}", prefix, &suffix[..=pos]));
                continue;
            }

            entries.push(ObjectInfo {
                key: key.clone(),
                size: object.data.len() as u64,
                last_modified: Some(object.last_modified),
            });
        }

        // Objects first, then common prefixes, as a single S3 page reports them
        entries.extend(common_prefixes.into_iter().map(ObjectInfo::prefix));
        Ok(entries)
    }

    async fn get_object(&self, key: &str) -> Result<ObjectContent, StoreError> {
        let objects = self.objects.read();
        let object = objects
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        let data = object.data.clone();
        let chunk_size = self.chunk_size;
        let chunks: Vec<Result<Bytes, StoreError>> = (0..data.len())
            .step_by(chunk_size)
            .map(|start| Ok(data.slice(start..(start + chunk_size).min(data.len()))))
            .collect();

        Ok(ObjectContent {
            key: key.to_string(),
            size: object.data.len() as u64,
            last_modified: Some(object.last_modified),
            etag: Some(object.etag.clone()),
            content_type: object.content_type.clone(),
            body: futures::stream::iter(chunks).boxed(),
        })
    }
}
