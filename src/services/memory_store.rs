//! Volatile `ObjectStore` kept entirely in process memory.
//!
//! Useful for local runs (`--backend memory`) and as the store behind the
//! unit tests. Only blob metadata is kept: nothing in the service reads a
//! payload back, so bytes are sized and hashed on `put` and then dropped.
//! Contents are lost when the process exits.

use crate::{
    models::blob::Blob,
    services::object_store::{ObjectStore, ReadinessCheck, StoreResult, ensure_key_safe},
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use uuid::Uuid;

pub struct MemoryStore {
    container: String,
    blobs: RwLock<BTreeMap<String, Blob>>,
}

impl MemoryStore {
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            blobs: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of blobs currently held.
    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    #[cfg(test)]
    pub async fn get(&self, key: &str) -> Option<Blob> {
        self.blobs.read().await.get(key).cloned()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<String>,
    ) -> StoreResult<Blob> {
        ensure_key_safe(key)?;

        let meta = Blob {
            id: Uuid::new_v4(),
            container: self.container.clone(),
            key: key.to_string(),
            content_type,
            size_bytes: data.len() as i64,
            etag: Some(format!("{:x}", md5::compute(&data))),
            last_modified: Utc::now(),
        };

        self.blobs.write().await.insert(key.to_string(), meta.clone());
        Ok(meta)
    }

    async fn list(&self, prefix: Option<&str>) -> StoreResult<Vec<String>> {
        let blobs = self.blobs.read().await;
        let keys = match prefix {
            Some(prefix) => blobs
                .range(prefix.to_string()..)
                .map(|(key, _)| key)
                .take_while(|key| key.starts_with(prefix))
                .cloned()
                .collect(),
            None => blobs.keys().cloned().collect(),
        };
        Ok(keys)
    }

    async fn readiness(&self) -> Vec<ReadinessCheck> {
        vec![ReadinessCheck::ok("memory")]
    }
}
