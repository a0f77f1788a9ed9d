//! The object-store seam.
//!
//! A container is a flat namespace of blobs addressed by string keys. Any
//! hierarchy (directories) is layered on top by `DirectoryService`; stores
//! only know how to put a blob and enumerate keys by prefix.

use crate::models::blob::Blob;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::io;
use thiserror::Error;

/// Longest key, in bytes, any store accepts.
pub const MAX_BLOB_KEY_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid blob key `{0}`")]
    InvalidKey(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of one readiness probe run by a store.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessCheck {
    #[serde(skip)]
    pub name: &'static str,
    pub ok: bool,
    pub error: Option<String>,
}

impl ReadinessCheck {
    pub fn ok(name: &'static str) -> Self {
        Self {
            name,
            ok: true,
            error: None,
        }
    }

    pub fn failed(name: &'static str, error: impl Into<String>) -> Self {
        Self {
            name,
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// Primitive operations over a single container.
///
/// Implementations must tolerate concurrent calls from independent requests.
/// Overwrites are last-write-wins; nothing here spans more than one blob.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `data` at `key`, replacing any existing blob.
    async fn put(&self, key: &str, data: Bytes, content_type: Option<String>)
    -> StoreResult<Blob>;

    /// Enumerate keys in ascending order. When `prefix` is given only keys
    /// starting with it (exact, case-sensitive) are returned.
    async fn list(&self, prefix: Option<&str>) -> StoreResult<Vec<String>>;

    /// Probes reported by `GET /readyz`.
    async fn readiness(&self) -> Vec<ReadinessCheck>;
}

/// Basic key validation shared by every store.
///
/// Rejects keys that are empty, overlong, begin with `/`, have a `.` or `..`
/// segment, or contain a backslash or control characters.
pub fn ensure_key_safe(key: &str) -> StoreResult<()> {
    if key.is_empty() || key.len() > MAX_BLOB_KEY_LEN {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    if key.starts_with('/') || key.split('/').any(|seg| seg == "." || seg == "..") {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    if key.bytes().any(|b| b.is_ascii_control() || b == b'\\') {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
