//! Represents a blob stored in a container.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Metadata for a single blob within a container.
///
/// The payload bytes are not part of this record; stores keep them wherever
/// suits the backend (a sharded disk file, an in-memory buffer).
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Blob {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Container the blob lives in (e.g. "input").
    pub container: String,

    /// Full blob key, `/`-separated by convention only.
    pub key: String,

    /// Content type (MIME type) recorded at upload.
    pub content_type: Option<String>,

    /// Size in bytes.
    pub size_bytes: i64,

    /// Hex MD5 of the payload.
    pub etag: Option<String>,

    /// Timestamp of the last write.
    pub last_modified: DateTime<Utc>,
}
