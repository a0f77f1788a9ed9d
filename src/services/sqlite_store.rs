//! src/services/sqlite_store.rs
//!
//! SqliteStore — durable `ObjectStore` backed by SQLite for blob metadata and
//! local disk for payloads. Payload files are sharded beneath
//! `base_path/{container}/{shard}/{shard}/{digest}` so that arbitrary keys
//! (including ones that look like nested paths) never touch the directory
//! layout on disk.

use crate::{
    models::blob::Blob,
    services::object_store::{
        ObjectStore, ReadinessCheck, StoreError, StoreResult, ensure_key_safe,
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::TryStreamExt;
use sqlx::SqlitePool;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

/// Schema applied by `--migrate` and at startup. Every statement is idempotent.
pub const SCHEMA_SQL: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Clone)]
pub struct SqliteStore {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where payloads are stored.
    pub base_path: PathBuf,

    /// Container every operation is scoped to.
    pub container: String,
}

impl SqliteStore {
    pub fn new(
        db: Arc<SqlitePool>,
        base_path: impl Into<PathBuf>,
        container: impl Into<String>,
    ) -> Self {
        Self {
            db,
            base_path: base_path.into(),
            container: container.into(),
        }
    }

    /// Root folder for this store's container. Not checked for existence.
    fn container_root(&self) -> PathBuf {
        self.base_path.join(&self.container)
    }

    /// Construct the payload path for a key.
    ///
    /// Uses MD5(container/key); the first two bytes pick the shard folders and
    /// the full hex digest names the file. Parent directories may not exist yet.
    fn blob_path(&self, key: &str) -> PathBuf {
        let digest = md5::compute(format!("{}/{}", self.container, key));
        let mut path = self.container_root();
        path.push(format!("{:02x}", digest[0]));
        path.push(format!("{:02x}", digest[1]));
        path.push(format!("{:x}", digest));
        path
    }

    /// Write `data` to a fresh temp file next to `file_path` and fsync it.
    /// Returns the temp path; the live payload is not touched.
    async fn stage_payload(&self, file_path: &Path, data: &[u8]) -> StoreResult<PathBuf> {
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StoreError::Io(io::Error::new(
                ErrorKind::Other,
                "blob path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let written = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(data).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        if let Err(err) = written {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }
        Ok(tmp_path)
    }

    /// Rename a staged temp file over the live payload.
    async fn promote_payload(tmp_path: &Path, file_path: &Path) -> StoreResult<()> {
        if let Err(err) = fs::rename(tmp_path, file_path).await {
            if err.kind() != ErrorKind::AlreadyExists {
                return Err(StoreError::Io(err));
            }
            fs::remove_file(file_path).await?;
            fs::rename(tmp_path, file_path).await?;
        }
        Ok(())
    }

    async fn check_sqlite(&self) -> ReadinessCheck {
        match sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await
        {
            Ok(1) => ReadinessCheck::ok("sqlite"),
            Ok(v) => ReadinessCheck::failed("sqlite", format!("unexpected result: {}", v)),
            Err(e) => ReadinessCheck::failed("sqlite", format!("error: {}", e)),
        }
    }

    /// Best-effort write/read/delete of a temp file under the container root.
    async fn check_disk(&self) -> ReadinessCheck {
        let root = self.container_root();
        if let Err(e) = fs::create_dir_all(&root).await {
            return ReadinessCheck::failed("disk", format!("could not create root: {}", e));
        }
        let tmp_path = root.join(format!(".readyz-{}", Uuid::new_v4()));
        if let Err(e) = fs::write(&tmp_path, b"readyz").await {
            return ReadinessCheck::failed("disk", format!("could not write tmp file: {}", e));
        }
        let check = match fs::read(&tmp_path).await {
            Ok(bytes) if bytes == b"readyz" => ReadinessCheck::ok("disk"),
            Ok(_) => ReadinessCheck::failed("disk", "file content mismatch"),
            Err(e) => ReadinessCheck::failed("disk", format!("could not read tmp file: {}", e)),
        };
        if let Err(e) = fs::remove_file(&tmp_path).await {
            debug!("could not remove {}: {}", tmp_path.display(), e);
        }
        check
    }
}

#[async_trait]
impl ObjectStore for SqliteStore {
    /// Stage the payload, upsert the row inside a transaction, rename the
    /// staged file into place, then commit.
    ///
    /// Overwrite is unconditional. The live payload is only replaced after the
    /// upsert succeeded; on any earlier failure the previous blob (row and
    /// bytes) is left intact and the staged file is discarded.
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<String>,
    ) -> StoreResult<Blob> {
        ensure_key_safe(key)?;

        let file_path = self.blob_path(key);
        let tmp_path = self.stage_payload(&file_path, &data).await?;
        let etag = format!("{:x}", md5::compute(&data));

        let committed = async {
            let mut tx = self.db.begin().await?;
            let blob = sqlx::query_as::<_, Blob>(
                r#"
                INSERT INTO blobs (
                    id, container, key, content_type, size_bytes, etag, last_modified
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(container, key) DO UPDATE SET
                    content_type = excluded.content_type,
                    size_bytes = excluded.size_bytes,
                    etag = excluded.etag,
                    last_modified = excluded.last_modified
                RETURNING id, container, key, content_type, size_bytes, etag, last_modified
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&self.container)
            .bind(key)
            .bind(content_type)
            .bind(data.len() as i64)
            .bind(&etag)
            .bind(Utc::now())
            .fetch_one(&mut *tx)
            .await?;

            Self::promote_payload(&tmp_path, &file_path).await?;
            tx.commit().await?;
            Ok::<_, StoreError>(blob)
        }
        .await;

        match committed {
            Ok(blob) => {
                debug!("wrote {} bytes to {}", data.len(), file_path.display());
                Ok(blob)
            }
            Err(err) => {
                if let Err(e) = fs::remove_file(&tmp_path).await {
                    if e.kind() != ErrorKind::NotFound {
                        debug!("could not remove {}: {}", tmp_path.display(), e);
                    }
                }
                Err(err)
            }
        }
    }

    /// Prefix matching uses `substr` rather than `LIKE` so that `%`, `_` and
    /// letter case in the prefix are compared literally.
    async fn list(&self, prefix: Option<&str>) -> StoreResult<Vec<String>> {
        let keys = match prefix {
            Some(prefix) => {
                sqlx::query_scalar::<_, String>(
                    "SELECT key FROM blobs
                     WHERE container = ? AND substr(key, 1, length(?)) = ?
                     ORDER BY key ASC",
                )
                .bind(&self.container)
                .bind(prefix)
                .bind(prefix)
                .fetch(&*self.db)
                .try_collect::<Vec<_>>()
                .await?
            }
            None => {
                sqlx::query_scalar::<_, String>(
                    "SELECT key FROM blobs WHERE container = ? ORDER BY key ASC",
                )
                .bind(&self.container)
                .fetch(&*self.db)
                .try_collect::<Vec<_>>()
                .await?
            }
        };
        debug!(
            "listed {} keys in `{}` (prefix {:?})",
            keys.len(),
            self.container,
            prefix
        );
        Ok(keys)
    }

    async fn readiness(&self) -> Vec<ReadinessCheck> {
        vec![self.check_sqlite().await, self.check_disk().await]
    }
}

/// Apply `SCHEMA_SQL` statement by statement.
pub async fn run_migrations(db: &SqlitePool) -> Result<(), sqlx::Error> {
    let statements = SCHEMA_SQL
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }

    Ok(())
}
