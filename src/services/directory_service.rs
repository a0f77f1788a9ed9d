//! Directory emulation on top of a flat container.
//!
//! A directory `d` exists iff the zero-byte marker blob `d/.ignore` exists.
//! Files of `d` are every other blob whose key starts with `d/`. There is no
//! metadata service; the naming convention is the whole model.

use crate::services::object_store::{MAX_BLOB_KEY_LEN, ObjectStore, StoreError};
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// File name reserved for directory markers.
pub const MARKER_NAME: &str = ".ignore";

/// Suffix identifying a marker key: `/` followed by `MARKER_NAME`.
pub const MARKER_SUFFIX: &str = "/.ignore";

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Shared handle to the object store plus the directory convention.
///
/// Built once at startup and cloned into every request; cloning only bumps
/// the `Arc`.
#[derive(Clone)]
pub struct DirectoryService {
    store: Arc<dyn ObjectStore>,
}

impl DirectoryService {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    /// Every directory that has a marker, in store enumeration order.
    pub async fn list_directories(&self) -> DirectoryResult<Vec<String>> {
        let keys = self.store.list(None).await?;
        Ok(keys
            .iter()
            .filter_map(|key| directory_from_marker(key))
            .map(str::to_string)
            .collect())
    }

    /// Write (or overwrite) the marker for `directory_name`.
    ///
    /// Returns the directory name on success. Repeating the call is harmless.
    pub async fn create_directory(&self, directory_name: Option<&str>) -> DirectoryResult<String> {
        let name = directory_name.filter(|n| !n.is_empty()).ok_or_else(|| {
            DirectoryError::Validation("Please pass a directory name in the request body".into())
        })?;
        ensure_directory_name(name)?;

        let key = marker_key(name);
        self.store.put(&key, Bytes::new(), None).await?;
        debug!("created directory marker {}", key);
        Ok(name.to_string())
    }

    /// Bare file names directly or transitively under `directory_name`.
    ///
    /// A directory that was never created is indistinguishable from an empty
    /// one: both yield an empty list.
    pub async fn list_files(&self, directory_name: Option<&str>) -> DirectoryResult<Vec<String>> {
        let name = directory_name.filter(|n| !n.is_empty()).ok_or_else(|| {
            DirectoryError::Validation("Please pass a directory name in the path parameter".into())
        })?;
        ensure_directory_name(name)?;

        let prefix = format!("{}/", name);
        let keys = self.store.list(Some(&prefix)).await?;
        Ok(keys
            .iter()
            .filter_map(|key| file_name_in_directory(key, &prefix))
            .map(str::to_string)
            .collect())
    }

    /// Store `data` as `<directory_name>/<file_name>`, overwriting.
    ///
    /// The directory marker is neither required nor created.
    pub async fn upload_file(
        &self,
        directory_name: Option<&str>,
        file_name: Option<&str>,
        data: Bytes,
        content_type: Option<String>,
    ) -> DirectoryResult<String> {
        let directory = directory_name.filter(|n| !n.is_empty()).ok_or_else(|| {
            DirectoryError::Validation("Please pass a directory_name parameter".into())
        })?;
        ensure_directory_name(directory)?;
        let file = file_name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| DirectoryError::Validation("File name is required".into()))?;
        ensure_file_name(file)?;

        let key = format!("{}/{}", directory, file);
        ensure_key_len(&key)?;
        let content_type = content_type.unwrap_or_else(|| "application/octet-stream".into());
        let blob = self.store.put(&key, data, Some(content_type)).await?;
        debug!("uploaded {} ({} bytes)", blob.key, blob.size_bytes);
        Ok(key)
    }
}

pub fn marker_key(directory_name: &str) -> String {
    format!("{}{}", directory_name, MARKER_SUFFIX)
}

/// Directory name encoded by a marker key, or `None` for any other key.
pub fn directory_from_marker(key: &str) -> Option<&str> {
    key.strip_suffix(MARKER_SUFFIX)
}

/// File name relative to `prefix` (which ends in `/`), skipping markers and
/// keys that are the prefix itself.
pub fn file_name_in_directory<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    if key.ends_with(MARKER_SUFFIX) {
        return None;
    }
    key.strip_prefix(prefix).filter(|rest| !rest.is_empty())
}

/// A directory is exactly one key segment. Nested names such as `a/b` are
/// refused even though the marker convention could encode them.
fn ensure_directory_name(name: &str) -> DirectoryResult<()> {
    if name.contains('/') || name.contains('\\') {
        return Err(DirectoryError::Validation(format!(
            "Directory name `{}` must not contain path separators",
            name
        )));
    }
    ensure_segment(name, "Directory")?;
    ensure_key_len(&marker_key(name))
}

fn ensure_file_name(name: &str) -> DirectoryResult<()> {
    if name.contains('/') || name.contains('\\') {
        return Err(DirectoryError::Validation(format!(
            "File name `{}` must not contain path separators",
            name
        )));
    }
    if name == MARKER_NAME {
        return Err(DirectoryError::Validation(format!(
            "File name `{}` is reserved",
            MARKER_NAME
        )));
    }
    ensure_segment(name, "File")
}

fn ensure_key_len(key: &str) -> DirectoryResult<()> {
    if key.len() > MAX_BLOB_KEY_LEN {
        return Err(DirectoryError::Validation(format!(
            "Name is too long: blob keys are limited to {} bytes",
            MAX_BLOB_KEY_LEN
        )));
    }
    Ok(())
}

fn ensure_segment(name: &str, kind: &str) -> DirectoryResult<()> {
    if name == "." || name == ".." {
        return Err(DirectoryError::Validation(format!(
            "{} name `{}` is not allowed",
            kind, name
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(DirectoryError::Validation(format!(
            "{} name must not contain control characters",
            kind
        )));
    }
    Ok(())
}
