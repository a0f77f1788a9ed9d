//! Data models for the blob gateway.
//!
//! `Blob` maps to the `blobs` table via `sqlx::FromRow`; the directory
//! bodies are the JSON shapes exchanged over HTTP.

pub mod blob;
pub mod directory;
