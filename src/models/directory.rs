//! Request and response bodies for the directory endpoints.

use serde::{Deserialize, Serialize};

/// Body of `POST /directories`.
#[derive(Debug, Deserialize)]
pub struct CreateDirectoryReq {
    pub directory_name: Option<String>,
}

/// Query string of `POST /UploadFile`.
#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub directory_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Result of a successful upload.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub blob_name: String,
}
