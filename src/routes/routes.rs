//! Defines routes for the directory, upload and health endpoints.
//!
//! ## Structure
//! - **Directory endpoints**
//!   - `GET    /directories` — list directory names
//!   - `POST   /directories` — create a directory (also `/directories/`)
//!   - `GET    /directories/{directory_name}` — list file names in a directory
//!
//! - **Upload endpoint**
//!   - `POST   /UploadFile?directory_name=...` — multipart upload of `file`
//!
//! - **Probes**
//!   - `GET    /healthz`, `GET /readyz`

use crate::{
    handlers::{
        directory_handlers::{
            create_directory, list_directories, list_files_in_directory, missing_directory_name,
            upload_file,
        },
        health_handlers::{healthz, readyz},
    },
    services::directory_service::DirectoryService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build the router for every endpoint, carrying `DirectoryService` as state.
pub fn routes() -> Router<DirectoryService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(
            "/directories",
            get(list_directories).post(create_directory),
        )
        .route(
            "/directories/",
            get(missing_directory_name).post(create_directory),
        )
        .route("/directories/{directory_name}", get(list_files_in_directory))
        .route("/UploadFile", post(upload_file))
}

/// Full application: routes nested under `prefix` (when non-empty), request
/// bodies capped at `max_body_bytes`, and state attached.
pub fn app(service: DirectoryService, prefix: &str, max_body_bytes: usize) -> Router {
    let routes = routes().layer(DefaultBodyLimit::max(max_body_bytes));
    let routes = match normalize_prefix(prefix) {
        Some(prefix) => Router::new().nest(&prefix, routes),
        None => routes,
    };
    routes.with_state(service)
}

/// `"api"`, `"/api"` and `"/api/"` all become `"/api"`; blank means no prefix.
fn normalize_prefix(prefix: &str) -> Option<String> {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("/{}", trimmed))
    }
}
