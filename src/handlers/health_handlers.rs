//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness as reported by the configured object store

use crate::services::{directory_service::DirectoryService, object_store::ReadinessCheck};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::BTreeMap;

/// `GET /healthz`
///
/// Very small liveness probe — always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Runs the store's own probes (for SQLite: `SELECT 1` plus a disk
/// write/read/delete). HTTP 200 when all checks pass, HTTP 503 otherwise.
pub async fn readyz(State(service): State<DirectoryService>) -> impl IntoResponse {
    let checks = service.store().readiness().await;
    let overall_ok = checks.iter().all(|c| c.ok);

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks: checks.into_iter().map(|c| (c.name, c)).collect(),
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: BTreeMap<&'static str, ReadinessCheck>,
}
