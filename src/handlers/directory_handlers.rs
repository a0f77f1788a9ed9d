//! HTTP handlers for the directory and upload endpoints.
//! Input validation and the directory convention live in `DirectoryService`;
//! these handlers only extract, log, and shape responses.

use crate::{
    errors::AppError,
    models::directory::{CreateDirectoryReq, MessageResponse, UploadQuery, UploadResponse},
    services::directory_service::DirectoryService,
};
use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, Path, Query, State, multipart::MultipartRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

const NO_FILE: &str = "No file found in the request";

/// `GET /directories` — names of every directory with a marker.
pub async fn list_directories(
    State(service): State<DirectoryService>,
) -> Result<impl IntoResponse, AppError> {
    info!("Listing directories.");
    let directories = service
        .list_directories()
        .await
        .map_err(|err| AppError::from_directory("Error listing directories", err))?;
    Ok(Json(directories))
}

/// `POST /directories` — body `{"directory_name": "..."}`.
///
/// The body is parsed here rather than through `Json<_>` so that a missing
/// content type is accepted and every parse failure reads the same.
pub async fn create_directory(
    State(service): State<DirectoryService>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    info!("Creating blob directory.");
    let req: CreateDirectoryReq =
        serde_json::from_slice(&body).map_err(|_| AppError::bad_request("Invalid JSON body"))?;

    let name = service
        .create_directory(req.directory_name.as_deref())
        .await
        .map_err(|err| AppError::from_directory("Error creating directory", err))?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: format!("Directory {} created successfully.", name),
        }),
    ))
}

/// `GET /directories/{directory_name}` — bare file names in one directory.
pub async fn list_files_in_directory(
    State(service): State<DirectoryService>,
    Path(directory_name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    info!("Listing files in directory.");
    let files = service
        .list_files(Some(&directory_name))
        .await
        .map_err(|err| AppError::from_directory("Error listing files", err))?;
    Ok(Json(files))
}

/// `GET /directories/` — the path segment is empty.
pub async fn missing_directory_name() -> AppError {
    AppError::bad_request("Please pass a directory name in the path parameter")
}

/// `POST /UploadFile?directory_name=...` with a multipart `file` part.
pub async fn upload_file(
    State(service): State<DirectoryService>,
    Query(query): Query<UploadQuery>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, AppError> {
    info!("Uploading file to storage account.");
    let directory_name = query
        .directory_name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::bad_request("Please pass a directory_name parameter"))?;

    let mut multipart = multipart.map_err(|_| AppError::bad_request(NO_FILE))?;
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::new(err.status(), err.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|err| AppError::new(err.status(), err.body_text()))?;
        upload = Some((file_name, content_type, data));
        break;
    }
    let (file_name, content_type, data) = upload.ok_or_else(|| AppError::bad_request(NO_FILE))?;

    let blob_name = service
        .upload_file(
            Some(&directory_name),
            file_name.as_deref(),
            data,
            content_type,
        )
        .await
        .map_err(|err| AppError::from_directory("Error uploading file", err))?;

    let file_name = file_name.unwrap_or_default();
    Ok(Json(UploadResponse {
        message: format!(
            "File {} uploaded successfully to {}",
            file_name, directory_name
        ),
        blob_name,
    }))
}

#[cfg(test)]
mod tests {
    use crate::{
        models::{
            blob::Blob,
            directory::{MessageResponse, UploadResponse},
        },
        routes::routes::routes,
        services::{
            directory_service::DirectoryService,
            memory_store::MemoryStore,
            object_store::{ObjectStore, ReadinessCheck, StoreResult},
        },
    };
    use async_trait::async_trait;
    use axum::{
        Router,
        body::{Body, Bytes},
        http::{Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use std::{io, sync::Arc};
    use tower::ServiceExt;

    const BOUNDARY: &str = "X-BLOB-GATEWAY-BOUNDARY";

    fn test_app() -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new("input"));
        let app = routes().with_state(DirectoryService::new(store.clone()));
        (app, store)
    }

    struct UnreachableStore;

    #[async_trait]
    impl ObjectStore for UnreachableStore {
        async fn put(&self, _: &str, _: Bytes, _: Option<String>) -> StoreResult<Blob> {
            Err(io::Error::new(io::ErrorKind::TimedOut, "connection timed out").into())
        }

        async fn list(&self, _: Option<&str>) -> StoreResult<Vec<String>> {
            Err(io::Error::new(io::ErrorKind::TimedOut, "connection timed out").into())
        }

        async fn readiness(&self) -> Vec<ReadinessCheck> {
            vec![ReadinessCheck::failed("remote", "connection timed out")]
        }
    }

    fn broken_app() -> Router {
        routes().with_state(DirectoryService::new(Arc::new(UnreachableStore)))
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Bytes) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn multipart_upload(uri: &str, field: &str, file_name: &str, data: &str) -> Request<Body> {
        let body = format!(
            "--{b}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
             Content-Type: text/csv\r\n\r\n\
             {data}\r\n\
             --{b}--\r\n",
            b = BOUNDARY,
        );
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn list_directories_empty() {
        let (app, _) = test_app();
        let (status, body) = send(&app, get("/directories")).await;

        assert_eq!(status, StatusCode::OK);
        let dirs: Vec<String> = serde_json::from_slice(&body).unwrap();
        assert!(dirs.is_empty());
    }

    #[tokio::test]
    async fn create_directory_returns_201() {
        let (app, store) = test_app();
        let (status, body) = send(
            &app,
            post_json("/directories", r#"{"directory_name":"reports"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        let msg: MessageResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(msg.message, "Directory reports created successfully.");
        assert!(store.get("reports/.ignore").await.is_some());
    }

    #[tokio::test]
    async fn create_directory_accepts_trailing_slash_and_no_content_type() {
        let (app, _) = test_app();
        let req = Request::builder()
            .method("POST")
            .uri("/directories/")
            .body(Body::from(r#"{"directory_name":"inbox"}"#))
            .unwrap();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, body) = send(&app, get("/directories")).await;
        let dirs: Vec<String> = serde_json::from_slice(&body).unwrap();
        assert_eq!(dirs, vec!["inbox"]);
    }

    #[tokio::test]
    async fn create_directory_requires_name() {
        let (app, store) = test_app();
        for body in ["{}", r#"{"directory_name":""}"#, r#"{"directory_name":null}"#] {
            let (status, text) = send(&app, post_json("/directories", body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(&text[..], b"Please pass a directory name in the request body");
        }
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn create_directory_rejects_invalid_json() {
        let (app, store) = test_app();
        for body in ["not json", "", r#"{"directory_name":42}"#] {
            let (status, text) = send(&app, post_json("/directories", body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(&text[..], b"Invalid JSON body");
        }
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn backslash_and_overlong_names_are_400() {
        let (app, store) = test_app();
        let long_name = "n".repeat(1020);
        for name in ["a\\b", long_name.as_str()] {
            let body = serde_json::json!({ "directory_name": name }).to_string();
            let (status, text) = send(&app, post_json("/directories", &body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{name:?}");
            assert!(!text.starts_with(b"Error creating directory"));
        }

        let (status, _) = send(&app, get("/directories/a%5Cb")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, get(&format!("/directories/{}", long_name))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            multipart_upload(
                &format!("/UploadFile?directory_name={}", long_name),
                "file",
                "f.txt",
                "1",
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn list_files_excludes_marker_and_neighbours() {
        let (app, store) = test_app();
        for key in ["a/.ignore", "a/one.txt", "ab/x", "b/one.txt"] {
            store.put(key, Bytes::new(), None).await.unwrap();
        }

        let (status, body) = send(&app, get("/directories/a")).await;
        assert_eq!(status, StatusCode::OK);
        let files: Vec<String> = serde_json::from_slice(&body).unwrap();
        assert_eq!(files, vec!["one.txt"]);
    }

    #[tokio::test]
    async fn list_files_of_unknown_directory_is_empty() {
        let (app, _) = test_app();
        let (status, body) = send(&app, get("/directories/nothing")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"[]");
    }

    #[tokio::test]
    async fn list_files_without_segment_is_400() {
        let (app, _) = test_app();
        let (status, body) = send(&app, get("/directories/")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            &body[..],
            b"Please pass a directory name in the path parameter"
        );
    }

    #[tokio::test]
    async fn upload_then_list_files() {
        let (app, _) = test_app();
        send(
            &app,
            post_json("/directories", r#"{"directory_name":"reports"}"#),
        )
        .await;

        let (status, body) = send(
            &app,
            multipart_upload("/UploadFile?directory_name=reports", "file", "q1.csv", "q,1"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let resp: UploadResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.blob_name, "reports/q1.csv");
        assert_eq!(resp.message, "File q1.csv uploaded successfully to reports");

        let (_, body) = send(&app, get("/directories/reports")).await;
        let files: Vec<String> = serde_json::from_slice(&body).unwrap();
        assert_eq!(files, vec!["q1.csv"]);

        let (_, body) = send(&app, get("/directories")).await;
        let dirs: Vec<String> = serde_json::from_slice(&body).unwrap();
        assert!(dirs.contains(&"reports".to_string()));
    }

    #[tokio::test]
    async fn upload_stores_bytes_and_content_type() {
        let (app, store) = test_app();
        let (status, _) = send(
            &app,
            multipart_upload("/UploadFile?directory_name=docs", "file", "a.csv", "x,y"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let meta = store.get("docs/a.csv").await.unwrap();
        assert_eq!(meta.size_bytes, 3);
        assert_eq!(
            meta.etag.as_deref(),
            Some(format!("{:x}", md5::compute(b"x,y")).as_str())
        );
        assert_eq!(meta.content_type.as_deref(), Some("text/csv"));
    }

    #[tokio::test]
    async fn upload_requires_directory_name() {
        let (app, store) = test_app();
        let (status, body) = send(
            &app,
            multipart_upload("/UploadFile", "file", "q1.csv", "q,1"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(&body[..], b"Please pass a directory_name parameter");
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn upload_requires_file_part() {
        let (app, store) = test_app();
        let (status, body) = send(
            &app,
            multipart_upload("/UploadFile?directory_name=d", "attachment", "q1.csv", "q,1"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(&body[..], b"No file found in the request");

        let (status, body) = send(&app, post_json("/UploadFile?directory_name=d", "{}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(&body[..], b"No file found in the request");
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn upload_requires_file_name() {
        let (app, _) = test_app();
        let (status, body) = send(
            &app,
            multipart_upload("/UploadFile?directory_name=d", "file", "", "q,1"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(&body[..], b"File name is required");
    }

    #[tokio::test]
    async fn store_errors_are_500_with_message() {
        let app = broken_app();

        let (status, body) = send(&app, get("/directories")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(&body[..], b"Error listing directories: connection timed out");

        let (status, body) = send(
            &app,
            post_json("/directories", r#"{"directory_name":"d"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(&body[..], b"Error creating directory: connection timed out");

        let (status, body) = send(&app, get("/directories/d")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(&body[..], b"Error listing files: connection timed out");

        let (status, body) = send(
            &app,
            multipart_upload("/UploadFile?directory_name=d", "file", "f.txt", "1"),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(&body[..], b"Error uploading file: connection timed out");
    }

    #[tokio::test]
    async fn validation_wins_over_broken_store() {
        let app = broken_app();
        let (status, _) = send(&app, post_json("/directories", "{}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
