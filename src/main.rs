use anyhow::Result;
use axum::Router;
use sqlx::sqlite::SqlitePoolOptions;
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use crate::{
    config::Backend,
    services::{
        directory_service::DirectoryService,
        memory_store::MemoryStore,
        object_store::ObjectStore,
        sqlite_store::{SqliteStore, run_migrations},
    },
};

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting blob-gateway with config: {:?}", cfg);

    // --- Initialize the object store ---
    let store: Arc<dyn ObjectStore> = match cfg.backend {
        Backend::Memory => {
            if migrate {
                anyhow::bail!("--migrate only applies to the sqlite backend");
            }
            tracing::warn!("Using in-memory backend; contents are lost on exit");
            Arc::new(MemoryStore::new(cfg.container.clone()))
        }
        Backend::Sqlite => {
            let db = connect_sqlite(&cfg.storage_dir, &cfg.database_url).await?;

            // --- Handle migration mode ---
            if migrate {
                run_migrations(&db).await?;
                tracing::info!("Database migration complete.");
                return Ok(()); // exit after migration
            }
            run_migrations(&db).await?;

            Arc::new(SqliteStore::new(
                db,
                cfg.storage_dir.clone(),
                cfg.container.clone(),
            ))
        }
    };

    // --- Build router ---
    let service = DirectoryService::new(store);
    let app: Router = routes::routes::app(service, &cfg.route_prefix, cfg.max_upload_bytes);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!(
        "Server listening on http://{} (container `{}`)",
        listener.local_addr()?,
        cfg.container
    );
    axum::serve(listener, app).await?;

    Ok(())
}

/// Prepare the payload directory and open the SQLite pool, creating the
/// database file and its parent directory when missing.
async fn connect_sqlite(storage_dir: &str, db_url: &str) -> Result<Arc<sqlx::SqlitePool>> {
    if !Path::new(storage_dir).exists() {
        fs::create_dir_all(storage_dir)?;
        tracing::info!("Created storage directory at {}", storage_dir);
    }

    tracing::debug!("Connecting using raw URL => {}", db_url);

    // Extract the local file path SQLx will use
    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:")
        .split('?')
        .next()
        .unwrap_or_default();
    tracing::debug!("Interpreted SQLite path => {}", db_path);

    if !db_path.is_empty() && !db_path.starts_with(":memory:") {
        let db_path_obj = Path::new(db_path);
        if let Some(parent) = db_path_obj.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
                tracing::info!("Created missing directory {:?}", parent);
            }
        }

        // SQLx will not create the file on its own without `mode=rwc`
        match fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(db_path_obj)
        {
            Ok(_) => tracing::debug!("File can be created/opened successfully."),
            Err(e) => tracing::warn!("Failed to open file manually: {}", e),
        }
    }

    let db = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await?;
    Ok(Arc::new(db))
}
