use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::{env, str::FromStr};

/// Which `ObjectStore` implementation backs the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// SQLite metadata plus payload files on local disk.
    Sqlite,
    /// Process memory; lost on exit.
    Memory,
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub backend: Backend,
    pub storage_dir: String,
    pub database_url: String,
    pub container: String,
    pub route_prefix: String,
    pub max_upload_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Directory-style API over a flat blob container")]
pub struct Args {
    /// Host to bind to (overrides BLOB_GATEWAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides BLOB_GATEWAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Object store backend (overrides BLOB_GATEWAY_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Directory where blob payloads are stored (overrides BLOB_GATEWAY_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides BLOB_GATEWAY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Container holding directories and files (overrides BLOB_GATEWAY_CONTAINER)
    #[arg(long)]
    pub container: Option<String>,

    /// Path prefix for every route, e.g. /api (overrides BLOB_GATEWAY_ROUTE_PREFIX)
    #[arg(long)]
    pub route_prefix: Option<String>,

    /// Maximum request body size in bytes (overrides BLOB_GATEWAY_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::resolve(args, |name| env::var(name))?;
        Ok((cfg, migrate))
    }

    /// Merge `args` over the variables yielded by `lookup`, then defaults.
    pub fn resolve<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        // --- Environment fallback ---
        let env_string = |name: &str, default: &str| -> Result<String> {
            match lookup(name) {
                Ok(value) => Ok(value),
                Err(env::VarError::NotPresent) => Ok(default.to_string()),
                Err(err) => Err(err).with_context(|| format!("reading {}", name)),
            }
        };
        let env_parsed = |name: &str| -> Result<Option<String>> {
            match lookup(name) {
                Ok(value) => Ok(Some(value)),
                Err(env::VarError::NotPresent) => Ok(None),
                Err(err) => Err(err).with_context(|| format!("reading {}", name)),
            }
        };

        let env_host = env_string("BLOB_GATEWAY_HOST", "0.0.0.0")?;
        let env_port = parse_or("BLOB_GATEWAY_PORT", env_parsed("BLOB_GATEWAY_PORT")?, 7071)?;
        let env_backend = match env_parsed("BLOB_GATEWAY_BACKEND")? {
            Some(value) => <Backend as ValueEnum>::from_str(&value, true).map_err(|err| {
                anyhow::anyhow!("parsing BLOB_GATEWAY_BACKEND value `{}`: {}", value, err)
            })?,
            None => Backend::Sqlite,
        };
        let env_storage = env_string("BLOB_GATEWAY_STORAGE_DIR", "./data/blobs")?;
        let env_db = env_string(
            "BLOB_GATEWAY_DATABASE_URL",
            "sqlite://./data/meta/blob_gateway.db",
        )?;
        let env_container = env_string("BLOB_GATEWAY_CONTAINER", "input")?;
        let env_prefix = env_string("BLOB_GATEWAY_ROUTE_PREFIX", "")?;
        let env_max_upload = parse_or(
            "BLOB_GATEWAY_MAX_UPLOAD_BYTES",
            env_parsed("BLOB_GATEWAY_MAX_UPLOAD_BYTES")?,
            10 * 1024 * 1024,
        )?;

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            backend: args.backend.unwrap_or(env_backend),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            container: args.container.unwrap_or(env_container),
            route_prefix: args.route_prefix.unwrap_or(env_prefix),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(name: &str, value: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        None => Ok(default),
    }
}
