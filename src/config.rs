//! Server configuration
//!
//! Command line flags, each with an environment fallback. `main` loads `.env`
//! before parsing so the same names work from a dotenv file.
//!
//! With no subcommand (or `serve`) the binary runs the HTTP API. `predict`
//! classifies one local image and prints the result.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::inference::{ModelPaths, Task};
use crate::storage::BlobStore;
use crate::utils::error::{PaddyError, Result};
use crate::utils::logging::{LogConfig, LogLevel};

/// Default request body limit (10 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// PaddyScanner inference server
#[derive(Parser, Debug)]
#[command(name = "paddy-scanner")]
#[command(author = "Warre Snaet")]
#[command(version)]
#[command(about = "HTTP API for paddy disease, variety and age prediction")]
pub struct Cli {
    /// Subcommand to execute (defaults to `serve`)
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Host to bind to
    #[arg(long, env = "PADDY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PADDY_PORT", default_value = "8000")]
    pub port: u16,

    /// Directory holding the three ONNX models
    #[arg(long, global = true, env = "PADDY_MODELS_DIR", default_value = "models")]
    pub models_dir: PathBuf,

    /// Disease model, overrides the file in --models-dir
    #[arg(long, global = true, env = "PADDY_DISEASE_MODEL")]
    pub disease_model: Option<PathBuf>,

    /// Variety model, overrides the file in --models-dir
    #[arg(long, global = true, env = "PADDY_VARIETY_MODEL")]
    pub variety_model: Option<PathBuf>,

    /// Age model, overrides the file in --models-dir
    #[arg(long, global = true, env = "PADDY_AGE_MODEL")]
    pub age_model: Option<PathBuf>,

    /// PostgreSQL connection string for prediction records
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Object store URL for uploaded images (file:///, memory:///, ...)
    #[arg(long, env = "BLOB_STORE_URL")]
    pub blob_store_url: Option<String>,

    /// Local image directory, used when no --blob-store-url is given
    #[arg(long, env = "PADDY_BLOB_DIR", default_value = "data/blobs")]
    pub blob_dir: PathBuf,

    /// Maximum request body size in bytes
    #[arg(long, env = "PADDY_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "PADDY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Plain log output without colors
    #[arg(long, global = true, env = "PADDY_NO_COLOR")]
    pub no_color: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP API
    Serve,

    /// Classify a single local image and print the predictions
    Predict {
        /// Path to the image file
        image: PathBuf,

        /// Run only this task; all three when omitted
        #[arg(short, long, value_enum)]
        task: Option<Task>,
    },
}

impl Cli {
    /// Model locations after applying the per-model overrides
    pub fn model_paths(&self) -> ModelPaths {
        let mut models = ModelPaths::in_dir(&self.models_dir);
        if let Some(path) = &self.disease_model {
            models.disease = path.clone();
        }
        if let Some(path) = &self.variety_model {
            models.variety = path.clone();
        }
        if let Some(path) = &self.age_model {
            models.age = path.clone();
        }
        models
    }

    pub fn log_config(&self) -> LogConfig {
        let logging = LogConfig::with_level(LogLevel::parse(&self.log_level));
        if self.no_color {
            logging.without_ansi()
        } else {
            logging
        }
    }
}

/// Where uploaded images live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobLocation {
    Url(String),
    Dir(PathBuf),
}

impl BlobLocation {
    pub fn open(&self) -> Result<BlobStore> {
        match self {
            BlobLocation::Url(url) => BlobStore::from_url(url),
            BlobLocation::Dir(dir) => BlobStore::local(dir),
        }
    }
}

impl std::fmt::Display for BlobLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlobLocation::Url(url) => write!(f, "{}", url),
            BlobLocation::Dir(dir) => write!(f, "{}", dir.display()),
        }
    }
}

/// Resolved server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub models: ModelPaths,
    pub database_url: Option<String>,
    pub blobs: BlobLocation,
    pub max_upload_bytes: usize,
    pub logging: LogConfig,
}

impl ServerConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let bind_addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
            .parse()
            .map_err(|e| PaddyError::Config(format!("invalid bind address {}:{}: {}", cli.host, cli.port, e)))?;

        if cli.max_upload_bytes == 0 {
            return Err(PaddyError::Config("max upload size must be positive".to_string()));
        }

        let blobs = match cli.blob_store_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => BlobLocation::Url(url.to_string()),
            _ => BlobLocation::Dir(cli.blob_dir.clone()),
        };

        Ok(Self {
            bind_addr,
            models: cli.model_paths(),
            database_url: cli
                .database_url
                .clone()
                .filter(|url| !url.trim().is_empty()),
            blobs,
            max_upload_bytes: cli.max_upload_bytes,
            logging: cli.log_config(),
        })
    }
}
