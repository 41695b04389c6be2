//! # PaddyScanner
//!
//! Serving layer for three paddy (rice) leaf classifiers: disease, variety and
//! plant age. Uploaded images are stored in an object store, predictions are
//! recorded in PostgreSQL, and everything is exposed over an axum HTTP API.
//!
//! ## Modules
//!
//! - `preprocess`: Decode, center crop, resize and tensorize uploads
//! - `inference`: ONNX classifiers and the per-task adapters around them
//! - `labels`: Fixed label tables for each classifier
//! - `storage`: Image blobs and prediction records
//! - `server`: HTTP routes, shared state and error responses
//! - `config`: Command line and environment configuration
//! - `utils`: Logging, errors and small helpers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use paddy_scanner::{build_router, AppState, BlobStore, InferenceService, ModelPaths};
//! use paddy_scanner::storage::InMemoryPredictionRepository;
//!
//! let inference = InferenceService::load(&ModelPaths::in_dir("models".as_ref()))?;
//! let state = AppState::new(
//!     Arc::new(inference),
//!     BlobStore::in_memory(),
//!     Arc::new(InMemoryPredictionRepository::new()),
//! );
//! let app = build_router(Arc::new(state), 10 * 1024 * 1024);
//! ```

pub mod config;
pub mod inference;
pub mod labels;
pub mod preprocess;
pub mod server;
pub mod storage;
pub mod utils;

// Re-export commonly used items for convenience
pub use config::{Cli, ServerConfig};
pub use inference::{Classifier, InferenceService, ModelPaths, OnnxClassifier, Task};
pub use preprocess::{preprocess, PreprocessConfig};
pub use server::{build_router, ApiError, AppState, SharedState};
pub use storage::{BlobStore, PredictionRecord, PredictionRepository};
pub use utils::error::{PaddyError, Result};

/// Crate version reported by `/health`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
