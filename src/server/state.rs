//! Application state shared by all request handlers

use std::sync::Arc;
use std::time::Instant;

use crate::inference::InferenceService;
use crate::storage::{BlobStore, PredictionRepository};

/// Shared application state
pub struct AppState {
    /// Loaded classifiers, read-only after startup
    pub inference: Arc<InferenceService>,
    /// Uploaded image bytes
    pub blobs: BlobStore,
    /// Prediction history
    pub records: Arc<dyn PredictionRepository>,
    /// Server start time
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        inference: Arc<InferenceService>,
        blobs: BlobStore,
        records: Arc<dyn PredictionRepository>,
    ) -> Self {
        Self {
            inference,
            blobs,
            records,
            started_at: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

pub type SharedState = Arc<AppState>;
