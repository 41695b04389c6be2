//! Storage module
//!
//! Two independent stores back the service:
//! - [`BlobStore`]: uploaded image bytes, keyed by UUID
//! - [`PredictionRepository`]: prediction records for the history view

pub mod blob;
pub mod records;

// Re-export main types for convenience
pub use blob::BlobStore;
pub use records::{
    create_pool, run_migrations, InMemoryPredictionRepository, PgPredictionRepository,
    PredictionRecord, PredictionRepository,
};
