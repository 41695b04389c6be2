//! Utilities module for logging and error handling

pub mod error;
pub mod logging;

// Re-export main types for convenience
pub use error::{PaddyError, Result};
pub use logging::{init_logging, LogConfig, LogLevel};

/// Round a probability to 4 decimal places, the precision reported to clients
pub fn round_confidence(p: f32) -> f64 {
    (p as f64 * 10_000.0).round() / 10_000.0
}
