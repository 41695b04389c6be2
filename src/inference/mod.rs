//! Inference module for paddy image classification
//!
//! This module provides:
//! - The [`Classifier`] runtime seam and its ONNX Runtime implementation
//! - Task adapters pairing each model with its preprocessing and labels
//! - The [`InferenceService`] shared by all HTTP handlers

pub mod adapter;
pub mod classifier;
pub mod service;

// Re-export main types for convenience
pub use adapter::{argmax, AgePrediction, ClassScore, LabelPrediction, Task, TaskAdapter};
pub use classifier::{Classifier, OnnxClassifier};
pub use service::{CombinedPrediction, InferenceService, ModelPaths};
