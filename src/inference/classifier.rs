//! Classifier runtime
//!
//! The forward pass itself is opaque to this crate: a [`Classifier`] takes a
//! preprocessed NHWC tensor and returns one probability per class. The
//! production implementation runs an ONNX artifact through ONNX Runtime;
//! tests inject their own implementations.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ndarray::ArrayView4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::TensorRef;
use tracing::info;

use crate::utils::error::{PaddyError, Result};

/// A loaded model mapping an input tensor to a class-probability vector
pub trait Classifier: Send + Sync {
    /// Human-readable model name, used in logs and errors
    fn name(&self) -> &str;

    /// Run a forward pass on a `(1, H, W, 3)` tensor
    fn predict(&self, input: ArrayView4<'_, f32>) -> Result<Vec<f32>>;
}

/// Classifier backed by an ONNX Runtime session
pub struct OnnxClassifier {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    model_path: PathBuf,
    name: String,
}

impl std::fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxClassifier")
            .field("name", &self.name)
            .field("model_path", &self.model_path)
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .finish()
    }
}

impl OnnxClassifier {
    /// Load an ONNX model from disk.
    ///
    /// The first graph input receives the image tensor and the first graph
    /// output is read back as the probability vector.
    pub fn load(name: impl Into<String>, model_path: impl AsRef<Path>) -> Result<Self> {
        let name = name.into();
        let path = model_path.as_ref();

        if !path.exists() {
            return Err(PaddyError::Model(format!(
                "{} model not found at '{}'",
                name,
                path.display()
            )));
        }

        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.commit_from_file(path))
            .map_err(|e| {
                PaddyError::Model(format!(
                    "failed to create ONNX session for {} from '{}': {}",
                    name,
                    path.display(),
                    e
                ))
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| PaddyError::Model(format!("{} model declares no inputs", name)))?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| PaddyError::Model(format!("{} model declares no outputs", name)))?;

        info!(
            "Loaded {} model from {:?} (input '{}', output '{}')",
            name, path, input_name, output_name
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            model_path: path.to_path_buf(),
            name,
        })
    }

    /// Returns the model path this classifier was loaded from
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, input: ArrayView4<'_, f32>) -> Result<Vec<f32>> {
        let shape = input.shape().to_vec();
        let tensor = TensorRef::from_array_view(input).map_err(|e| {
            PaddyError::Inference(format!(
                "{}: failed to convert input tensor with shape {:?}: {}",
                self.name, shape, e
            ))
        })?;

        // Session::run needs exclusive access
        let mut session = self.session.lock().map_err(|_| {
            PaddyError::Inference(format!("{}: session lock poisoned", self.name))
        })?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(|e| PaddyError::Inference(format!("{}: forward pass failed: {}", self.name, e)))?;

        let (_, probabilities) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| {
                PaddyError::Inference(format!(
                    "{}: failed to extract output '{}' as f32: {}",
                    self.name, self.output_name, e
                ))
            })?;

        Ok(probabilities.to_vec())
    }
}
