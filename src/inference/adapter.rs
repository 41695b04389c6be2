//! Task adapters
//!
//! An adapter binds one classifier to the preprocessing it was trained with
//! and to the label table that decodes its output.

use std::sync::Arc;
use std::time::Instant;

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::classifier::Classifier;
use crate::labels;
use crate::preprocess::{preprocess, PreprocessConfig};
use crate::utils::error::{PaddyError, Result};
use crate::utils::round_confidence;

/// The three classification tasks served
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    Disease,
    Variety,
    Age,
}

impl Task {
    /// All tasks, in the order they run for a combined prediction
    pub const ALL: [Task; 3] = [Task::Disease, Task::Variety, Task::Age];

    /// Preprocessing the model for this task was trained with
    pub fn preprocess_config(&self) -> PreprocessConfig {
        match self {
            Task::Disease => PreprocessConfig::new(256, 256).with_normalize(true),
            Task::Variety => PreprocessConfig::new(128, 128).with_normalize(false),
            Task::Age => PreprocessConfig::new(128, 128).with_normalize(false),
        }
    }

    /// Number of classes the model for this task emits
    pub fn num_classes(&self) -> usize {
        match self {
            Task::Disease => labels::NUM_DISEASES,
            Task::Variety => labels::NUM_VARIETIES,
            Task::Age => labels::NUM_AGE_BUCKETS,
        }
    }

    /// Default model file name inside the models directory
    pub fn default_model_file(&self) -> &'static str {
        match self {
            Task::Disease => "disease_classification_model.onnx",
            Task::Variety => "variety_identification_model.onnx",
            Task::Age => "age_prediction_model.onnx",
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Task::Disease => write!(f, "disease"),
            Task::Variety => write!(f, "variety"),
            Task::Age => write!(f, "age"),
        }
    }
}

/// Winning class of a forward pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassScore {
    /// Index into the task's label table
    pub index: usize,
    /// Probability of that class, rounded to 4 decimal places
    pub confidence: f64,
}

/// Prediction carrying a text label (disease, variety)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelPrediction {
    pub label: String,
    pub confidence: f64,
}

/// Predicted plant age
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgePrediction {
    pub days: u32,
    pub confidence: f64,
}

/// Index and value of the largest probability.
///
/// NaN entries never win; ties go to the lowest index.
pub fn argmax(probabilities: &[f32]) -> Option<(usize, f32)> {
    probabilities
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, p)| !p.is_nan())
        .fold(None, |best, (i, p)| match best {
            Some((_, best_p)) if best_p >= p => best,
            _ => Some((i, p)),
        })
}

/// One classifier plus the preprocessing and decoding around it
pub struct TaskAdapter {
    task: Task,
    preprocess: PreprocessConfig,
    classifier: Arc<dyn Classifier>,
}

impl TaskAdapter {
    /// Create an adapter using the task's default preprocessing
    pub fn new(task: Task, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            task,
            preprocess: task.preprocess_config(),
            classifier,
        }
    }

    pub fn preprocess_config(&self) -> &PreprocessConfig {
        &self.preprocess
    }

    /// Preprocess, run the forward pass and pick the winning class
    pub fn classify(&self, image: &DynamicImage) -> Result<ClassScore> {
        let input = preprocess(image, &self.preprocess)?;

        let start = Instant::now();
        let probabilities = self.classifier.predict(input.view())?;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let expected = self.task.num_classes();
        if probabilities.len() != expected {
            return Err(PaddyError::Inference(format!(
                "{} model '{}' returned {} scores, expected {}",
                self.task,
                self.classifier.name(),
                probabilities.len(),
                expected
            )));
        }

        let (index, probability) = argmax(&probabilities).ok_or_else(|| {
            PaddyError::Inference(format!("{} model returned no usable scores", self.task))
        })?;

        debug!(
            task = %self.task,
            index,
            probability,
            "inference completed in {:.2} ms",
            elapsed_ms
        );

        Ok(ClassScore {
            index,
            confidence: round_confidence(probability),
        })
    }

    /// Classify and decode through a text label table
    pub fn classify_label(&self, image: &DynamicImage) -> Result<LabelPrediction> {
        let score = self.classify(image)?;
        let label = match self.task {
            Task::Disease => labels::disease_name(score.index),
            Task::Variety => labels::variety_name(score.index),
            Task::Age => None,
        }
        .ok_or_else(|| {
            PaddyError::Inference(format!("{} has no text label for class {}", self.task, score.index))
        })?;

        Ok(LabelPrediction {
            label: label.to_string(),
            confidence: score.confidence,
        })
    }

    /// Classify and decode through the age table
    pub fn classify_age(&self, image: &DynamicImage) -> Result<AgePrediction> {
        let score = self.classify(image)?;
        let days = match self.task {
            Task::Age => labels::age_days(score.index),
            _ => None,
        }
        .ok_or_else(|| {
            PaddyError::Inference(format!("{} has no age bucket for class {}", self.task, score.index))
        })?;

        Ok(AgePrediction {
            days,
            confidence: score.confidence,
        })
    }
}
