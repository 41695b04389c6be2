//! Inference service
//!
//! Owns the three task adapters for the lifetime of the server. Built once at
//! startup (or injected in tests) and shared read-only between requests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::adapter::{AgePrediction, LabelPrediction, Task, TaskAdapter};
use super::classifier::{Classifier, OnnxClassifier};
use crate::utils::error::Result;

/// Locations of the three model artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPaths {
    pub disease: PathBuf,
    pub variety: PathBuf,
    pub age: PathBuf,
}

impl ModelPaths {
    /// Default file names inside `models_dir`
    pub fn in_dir(models_dir: &Path) -> Self {
        Self {
            disease: models_dir.join(Task::Disease.default_model_file()),
            variety: models_dir.join(Task::Variety.default_model_file()),
            age: models_dir.join(Task::Age.default_model_file()),
        }
    }

    pub fn get(&self, task: Task) -> &Path {
        match task {
            Task::Disease => &self.disease,
            Task::Variety => &self.variety,
            Task::Age => &self.age,
        }
    }
}

/// All three predictions for one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedPrediction {
    pub disease: LabelPrediction,
    pub variety: LabelPrediction,
    pub age: AgePrediction,
}

/// The disease, variety and age classifiers
pub struct InferenceService {
    disease: TaskAdapter,
    variety: TaskAdapter,
    age: TaskAdapter,
}

impl InferenceService {
    /// Build a service from already constructed classifiers
    pub fn new(
        disease: Arc<dyn Classifier>,
        variety: Arc<dyn Classifier>,
        age: Arc<dyn Classifier>,
    ) -> Self {
        Self {
            disease: TaskAdapter::new(Task::Disease, disease),
            variety: TaskAdapter::new(Task::Variety, variety),
            age: TaskAdapter::new(Task::Age, age),
        }
    }

    /// Load the three ONNX models from disk
    pub fn load(paths: &ModelPaths) -> Result<Self> {
        let load = |task: Task| -> Result<Arc<dyn Classifier>> {
            Ok(Arc::new(OnnxClassifier::load(task.to_string(), paths.get(task))?))
        };
        let service = Self::new(load(Task::Disease)?, load(Task::Variety)?, load(Task::Age)?);
        info!("All {} models loaded", Task::ALL.len());
        Ok(service)
    }

    /// Get the adapter serving a task
    pub fn adapter(&self, task: Task) -> &TaskAdapter {
        match task {
            Task::Disease => &self.disease,
            Task::Variety => &self.variety,
            Task::Age => &self.age,
        }
    }

    pub fn classify_disease(&self, image: &DynamicImage) -> Result<LabelPrediction> {
        self.disease.classify_label(image)
    }

    pub fn identify_variety(&self, image: &DynamicImage) -> Result<LabelPrediction> {
        self.variety.classify_label(image)
    }

    pub fn estimate_age(&self, image: &DynamicImage) -> Result<AgePrediction> {
        self.age.classify_age(image)
    }

    /// Run all three classifiers; any failure fails the whole prediction
    pub fn classify_all(&self, image: &DynamicImage) -> Result<CombinedPrediction> {
        Ok(CombinedPrediction {
            disease: self.classify_disease(image)?,
            variety: self.identify_variety(image)?,
            age: self.estimate_age(image)?,
        })
    }
}
