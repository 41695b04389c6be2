//! Prediction endpoints
//!
//! `POST /api/predict/` runs the full pipeline: validate the upload, store the
//! image, classify it three ways, persist the record and respond. Any failure
//! after the image is stored deletes it again, so a failed request leaves no
//! orphaned blob behind.
//!
//! The single-task variants classify without storing anything.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use image::DynamicImage;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::inference::{AgePrediction, LabelPrediction};
use crate::labels;
use crate::preprocess::decode_image;
use crate::server::error::ApiError;
use crate::server::state::SharedState;
use crate::storage::PredictionRecord;
use crate::utils::error::Result as PaddyResult;

/// Response of the combined prediction
#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub image_id: Uuid,
    pub disease: LabelPrediction,
    pub variety: LabelPrediction,
    pub age: AgePrediction,
}

/// A file part pulled out of a multipart request
struct Upload {
    filename: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

/// Find the uploaded file: the part named `file`, or else the first part
/// carrying a filename.
async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Upload, ApiError> {
    let mut multipart = multipart?;
    let mut fallback = None;

    while let Some(field) = multipart.next_field().await? {
        let is_file_field = field.name() == Some("file");
        if !is_file_field && field.file_name().is_none() {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await?;
        let upload = Upload {
            filename,
            content_type,
            data,
        };

        if is_file_field {
            return Ok(upload);
        }
        fallback.get_or_insert(upload);
    }

    fallback.ok_or_else(|| {
        ApiError::BadRequest("no file uploaded; send the image in a multipart field named 'file'".to_string())
    })
}

/// Reject parts whose declared type is clearly not an image
fn check_content_type(upload: &Upload) -> Result<(), ApiError> {
    match upload.content_type.as_deref() {
        None | Some("application/octet-stream") => Ok(()),
        Some(ct) if ct.starts_with("image/") => Ok(()),
        Some(ct) => Err(ApiError::InvalidContentType(format!(
            "expected an image upload, got content type '{}'",
            ct
        ))),
    }
}

/// Run CPU-bound work on the blocking pool
async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> PaddyResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {}", e)))?
        .map_err(ApiError::from)
}

/// Validate and decode an upload
async fn decode_upload(upload: &Upload) -> Result<Arc<DynamicImage>, ApiError> {
    check_content_type(upload)?;
    if upload.data.is_empty() {
        return Err(ApiError::BadRequest("uploaded file is empty".to_string()));
    }

    let data = upload.data.clone();
    let image = run_blocking(move || decode_image(&data)).await?;
    Ok(Arc::new(image))
}

/// Delete a blob whose request failed downstream
async fn discard_blob(state: &SharedState, image_id: Uuid) {
    if let Err(e) = state.blobs.delete(image_id).await {
        warn!("Failed to remove image {} after a failed request: {}", image_id, e);
    }
}

/// POST /api/predict/ - Store an image and run all three classifiers
pub async fn predict(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let upload = read_upload(multipart).await?;
    let image = decode_upload(&upload).await?;

    let image_id = state.blobs.put(upload.data.clone()).await?;

    let inference = Arc::clone(&state.inference);
    let classified = run_blocking(move || inference.classify_all(&image)).await;
    let prediction = match classified {
        Ok(prediction) => prediction,
        Err(e) => {
            discard_blob(&state, image_id).await;
            return Err(e);
        }
    };

    let record = PredictionRecord::new(image_id, upload.filename, prediction);
    if let Err(e) = state.records.insert(&record).await {
        discard_blob(&state, image_id).await;
        return Err(e.into());
    }

    info!(
        %image_id,
        disease = %record.disease.label,
        healthy = labels::is_healthy(&record.disease.label),
        variety = %record.variety.label,
        age_days = record.age.days,
        "Prediction stored"
    );

    Ok(Json(PredictResponse {
        image_id,
        disease: record.disease,
        variety: record.variety,
        age: record.age,
    }))
}

/// POST /api/predict/disease - Disease classification only
pub async fn predict_disease(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<LabelPrediction>, ApiError> {
    let image = decode_upload(&read_upload(multipart).await?).await?;
    let inference = Arc::clone(&state.inference);
    let prediction = run_blocking(move || inference.classify_disease(&image)).await?;
    Ok(Json(prediction))
}

/// POST /api/predict/variety - Variety identification only
pub async fn predict_variety(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<LabelPrediction>, ApiError> {
    let image = decode_upload(&read_upload(multipart).await?).await?;
    let inference = Arc::clone(&state.inference);
    let prediction = run_blocking(move || inference.identify_variety(&image)).await?;
    Ok(Json(prediction))
}

/// POST /api/predict/age - Age estimation only
pub async fn predict_age(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AgePrediction>, ApiError> {
    let image = decode_upload(&read_upload(multipart).await?).await?;
    let inference = Arc::clone(&state.inference);
    let prediction = run_blocking(move || inference.estimate_age(&image)).await?;
    Ok(Json(prediction))
}
