//! Stored image retrieval

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::server::error::ApiError;
use crate::server::state::SharedState;

/// MIME type sniffed from the stored bytes
pub fn sniff_content_type(data: &[u8]) -> &'static str {
    image::guess_format(data)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

/// GET /api/image/:id - Raw bytes of a stored upload
pub async fn get_image(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let image_id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::InvalidId(format!("'{}' is not a valid image id", id)))?;

    let data = state.blobs.get(image_id).await?;
    let content_type = sniff_content_type(&data);

    Ok(([(header::CONTENT_TYPE, content_type)], data))
}
