//! Prediction history endpoint

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::server::error::ApiError;
use crate::server::state::SharedState;
use crate::storage::PredictionRecord;

/// Default number of records returned
pub const DEFAULT_HISTORY_LIMIT: u32 = 10;

/// Largest `limit` accepted
pub const MAX_HISTORY_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

/// A stored record plus the URL its image can be fetched from
#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub record: PredictionRecord,
    pub image_url: String,
}

impl From<PredictionRecord> for HistoryEntry {
    fn from(record: PredictionRecord) -> Self {
        let image_url = format!("/api/image/{}", record.image_id);
        Self { record, image_url }
    }
}

/// Check `limit` against `1..=MAX_HISTORY_LIMIT`
pub fn validate_limit(limit: Option<u32>) -> Result<u32, ApiError> {
    let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if (1..=MAX_HISTORY_LIMIT).contains(&limit) {
        Ok(limit)
    } else {
        Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}, got {}",
            MAX_HISTORY_LIMIT, limit
        )))
    }
}

/// GET /api/history/?limit=N - Most recent predictions, newest first
pub async fn get_history(
    State(state): State<SharedState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let limit = validate_limit(query.limit)?;

    let records = state.records.recent(limit).await?;
    Ok(Json(records.into_iter().map(HistoryEntry::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_limit() {
        assert_eq!(validate_limit(None).unwrap(), DEFAULT_HISTORY_LIMIT);
        assert_eq!(validate_limit(Some(1)).unwrap(), 1);
        assert_eq!(validate_limit(Some(100)).unwrap(), 100);
        assert!(validate_limit(Some(0)).is_err());
        assert!(validate_limit(Some(101)).is_err());
    }
}
