//! Prediction record repository
//!
//! Records are append-only: one row per combined prediction, never updated
//! or deleted. History queries read them newest first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::inference::{AgePrediction, CombinedPrediction, LabelPrediction};
use crate::utils::error::{PaddyError, Result};

/// Stored outcome of one combined prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub image_id: Uuid,
    pub filename: Option<String>,
    pub disease: LabelPrediction,
    pub variety: LabelPrediction,
    pub age: AgePrediction,
    pub timestamp: DateTime<Utc>,
}

impl PredictionRecord {
    /// Create a record stamped with the current time
    pub fn new(image_id: Uuid, filename: Option<String>, prediction: CombinedPrediction) -> Self {
        Self {
            image_id,
            filename,
            disease: prediction.disease,
            variety: prediction.variety,
            age: prediction.age,
            timestamp: Utc::now(),
        }
    }
}

/// Metadata store for prediction records
#[async_trait]
pub trait PredictionRepository: Send + Sync {
    /// Persist a new record
    async fn insert(&self, record: &PredictionRecord) -> Result<()>;

    /// Most recent records, newest first, at most `limit`
    async fn recent(&self, limit: u32) -> Result<Vec<PredictionRecord>>;
}

/// Creates a connection pool to the `PostgreSQL` database.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Runs all pending migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| PaddyError::Database(format!("migration failed: {}", e)))
}

#[derive(Debug, sqlx::FromRow)]
struct PredictionRow {
    image_id: Uuid,
    filename: Option<String>,
    disease_label: String,
    disease_confidence: f64,
    variety_label: String,
    variety_confidence: f64,
    age_days: i32,
    age_confidence: f64,
    created_at: DateTime<Utc>,
}

impl TryFrom<PredictionRow> for PredictionRecord {
    type Error = PaddyError;

    fn try_from(row: PredictionRow) -> Result<Self> {
        let days = u32::try_from(row.age_days).map_err(|_| {
            PaddyError::Database(format!(
                "record {} has negative age {}",
                row.image_id, row.age_days
            ))
        })?;

        Ok(Self {
            image_id: row.image_id,
            filename: row.filename,
            disease: LabelPrediction {
                label: row.disease_label,
                confidence: row.disease_confidence,
            },
            variety: LabelPrediction {
                label: row.variety_label,
                confidence: row.variety_confidence,
            },
            age: AgePrediction {
                days,
                confidence: row.age_confidence,
            },
            timestamp: row.created_at,
        })
    }
}

/// Repository backed by the `predictions` table in PostgreSQL
#[derive(Debug, Clone)]
pub struct PgPredictionRepository {
    pool: PgPool,
}

impl PgPredictionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect, apply migrations and return a ready repository
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PredictionRepository for PgPredictionRepository {
    async fn insert(&self, record: &PredictionRecord) -> Result<()> {
        let age_days = i32::try_from(record.age.days)
            .map_err(|_| PaddyError::InvalidInput(format!("age {} out of range", record.age.days)))?;

        sqlx::query(
            r#"
            INSERT INTO predictions (
                image_id, filename,
                disease_label, disease_confidence,
                variety_label, variety_confidence,
                age_days, age_confidence,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.image_id)
        .bind(&record.filename)
        .bind(&record.disease.label)
        .bind(record.disease.confidence)
        .bind(&record.variety.label)
        .bind(record.variety.confidence)
        .bind(age_days)
        .bind(record.age.confidence)
        .bind(record.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<PredictionRecord>> {
        let rows = sqlx::query_as::<_, PredictionRow>(
            r#"
            SELECT image_id, filename,
                   disease_label, disease_confidence,
                   variety_label, variety_confidence,
                   age_days, age_confidence,
                   created_at
            FROM predictions
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PredictionRecord::try_from).collect()
    }
}

/// Process-local repository, used when no database is configured
#[derive(Debug, Default)]
pub struct InMemoryPredictionRepository {
    records: RwLock<Vec<PredictionRecord>>,
}

impl InMemoryPredictionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl PredictionRepository for InMemoryPredictionRepository {
    async fn insert(&self, record: &PredictionRecord) -> Result<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<PredictionRecord>> {
        let records = self.records.read().await;

        // Later inserts win ties on timestamp
        let mut newest_first: Vec<PredictionRecord> = records.iter().rev().cloned().collect();
        newest_first.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        newest_first.truncate(limit as usize);

        Ok(newest_first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(seconds_ago: i64, label: &str) -> PredictionRecord {
        PredictionRecord {
            image_id: Uuid::new_v4(),
            filename: Some(format!("{}.jpg", label)),
            disease: LabelPrediction {
                label: label.to_string(),
                confidence: 0.9,
            },
            variety: LabelPrediction {
                label: "Ponni".to_string(),
                confidence: 0.8,
            },
            age: AgePrediction {
                days: 60,
                confidence: 0.7,
            },
            timestamp: Utc::now() - Duration::seconds(seconds_ago),
        }
    }

    #[tokio::test]
    async fn test_in_memory_recent_is_newest_first() {
        let repo = InMemoryPredictionRepository::new();
        repo.insert(&record(30, "Blast")).await.unwrap();
        repo.insert(&record(10, "Hispa")).await.unwrap();
        repo.insert(&record(20, "Tungro")).await.unwrap();

        let recent = repo.recent(10).await.unwrap();
        let labels: Vec<&str> = recent.iter().map(|r| r.disease.label.as_str()).collect();
        assert_eq!(labels, vec!["Hispa", "Tungro", "Blast"]);
    }

    #[tokio::test]
    async fn test_in_memory_recent_respects_limit() {
        let repo = InMemoryPredictionRepository::new();
        for i in 0..5 {
            repo.insert(&record(i, "Normal")).await.unwrap();
        }

        assert_eq!(repo.recent(2).await.unwrap().len(), 2);
        assert_eq!(repo.len().await, 5);
        assert!(!repo.is_empty().await);
        assert!(InMemoryPredictionRepository::new().is_empty().await);
    }

    #[test]
    fn test_row_with_negative_age_is_rejected() {
        let row = PredictionRow {
            image_id: Uuid::new_v4(),
            filename: None,
            disease_label: "Blast".to_string(),
            disease_confidence: 0.5,
            variety_label: "RR".to_string(),
            variety_confidence: 0.5,
            age_days: -1,
            age_confidence: 0.5,
            created_at: Utc::now(),
        };
        assert!(PredictionRecord::try_from(row).is_err());
    }

    #[test]
    fn test_record_serializes_nested_predictions() {
        let json = serde_json::to_value(record(0, "Blast")).unwrap();
        assert_eq!(json["disease"]["label"], "Blast");
        assert_eq!(json["age"]["days"], 60);
        assert!(json["image_id"].is_string());
    }
}
