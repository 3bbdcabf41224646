use crate::domain::recommendation::RecommendationRecord;
use anyhow::Context;
use uuid::Uuid;

/// Write side of the recommendation history. The analyzer only needs
/// inserts; read queries live with the serving layer.
#[async_trait::async_trait]
pub trait RecommendationStore: Send + Sync {
    /// Inserts one normalized recommendation and returns its row id.
    async fn insert(&self, record: &RecommendationRecord) -> anyhow::Result<Uuid>;
}

#[derive(Debug, Clone)]
pub struct PgRecommendationStore {
    pool: sqlx::PgPool,
}

impl PgRecommendationStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RecommendationStore for PgRecommendationStore {
    async fn insert(&self, record: &RecommendationRecord) -> anyhow::Result<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO stock_recommendations (symbol, recommendation, score, report) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(&record.symbol)
        .bind(record.recommendation.as_str())
        .bind(record.score)
        .bind(&record.report)
        .fetch_one(&self.pool)
        .await
        .context("insert stock_recommendations failed")?;

        Ok(id)
    }
}
