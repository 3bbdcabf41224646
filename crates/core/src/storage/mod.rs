use anyhow::Context;

pub mod recommendations;

pub use recommendations::{PgRecommendationStore, RecommendationStore};

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}
