use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use gaon_core::config::Settings;
use gaon_core::domain::recommendation::RecommendationRecord;
use gaon_core::llm::error::AgentError;
use gaon_core::llm::openai::OpenAiClient;
use gaon_core::market::cache::PriceHistoryCache;
use gaon_core::market::throttle::Throttle;
use gaon_core::market::yahoo::YahooClient;
use gaon_core::market::MarketDataClient;
use gaon_core::naver::NaverClient;
use gaon_core::pipeline::Analyzer;
use gaon_core::storage::{PgRecommendationStore, RecommendationStore};

#[derive(Debug, Parser)]
#[command(name = "gaon_worker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the full analysis pipeline for one symbol.
    Analyze {
        symbol: String,

        /// Do everything except writing to the database.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the normalized quote snapshot for one symbol.
    Quote { symbol: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let result = match args.command {
        Command::Analyze { symbol, dry_run } => analyze(&settings, &symbol, dry_run).await,
        Command::Quote { symbol } => quote(&settings, &symbol).await,
    };

    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        if let Some(diag) = err.chain().find_map(|c| c.downcast_ref::<AgentError>()) {
            tracing::error!(
                stage = diag.stage,
                raw_output = diag.raw_output.as_deref().unwrap_or(""),
                "agent diagnostics"
            );
        }
        tracing::error!(error = %format!("{err:#}"), "worker command failed");
    }
    result
}

async fn analyze(settings: &Settings, symbol: &str, dry_run: bool) -> anyhow::Result<()> {
    let store: Arc<dyn RecommendationStore> = if dry_run {
        Arc::new(DryRunStore)
    } else {
        let db_url = settings.require_database_url()?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
            .context("connect DATABASE_URL failed")?;
        gaon_core::storage::migrate(&pool).await?;
        Arc::new(PgRecommendationStore::new(pool))
    };

    let throttle = Arc::new(Throttle::from_settings(settings));
    let analyzer = Analyzer::new(
        Arc::new(YahooClient::from_settings(settings)?),
        Arc::new(NaverClient::from_settings(settings, throttle.clone())?),
        Arc::new(OpenAiClient::from_settings(settings)?),
        store,
        throttle,
        PriceHistoryCache::from_settings(settings),
    );

    let report = analyzer.run(symbol).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn quote(settings: &Settings, symbol: &str) -> anyhow::Result<()> {
    let market = YahooClient::from_settings(settings)?;
    let throttle = Throttle::from_settings(settings);

    let snapshot = throttle.run("yahoo.quote", || market.quote(symbol)).await?;

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

/// Stand-in store for `analyze --dry-run`: logs the verdict instead of
/// inserting it.
struct DryRunStore;

#[async_trait::async_trait]
impl RecommendationStore for DryRunStore {
    async fn insert(&self, record: &RecommendationRecord) -> anyhow::Result<Uuid> {
        tracing::info!(
            symbol = %record.symbol,
            verdict = record.recommendation.as_str(),
            score = record.score,
            "dry run; skipping insert"
        );
        Ok(Uuid::nil())
    }
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
