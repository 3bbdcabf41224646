use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use gaon_core::config::Settings;
use gaon_core::domain::recommendation::StoredRecommendation;
use gaon_core::llm::openai::OpenAiClient;
use gaon_core::market::cache::PriceHistoryCache;
use gaon_core::market::throttle::Throttle;
use gaon_core::market::yahoo::YahooClient;
use gaon_core::naver::NaverClient;
use gaon_core::pipeline::{AnalysisReport, Analyzer};
use gaon_core::storage::PgRecommendationStore;

const DEFAULT_LIST_LIMIT: i64 = 20;
const MAX_LIST_LIMIT: i64 = 100;

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

    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match gaon_core::storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let analyzer = match build_analyzer(&settings, pool.as_ref()) {
        Ok(analyzer) => Some(analyzer),
        Err(e) => {
            tracing::warn!(error = %e, "analysis route disabled");
            None
        }
    };

    let state = AppState { pool, analyzer };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/analyses", post(run_analysis))
        .route(
            "/recommendations/:symbol/latest",
            get(get_latest_recommendation),
        )
        .route("/recommendations/:symbol", get(list_recommendations))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[derive(Clone)]
struct AppState {
    pool: Option<PgPool>,
    analyzer: Option<Arc<Analyzer>>,
}

fn build_analyzer(settings: &Settings, pool: Option<&PgPool>) -> anyhow::Result<Arc<Analyzer>> {
    let pool = pool.context("no database pool")?;
    let throttle = Arc::new(Throttle::from_settings(settings));
    let market = Arc::new(YahooClient::from_settings(settings)?);
    let local_feed = Arc::new(NaverClient::from_settings(settings, throttle.clone())?);
    let agent = Arc::new(OpenAiClient::from_settings(settings)?);
    let store = Arc::new(PgRecommendationStore::new(pool.clone()));
    Ok(Arc::new(Analyzer::new(
        market,
        local_feed,
        agent,
        store,
        throttle,
        PriceHistoryCache::from_settings(settings),
    )))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        database: if state.pool.is_some() { "up" } else { "down" },
    })
}

#[derive(Debug, Deserialize)]
struct AnalysisRequest {
    symbol: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
}

fn error_response(status: StatusCode, message: &str) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            error: message.to_string(),
        }),
    )
}

async fn run_analysis(
    State(state): State<AppState>,
    Json(req): Json<AnalysisRequest>,
) -> Result<Json<AnalysisReport>, (StatusCode, Json<ApiError>)> {
    let Some(analyzer) = &state.analyzer else {
        return Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "analysis is not available",
        ));
    };

    let symbol = req.symbol.as_deref().unwrap_or("").trim().to_string();
    if symbol.is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "symbol is required"));
    }

    match analyzer.run(&symbol).await {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(symbol = %symbol, error = %e, "analysis run failed");
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "analysis failed",
            ))
        }
    }
}

async fn get_latest_recommendation(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<StoredRecommendation>, StatusCode> {
    let Some(pool) = &state.pool else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let row = fetch_latest(pool, &symbol).await.map_err(|e| {
        sentry_anyhow::capture_anyhow(&e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    row.map(Json).ok_or(StatusCode::NOT_FOUND)
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<i64>,
}

async fn list_recommendations(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<StoredRecommendation>>, StatusCode> {
    let Some(pool) = &state.pool else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    let rows = fetch_recent(pool, &symbol, limit).await.map_err(|e| {
        sentry_anyhow::capture_anyhow(&e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(rows))
}

type RecommendationRow = (Uuid, String, String, f64, String, DateTime<Utc>);

async fn fetch_latest(pool: &PgPool, symbol: &str) -> anyhow::Result<Option<StoredRecommendation>> {
    let row = sqlx::query_as::<_, RecommendationRow>(
        "SELECT id, symbol, recommendation, score, report, created_at \
         FROM stock_recommendations \
         WHERE symbol = $1 \
         ORDER BY created_at DESC \
         LIMIT 1",
    )
    .bind(symbol)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(into_stored))
}

async fn fetch_recent(
    pool: &PgPool,
    symbol: &str,
    limit: i64,
) -> anyhow::Result<Vec<StoredRecommendation>> {
    let rows = sqlx::query_as::<_, RecommendationRow>(
        "SELECT id, symbol, recommendation, score, report, created_at \
         FROM stock_recommendations \
         WHERE symbol = $1 \
         ORDER BY created_at DESC \
         LIMIT $2",
    )
    .bind(symbol)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(into_stored).collect())
}

fn into_stored(
    (id, symbol, recommendation, score, report, created_at): RecommendationRow,
) -> StoredRecommendation {
    StoredRecommendation {
        id,
        symbol,
        recommendation,
        score,
        report,
        created_at,
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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
