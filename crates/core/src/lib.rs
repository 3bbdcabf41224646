pub mod domain;
pub mod indicators;
pub mod llm;
pub mod market;
pub mod naver;
pub mod pipeline;
pub mod storage;

pub mod config {
    use anyhow::Context;

    pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1-mini";
    pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
    pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
    pub const DEFAULT_NAVER_FINANCE_BASE_URL: &str = "https://finance.naver.com";
    pub const DEFAULT_MIN_CALL_GAP_MS: u64 = 1_000;
    pub const DEFAULT_RETRY_LIMIT: u32 = 2;
    pub const DEFAULT_RETRY_PAUSE_MS: u64 = 1_500;
    pub const DEFAULT_PRICE_CACHE_TTL_SECS: u64 = 300;
    pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub openai_api_key: Option<String>,
        pub openai_model: String,
        pub openai_base_url: String,
        pub yahoo_base_url: String,
        pub naver_finance_base_url: String,
        pub sentry_dsn: Option<String>,
        pub min_call_gap_ms: u64,
        pub retry_limit: u32,
        pub retry_pause_ms: u64,
        pub price_cache_ttl_secs: u64,
        pub http_timeout_secs: u64,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
                openai_model: std::env::var("OPENAI_MODEL")
                    .unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.to_string()),
                openai_base_url: std::env::var("OPENAI_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.to_string()),
                yahoo_base_url: std::env::var("YAHOO_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_YAHOO_BASE_URL.to_string()),
                naver_finance_base_url: std::env::var("NAVER_FINANCE_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_NAVER_FINANCE_BASE_URL.to_string()),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                min_call_gap_ms: env_u64("MARKET_MIN_CALL_GAP_MS", DEFAULT_MIN_CALL_GAP_MS),
                retry_limit: std::env::var("MARKET_RETRY_LIMIT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_RETRY_LIMIT),
                retry_pause_ms: env_u64("MARKET_RETRY_PAUSE_MS", DEFAULT_RETRY_PAUSE_MS),
                price_cache_ttl_secs: env_u64("PRICE_CACHE_TTL_SECS", DEFAULT_PRICE_CACHE_TTL_SECS),
                http_timeout_secs: env_u64("HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_openai_api_key(&self) -> anyhow::Result<&str> {
            self.openai_api_key
                .as_deref()
                .context("OPENAI_API_KEY is required")
        }
    }

    fn env_u64(name: &str, default: u64) -> u64 {
        std::env::var(name)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default)
    }
}
