pub mod cache;
pub mod error;
pub mod throttle;
pub mod yahoo;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Bar interval accepted by the chart endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[default]
    #[serde(rename = "1d")]
    Daily,
    #[serde(rename = "1wk")]
    Weekly,
    #[serde(rename = "1mo")]
    Monthly,
}

impl Interval {
    pub fn as_str(self) -> &'static str {
        match self {
            Interval::Daily => "1d",
            Interval::Weekly => "1wk",
            Interval::Monthly => "1mo",
        }
    }
}

/// One normalized bar. Providers ship gaps, so every field is optional;
/// bars are ordered chronologically ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: Option<NaiveDate>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub symbol: String,
    pub short_name: Option<String>,
    pub regular_market_price: Option<f64>,
    pub currency: Option<String>,
    pub market_state: Option<String>,
}

/// Provider-shaped news item from the search endpoint; passed through to
/// the research context as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsStory {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub provider_publish_time: Option<i64>,
}

/// Market-data boundary. Implementations return provider-shaped payloads
/// normalized just enough to be safe (missing fields become None); callers
/// route every invocation through the shared `Throttle`.
#[async_trait::async_trait]
pub trait MarketDataClient: Send + Sync {
    async fn quote(&self, symbol: &str) -> anyhow::Result<QuoteSnapshot>;

    async fn chart(
        &self,
        symbol: &str,
        months: u32,
        interval: Interval,
    ) -> anyhow::Result<Vec<PriceBar>>;

    async fn search_news(
        &self,
        query: &str,
        news_count: u32,
        quotes_count: u32,
    ) -> anyhow::Result<Vec<NewsStory>>;

    /// Raw quoteSummary result object for the requested modules; the
    /// financial context builder digs into it defensively.
    async fn quote_summary(&self, symbol: &str, modules: &[&str]) -> anyhow::Result<Value>;
}

/// Coerces the numeric shapes financial payloads actually ship: a plain
/// number, a numeric string, or a `{raw, fmt}` wrapper. Everything else,
/// including non-finite values, is None.
pub fn coerce_num(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        Value::Object(map) => match map.get("raw") {
            Some(Value::Number(n)) => n.as_f64().filter(|v| v.is_finite()),
            _ => None,
        },
        _ => None,
    }
}
