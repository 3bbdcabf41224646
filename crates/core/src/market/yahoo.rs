use crate::config::Settings;
use crate::market::error::MarketError;
use crate::market::{coerce_num, Interval, MarketDataClient, NewsStory, PriceBar, QuoteSnapshot};
use anyhow::Context;
use chrono::{DateTime, Months, Utc};
use serde_json::Value;
use std::time::Duration;

const EP_QUOTE: &str = "yahoo.quote";
const EP_CHART: &str = "yahoo.chart";
const EP_SEARCH: &str = "yahoo.search";
const EP_SUMMARY: &str = "yahoo.quote_summary";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64)";
const DETAIL_SNIPPET_LEN: usize = 200;

#[derive(Debug, Clone)]
pub struct YahooClient {
    http: reqwest::Client,
    base_url: String,
}

impl YahooClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.http_timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            base_url: settings.yahoo_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(
        &self,
        endpoint: &'static str,
        path: &str,
        query: &[(&str, String)],
    ) -> anyhow::Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let res = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("{endpoint} request failed"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .with_context(|| format!("failed to read {endpoint} response body"))?;
        if !status.is_success() {
            return Err(MarketError {
                endpoint,
                status: Some(status.as_u16()),
                detail: snippet(&text),
            }
            .into());
        }

        match serde_json::from_str(&text) {
            Ok(value) => Ok(value),
            Err(_) => Err(MarketError {
                endpoint,
                status: None,
                detail: format!("non-JSON response: {}", snippet(&text)),
            }
            .into()),
        }
    }
}

#[async_trait::async_trait]
impl MarketDataClient for YahooClient {
    async fn quote(&self, symbol: &str) -> anyhow::Result<QuoteSnapshot> {
        let payload = self
            .get_json(EP_QUOTE, "/v7/finance/quote", &[("symbols", symbol.to_string())])
            .await?;
        parse_quote(&payload, symbol)
    }

    async fn chart(
        &self,
        symbol: &str,
        months: u32,
        interval: Interval,
    ) -> anyhow::Result<Vec<PriceBar>> {
        let now = Utc::now();
        let period1 = now
            .checked_sub_months(Months::new(months))
            .with_context(|| format!("lookback of {months} months underflows"))?
            .timestamp();
        let query = [
            ("period1", period1.to_string()),
            ("period2", now.timestamp().to_string()),
            ("interval", interval.as_str().to_string()),
        ];
        let payload = self
            .get_json(EP_CHART, &format!("/v8/finance/chart/{symbol}"), &query)
            .await?;
        normalize_chart(&payload)
    }

    async fn search_news(
        &self,
        query: &str,
        news_count: u32,
        quotes_count: u32,
    ) -> anyhow::Result<Vec<NewsStory>> {
        let query = [
            ("q", query.to_string()),
            ("newsCount", news_count.to_string()),
            ("quotesCount", quotes_count.to_string()),
        ];
        let payload = self
            .get_json(EP_SEARCH, "/v1/finance/search", &query)
            .await?;
        Ok(parse_news(&payload))
    }

    async fn quote_summary(&self, symbol: &str, modules: &[&str]) -> anyhow::Result<Value> {
        let query = [("modules", modules.join(","))];
        let payload = self
            .get_json(
                EP_SUMMARY,
                &format!("/v10/finance/quoteSummary/{symbol}"),
                &query,
            )
            .await?;
        summary_result(&payload)
    }
}

fn parse_quote(payload: &Value, fallback_symbol: &str) -> anyhow::Result<QuoteSnapshot> {
    let result = match payload.pointer("/quoteResponse/result/0") {
        Some(result) => result,
        None => {
            return Err(MarketError {
                endpoint: EP_QUOTE,
                status: None,
                detail: format!("no quote result for {fallback_symbol}"),
            }
            .into());
        }
    };

    let text = |key: &str| {
        result
            .get(key)
            .and_then(Value::as_str)
            .map(|s| s.to_string())
    };

    Ok(QuoteSnapshot {
        symbol: result
            .get("symbol")
            .and_then(Value::as_str)
            .unwrap_or(fallback_symbol)
            .to_string(),
        short_name: text("shortName"),
        regular_market_price: result.get("regularMarketPrice").and_then(coerce_num),
        currency: text("currency"),
        market_state: text("marketState"),
    })
}

fn normalize_chart(payload: &Value) -> anyhow::Result<Vec<PriceBar>> {
    if let Some(err) = payload.pointer("/chart/error") {
        if !err.is_null() {
            return Err(MarketError {
                endpoint: EP_CHART,
                status: None,
                detail: err.to_string(),
            }
            .into());
        }
    }

    let result = match payload.pointer("/chart/result/0") {
        Some(result) => result,
        None => return Ok(Vec::new()),
    };

    let timestamps = result
        .get("timestamp")
        .and_then(Value::as_array)
        .map(|v| v.as_slice())
        .unwrap_or(&[]);
    let quote = result.pointer("/indicators/quote/0");
    let opens = series(quote, "open");
    let highs = series(quote, "high");
    let lows = series(quote, "low");
    let closes = series(quote, "close");
    let volumes = series(quote, "volume");

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, ts) in timestamps.iter().enumerate() {
        let date = ts
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.date_naive());
        bars.push(PriceBar {
            date,
            open: num_at(opens, i),
            high: num_at(highs, i),
            low: num_at(lows, i),
            close: num_at(closes, i),
            volume: num_at(volumes, i),
        });
    }
    Ok(bars)
}

fn series<'a>(quote: Option<&'a Value>, key: &str) -> &'a [Value] {
    quote
        .and_then(|q| q.get(key))
        .and_then(Value::as_array)
        .map(|v| v.as_slice())
        .unwrap_or(&[])
}

fn num_at(values: &[Value], idx: usize) -> Option<f64> {
    values
        .get(idx)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
}

fn parse_news(payload: &Value) -> Vec<NewsStory> {
    payload
        .get("news")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

fn summary_result(payload: &Value) -> anyhow::Result<Value> {
    if let Some(err) = payload.pointer("/quoteSummary/error") {
        if !err.is_null() {
            return Err(MarketError {
                endpoint: EP_SUMMARY,
                status: None,
                detail: err.to_string(),
            }
            .into());
        }
    }
    Ok(payload
        .pointer("/quoteSummary/result/0")
        .cloned()
        .unwrap_or(Value::Null))
}

fn snippet(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.len() <= DETAIL_SNIPPET_LEN {
        return trimmed.to_string();
    }
    let mut end = DETAIL_SNIPPET_LEN;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn normalize_chart_zips_series_and_keeps_gaps() {
        let payload = json!({
            "chart": {
                "result": [{
                    "timestamp": [1_600_000_000, 1_600_086_400],
                    "indicators": {
                        "quote": [{
                            "open": [100.0, 101.5],
                            "high": [102.0, 103.0],
                            "low": [99.0, 100.5],
                            "close": [101.0, null],
                            "volume": [1_000_000.0, null],
                        }],
                    },
                }],
                "error": null,
            },
        });

        let bars = normalize_chart(&payload).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2020, 9, 13));
        assert_eq!(bars[0].close, Some(101.0));
        assert_eq!(bars[1].close, None);
        assert_eq!(bars[1].volume, None);
    }

    #[test]
    fn normalize_chart_reports_provider_errors() {
        let payload = json!({
            "chart": {
                "result": null,
                "error": {"code": "Not Found", "description": "No data found"},
            },
        });
        let err = normalize_chart(&payload).unwrap_err();
        assert!(err.to_string().contains("No data found"));
    }

    #[test]
    fn normalize_chart_tolerates_missing_result() {
        let bars = normalize_chart(&json!({"chart": {"error": null}})).unwrap();
        assert!(bars.is_empty());
    }

    #[test]
    fn parse_quote_reads_normalized_fields() {
        let payload = json!({
            "quoteResponse": {
                "result": [{
                    "symbol": "005930.KS",
                    "shortName": "Samsung Electronics",
                    "regularMarketPrice": 71_000.0,
                    "currency": "KRW",
                    "marketState": "CLOSED",
                }],
                "error": null,
            },
        });
        let quote = parse_quote(&payload, "005930.KS").unwrap();
        assert_eq!(quote.symbol, "005930.KS");
        assert_eq!(quote.regular_market_price, Some(71_000.0));
        assert_eq!(quote.currency.as_deref(), Some("KRW"));
    }

    #[test]
    fn parse_quote_fails_on_empty_result() {
        let payload = json!({"quoteResponse": {"result": [], "error": null}});
        assert!(parse_quote(&payload, "NOPE").is_err());
    }

    #[test]
    fn parse_news_skips_undecodable_items() {
        let payload = json!({
            "news": [
                {"title": "Chip demand rebounds", "publisher": "Reuters", "link": "https://n.example/1"},
                "garbage",
                {"title": null, "providerPublishTime": 1_700_000_000},
            ],
        });
        let stories = parse_news(&payload);
        assert_eq!(stories.len(), 2);
        assert_eq!(stories[0].title.as_deref(), Some("Chip demand rebounds"));
        assert_eq!(stories[1].provider_publish_time, Some(1_700_000_000));
    }

    #[test]
    fn summary_result_unwraps_first_result() {
        let payload = json!({
            "quoteSummary": {
                "result": [{"financialData": {"returnOnEquity": {"raw": 0.21}}}],
                "error": null,
            },
        });
        let result = summary_result(&payload).unwrap();
        assert!(result.get("financialData").is_some());
    }

    #[test]
    fn summary_result_propagates_provider_error() {
        let payload = json!({
            "quoteSummary": {"result": null, "error": {"code": "Not Found"}},
        });
        assert!(summary_result(&payload).is_err());
    }
}
