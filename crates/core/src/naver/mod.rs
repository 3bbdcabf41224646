//! Naver Finance feeds for KRX-listed symbols.
//!
//! Two scraped sources back the research context: the per-symbol news
//! board (crawled through its iframe) and the foreign/institutional
//! trading table. Both pages are served as EUC-KR.

pub mod holdings;
pub mod html;
pub mod news;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::market::error::MarketError;
use crate::market::throttle::Throttle;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64)";
const ACCEPT_LANGUAGE: &str = "ko-KR,ko;q=0.9,en-US;q=0.8";
const DETAIL_SNIPPET_LEN: usize = 200;

/// One crawled news article. `content` is empty when the body element
/// is missing, which happens for video-only posts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsArticle {
    pub url: String,
    pub title: String,
    pub content: String,
}

/// One row of the foreign/institutional trading table, newest first.
/// Blank and dash cells come through as `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipRow {
    pub date: String,
    pub close: Option<f64>,
    pub change: Option<f64>,
    pub change_rate: Option<f64>,
    pub volume: Option<f64>,
    pub institutional_net: Option<f64>,
    pub foreign_net: Option<f64>,
    pub foreign_shares: Option<f64>,
    pub foreign_ownership: Option<f64>,
}

/// Boundary for the Korean-market research feeds. Implementations own
/// their throttle routing: every page fetch behind these methods spends
/// one slot of the shared outbound budget.
#[async_trait]
pub trait LocalFeedClient: Send + Sync {
    /// Crawls recent news articles for a six-digit KRX code.
    async fn news_articles(&self, code: &str) -> anyhow::Result<Vec<NewsArticle>>;

    /// Scrapes the foreign/institutional trading rows for a six-digit
    /// KRX code. Missing table means an empty vec, not an error.
    async fn ownership_rows(&self, code: &str) -> anyhow::Result<Vec<OwnershipRow>>;
}

pub struct NaverClient {
    http: reqwest::Client,
    base_url: String,
    throttle: Arc<Throttle>,
}

impl NaverClient {
    pub fn from_settings(settings: &Settings, throttle: Arc<Throttle>) -> anyhow::Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_static(ACCEPT_LANGUAGE),
        );
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.http_timeout_secs))
            .build()
            .context("failed to build naver http client")?;
        Ok(Self {
            http,
            base_url: settings.naver_finance_base_url.trim_end_matches('/').to_string(),
            throttle,
        })
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches a page through the shared throttle and decodes it
    /// honoring the declared charset. finance.naver.com declares
    /// EUC-KR; the article host is UTF-8. Each page here is one
    /// outbound call, so multi-page crawls pace themselves per fetch.
    pub(crate) async fn fetch_page(
        &self,
        endpoint: &'static str,
        url: &str,
        referer: Option<&str>,
    ) -> anyhow::Result<String> {
        self.throttle
            .run(endpoint, || self.fetch_page_once(endpoint, url, referer))
            .await
    }

    async fn fetch_page_once(
        &self,
        endpoint: &'static str,
        url: &str,
        referer: Option<&str>,
    ) -> anyhow::Result<String> {
        let mut request = self.http.get(url);
        if let Some(referer) = referer {
            request = request.header(header::REFERER, referer);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("request to {endpoint} failed"))?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .with_context(|| format!("failed to read {endpoint} response body"))?;
        if !status.is_success() {
            return Err(MarketError {
                endpoint,
                status: Some(status.as_u16()),
                detail: snippet(url, DETAIL_SNIPPET_LEN),
            }
            .into());
        }
        Ok(decode_body(&body, content_type.as_deref()))
    }
}

#[async_trait]
impl LocalFeedClient for NaverClient {
    async fn news_articles(&self, code: &str) -> anyhow::Result<Vec<NewsArticle>> {
        self.fetch_news_articles(code).await
    }

    async fn ownership_rows(&self, code: &str) -> anyhow::Result<Vec<OwnershipRow>> {
        self.fetch_ownership_rows(code).await
    }
}

/// Decodes a response body using the charset from `Content-Type`,
/// falling back to a meta-tag sniff for pages that omit the header.
fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    let declared = content_type.unwrap_or("").to_ascii_lowercase();
    if declared.contains("euc-kr") || declared.contains("cp949") || declared.contains("ms949") {
        let (text, _, _) = encoding_rs::EUC_KR.decode(bytes);
        return text.into_owned();
    }
    if declared.contains("utf-8") {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(1024)]).to_ascii_lowercase();
    if head.contains("euc-kr") {
        let (text, _, _) = encoding_rs::EUC_KR.decode(bytes);
        return text.into_owned();
    }
    String::from_utf8_lossy(bytes).into_owned()
}

fn snippet(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut end = limit;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_body_honors_declared_euc_kr() {
        let (encoded, _, _) = encoding_rs::EUC_KR.encode("외국인 기관 순매매 거래량");
        let decoded = decode_body(&encoded, Some("text/html; charset=EUC-KR"));
        assert_eq!(decoded, "외국인 기관 순매매 거래량");
    }

    #[test]
    fn decode_body_passes_utf8_through() {
        let decoded = decode_body("삼성전자".as_bytes(), Some("text/html; charset=UTF-8"));
        assert_eq!(decoded, "삼성전자");
    }

    #[test]
    fn decode_body_sniffs_meta_charset_when_header_is_silent() {
        let (body, _, _) = encoding_rs::EUC_KR
            .encode("<html><head><meta charset=\"euc-kr\"></head><body>코스피</body></html>");
        let decoded = decode_body(&body, None);
        assert!(decoded.contains("코스피"));
    }

    // Minimal HTTP responder so the tests can observe real fetch pacing.
    async fn serve_fixed_page() -> std::net::SocketAddr {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let (mut socket, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 2048];
                    let _ = socket.read(&mut buf).await;
                    let body = "<html><body>ok</body></html>";
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=UTF-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });
        addr
    }

    #[tokio::test]
    async fn each_page_fetch_takes_its_own_throttle_slot() {
        let addr = serve_fixed_page().await;
        let client = NaverClient {
            http: reqwest::Client::new(),
            base_url: format!("http://{addr}"),
            throttle: Arc::new(Throttle::new(
                Duration::from_millis(40),
                2,
                Duration::from_millis(5),
            )),
        };

        let url = format!("{}/item/frgn.naver?code=005930", client.base_url());
        let started = std::time::Instant::now();
        for _ in 0..3 {
            let page = client.fetch_page("naver.test_page", &url, None).await.unwrap();
            assert!(page.contains("ok"));
        }
        assert!(started.elapsed() >= Duration::from_millis(80));
    }
}
