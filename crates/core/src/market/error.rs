use std::fmt;

/// Failure surfaced by a market-data or scraping endpoint, annotated so
/// callers can tell rate limiting apart from everything else.
#[derive(Debug, Clone)]
pub struct MarketError {
    pub endpoint: &'static str,
    pub status: Option<u16>,
    pub detail: String,
}

impl MarketError {
    pub fn is_rate_limited(&self) -> bool {
        self.status == Some(429) || self.detail.contains("Too Many Requests")
    }
}

impl fmt::Display for MarketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(
                f,
                "market error (endpoint={}, status={status}): {}",
                self.endpoint, self.detail
            ),
            None => write!(
                f,
                "market error (endpoint={}): {}",
                self.endpoint, self.detail
            ),
        }
    }
}

impl std::error::Error for MarketError {}

/// True when any cause in the chain is a rate-limited `MarketError` or
/// `AgentError`; the throttle retries both kinds.
pub fn is_rate_limited(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        if let Some(market) = cause.downcast_ref::<MarketError>() {
            return market.is_rate_limited();
        }
        if let Some(agent) = cause.downcast_ref::<crate::llm::error::AgentError>() {
            return agent.is_rate_limited();
        }
        false
    })
}
