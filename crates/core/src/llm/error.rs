use crate::llm::Provider;
use serde_json::Value;
use std::fmt;

/// Agent failure with everything needed to debug it offline: the raw
/// model output and, when available, the full response JSON.
#[derive(Debug, Clone)]
pub struct AgentError {
    pub provider: Provider,
    pub stage: &'static str,
    pub detail: String,
    pub status: Option<u16>,
    pub raw_output: Option<String>,
    pub raw_response_json: Option<Value>,
}

impl AgentError {
    pub fn is_rate_limited(&self) -> bool {
        self.status == Some(429) || self.detail.contains("Too Many Requests")
    }
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "agent error (provider={:?}, stage={}): {}",
            self.provider, self.stage, self.detail
        )
    }
}

impl std::error::Error for AgentError {}
