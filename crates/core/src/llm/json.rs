use anyhow::Context;
use serde::de::DeserializeOwned;

pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        // Remove Markdown fences (```json ... ``` or ``` ... ```).
        let mut inner = trimmed;
        if let Some(after_first) = inner.splitn(2, '\n').nth(1) {
            inner = after_first;
        }
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        return Some(inner.trim().to_string());
    }

    // Best-effort extraction: first '{' to last '}'.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

/// Decodes an agent text payload into the expected schema type. Output
/// that cannot be made schema-conformant is a hard failure; there is
/// no retry at this layer.
pub fn parse_payload<T: DeserializeOwned>(text: &str) -> anyhow::Result<T> {
    let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    serde_json::from_str::<T>(&json_str)
        .with_context(|| format!("agent output is not valid JSON for the response schema: {json_str}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::contract::FinancialAnalysis;
    use serde_json::{json, Value};

    #[test]
    fn extract_json_handles_fenced_blocks() {
        let body = "{\"a\":1}";
        let fenced = format!("```json\n{body}\n```\n");
        assert_eq!(extract_json(&fenced), Some(body.to_string()));
    }

    #[test]
    fn extract_json_falls_back_to_braces() {
        let s = "prefix {\"a\":1} suffix";
        assert_eq!(extract_json(s), Some("{\"a\":1}".to_string()));
    }

    #[test]
    fn parse_payload_accepts_plain_schema_json() {
        let text = json!({
            "symbol": "005930.KS",
            "revenue_yoy": 12.4,
            "eps_yoy": null,
            "roe": 9.1,
            "debt_to_equity": 45.0,
            "cash_flow": 1.2e12,
        })
        .to_string();

        let parsed: FinancialAnalysis = parse_payload(&text).unwrap();
        assert_eq!(parsed.symbol, "005930.KS");
        assert_eq!(parsed.eps_yoy, None);
        assert_eq!(parsed.revenue_yoy, Some(12.4));
    }

    #[test]
    fn parse_payload_strips_fences_before_decoding() {
        let fenced = "```json\n{\"symbol\":\"AAPL\",\"revenue_yoy\":null,\"eps_yoy\":null,\"roe\":null,\"debt_to_equity\":null,\"cash_flow\":null}\n```";
        let parsed: FinancialAnalysis = parse_payload(fenced).unwrap();
        assert_eq!(parsed.symbol, "AAPL");
        assert_eq!(parsed.revenue_yoy, None);
    }

    #[test]
    fn parse_payload_rejects_prose() {
        let err = parse_payload::<Value>("the model declined to answer").unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn parse_payload_rejects_schema_mismatch() {
        let text = "{\"symbol\": 42}";
        assert!(parse_payload::<FinancialAnalysis>(text).is_err());
    }
}
