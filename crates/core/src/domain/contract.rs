//! Wire contracts for the four structured-generation stages.
//!
//! These deserialize exactly what the schemas in `llm::schema` request.
//! The three analysis shapes are strict; the recommendation draft is kept
//! permissive on purpose and coerced into a `RecommendationRecord` by
//! `normalize`, which is total (it never fails, it substitutes defaults).

use crate::domain::recommendation::{RecommendationRecord, Verdict};
use crate::indicators::Trend;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Upper bound kept after generation; the prompt asks for 3-5.
pub const MAX_TOP_HEADLINES: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchAnalysis {
    pub symbol: String,
    pub sentiment: SentimentAssessment,
    pub ownership: OwnershipAssessment,
}

impl ResearchAnalysis {
    pub fn clamp_headlines(mut self) -> Self {
        self.sentiment.top_headlines.truncate(MAX_TOP_HEADLINES);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentAssessment {
    pub score: Option<f64>,
    pub top_headlines: Vec<HeadlineAssessment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadlineAssessment {
    pub title: String,
    pub link: String,
    pub sentiment: HeadlineTone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadlineTone {
    Pos,
    Neg,
    Neu,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnershipAssessment {
    pub institutional: OwnershipSide,
    pub foreign: OwnershipSide,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnershipSide {
    pub current_pct: Option<f64>,
    pub delta_1d: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalAnalysis {
    pub symbol: String,
    pub rsi: Option<f64>,
    pub macd: MacdAssessment,
    pub support_levels: Vec<f64>,
    pub resistance_levels: Vec<f64>,
    pub trend: Trend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacdAssessment {
    pub macd: Option<f64>,
    pub signal: Option<f64>,
    pub hist: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialAnalysis {
    pub symbol: String,
    pub revenue_yoy: Option<f64>,
    pub eps_yoy: Option<f64>,
    pub roe: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub cash_flow: Option<f64>,
}

/// Raw synthesis output before normalization. Fields stay as `Value` so a
/// malformed draft still lands here and gets coerced rather than rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationDraft {
    #[serde(default)]
    pub symbol: Value,
    #[serde(default)]
    pub recommendation: Value,
    #[serde(default)]
    pub report: Value,
    #[serde(default)]
    pub score: Value,
}

impl RecommendationDraft {
    /// Coerces the draft into a record: fall back to the input symbol,
    /// uppercase the label (anything outside BUY/SELL/HOLD becomes HOLD),
    /// non-numeric score becomes 0 and numeric scores clamp into [0,100],
    /// non-string report becomes empty.
    pub fn normalize(self, fallback_symbol: &str) -> RecommendationRecord {
        let symbol = self
            .symbol
            .as_str()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| fallback_symbol.to_string());

        let recommendation = self
            .recommendation
            .as_str()
            .and_then(Verdict::from_label)
            .unwrap_or(Verdict::Hold);

        let report = self
            .report
            .as_str()
            .map(|s| s.to_string())
            .unwrap_or_default();

        RecommendationRecord {
            symbol,
            recommendation,
            score: coerce_score(&self.score),
            report,
        }
    }
}

fn coerce_score(value: &Value) -> f64 {
    let raw = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match raw {
        Some(v) if v.is_finite() => v.clamp(0.0, 100.0),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft(value: Value) -> RecommendationDraft {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn normalize_fills_defaults_for_empty_draft() {
        let record = draft(json!({})).normalize("005930.KS");
        assert_eq!(record.symbol, "005930.KS");
        assert_eq!(record.recommendation, Verdict::Hold);
        assert_eq!(record.score, 0.0);
        assert_eq!(record.report, "");
    }

    #[test]
    fn normalize_uppercases_known_labels() {
        let record = draft(json!({"recommendation": "buy"})).normalize("AAPL");
        assert_eq!(record.recommendation, Verdict::Buy);

        let record = draft(json!({"recommendation": "Sell"})).normalize("AAPL");
        assert_eq!(record.recommendation, Verdict::Sell);
    }

    #[test]
    fn normalize_maps_unknown_or_nonstring_label_to_hold() {
        let record = draft(json!({"recommendation": "ACCUMULATE"})).normalize("AAPL");
        assert_eq!(record.recommendation, Verdict::Hold);

        let record = draft(json!({"recommendation": 42})).normalize("AAPL");
        assert_eq!(record.recommendation, Verdict::Hold);
    }

    #[test]
    fn normalize_coerces_score_shapes() {
        assert_eq!(draft(json!({"score": 73.5})).normalize("A").score, 73.5);
        assert_eq!(draft(json!({"score": "41"})).normalize("A").score, 41.0);
        assert_eq!(draft(json!({"score": "n/a"})).normalize("A").score, 0.0);
        assert_eq!(draft(json!({"score": null})).normalize("A").score, 0.0);
        assert_eq!(draft(json!({"score": 250})).normalize("A").score, 100.0);
        assert_eq!(draft(json!({"score": -3})).normalize("A").score, 0.0);
    }

    #[test]
    fn normalize_keeps_provided_symbol_and_report() {
        let record = draft(json!({
            "symbol": "005930.KS",
            "recommendation": "HOLD",
            "report": "변동성 확대 구간",
            "score": 55,
        }))
        .normalize("fallback");
        assert_eq!(record.symbol, "005930.KS");
        assert_eq!(record.report, "변동성 확대 구간");
        assert_eq!(record.score, 55.0);
    }

    #[test]
    fn normalize_drops_nonstring_report() {
        let record = draft(json!({"report": ["a", "b"]})).normalize("A");
        assert_eq!(record.report, "");
    }

    #[test]
    fn clamp_headlines_truncates_to_cap() {
        let analysis: ResearchAnalysis = serde_json::from_value(json!({
            "symbol": "005930.KS",
            "sentiment": {
                "score": 0.4,
                "top_headlines": (0..8).map(|i| json!({
                    "title": format!("headline {i}"),
                    "link": format!("https://news.example/{i}"),
                    "sentiment": "neu",
                })).collect::<Vec<_>>(),
            },
            "ownership": {
                "institutional": {"current_pct": null, "delta_1d": null},
                "foreign": {"current_pct": 51.2, "delta_1d": 0.1},
            },
        }))
        .unwrap();

        let clamped = analysis.clamp_headlines();
        assert_eq!(clamped.sentiment.top_headlines.len(), MAX_TOP_HEADLINES);
    }
}
