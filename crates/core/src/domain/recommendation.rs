use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Final call of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Buy,
    Sell,
    Hold,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Buy => "BUY",
            Verdict::Sell => "SELL",
            Verdict::Hold => "HOLD",
        }
    }

    /// Maps an uppercased label to a verdict; anything outside the set is None.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "BUY" => Some(Verdict::Buy),
            "SELL" => Some(Verdict::Sell),
            "HOLD" => Some(Verdict::Hold),
            _ => None,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized recommendation ready for insertion. `created_at` is assigned
/// by the database; rows are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRecord {
    pub symbol: String,
    pub recommendation: Verdict,
    pub score: f64,
    pub report: String,
}

/// A persisted row, as read back for the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecommendation {
    pub id: Uuid,
    pub symbol: String,
    pub recommendation: String,
    pub score: f64,
    pub report: String,
    pub created_at: DateTime<Utc>,
}
