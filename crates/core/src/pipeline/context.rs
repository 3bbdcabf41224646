//! Context documents assembled for the analysis agents.
//!
//! Field names here are part of the model-facing contract: each struct
//! serializes into the JSON block embedded in the user prompt, so the
//! key casing mirrors what the prompts were tuned against.

use serde::Serialize;
use serde_json::Value;

use crate::indicators::{self, BollingerBands, Macd, Trend};
use crate::market::{coerce_num, NewsStory, PriceBar};
use crate::naver::{NewsArticle, OwnershipRow};

/// Neutral midpoint used when the series is too short for RSI.
pub const DEFAULT_RSI: f64 = 50.0;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchContext {
    pub symbol: String,
    pub is_korean: bool,
    pub global_news: Vec<NewsStory>,
    pub naver_news: Vec<NewsArticle>,
    pub ownership: Vec<OwnershipRow>,
    pub ownership_summary: Option<OwnershipSummary>,
}

impl ResearchContext {
    pub fn new(
        symbol: String,
        is_korean: bool,
        global_news: Vec<NewsStory>,
        naver_news: Vec<NewsArticle>,
        ownership: Vec<OwnershipRow>,
    ) -> Self {
        let ownership_summary = OwnershipSummary::from_rows(&ownership);
        Self {
            symbol,
            is_korean,
            global_news,
            naver_news,
            ownership,
            ownership_summary,
        }
    }
}

/// Headline numbers pulled off the first two ownership rows so the
/// model does not have to diff the table itself.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipSummary {
    pub institutional_net: Option<f64>,
    pub institutional_net_delta: Option<f64>,
    pub foreign_ownership: Option<f64>,
    pub foreign_ownership_delta: Option<f64>,
}

impl OwnershipSummary {
    /// Rows arrive newest first. Deltas need the latest value present
    /// and a numeric previous value; otherwise they stay None.
    pub fn from_rows(rows: &[OwnershipRow]) -> Option<Self> {
        let latest = rows.first()?;
        let previous = rows.get(1);
        Some(Self {
            institutional_net: latest.institutional_net,
            institutional_net_delta: delta(
                latest.institutional_net,
                previous.and_then(|row| row.institutional_net),
            ),
            foreign_ownership: latest.foreign_ownership,
            foreign_ownership_delta: delta(
                latest.foreign_ownership,
                previous.and_then(|row| row.foreign_ownership),
            ),
        })
    }
}

fn delta(latest: Option<f64>, previous: Option<f64>) -> Option<f64> {
    match (latest, previous) {
        (Some(latest), Some(previous)) => Some(latest - previous),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalContext {
    pub price_history: Vec<PriceBar>,
    pub closes: Vec<f64>,
    pub rsi: f64,
    pub macd: Macd,
    pub bollinger: Option<BollingerBands>,
    pub support_levels: Vec<f64>,
    pub resistance_levels: Vec<f64>,
    pub trend: Trend,
}

impl TechnicalContext {
    /// Derives every indicator from the bar closes. Short series fall
    /// back to a neutral RSI and a zeroed MACD rather than omitting
    /// the keys; Bollinger stays null when unavailable.
    pub fn from_history(price_history: Vec<PriceBar>) -> Self {
        let closes: Vec<f64> = price_history.iter().filter_map(|bar| bar.close).collect();

        let rsi = indicators::rsi(&closes, indicators::RSI_LENGTH).unwrap_or(DEFAULT_RSI);
        let macd = indicators::macd(
            &closes,
            indicators::MACD_FAST,
            indicators::MACD_SLOW,
            indicators::MACD_SIGNAL,
        )
        .unwrap_or(Macd {
            macd: 0.0,
            signal: 0.0,
            hist: 0.0,
        });
        let bollinger = indicators::bollinger(
            &closes,
            indicators::BOLLINGER_PERIOD,
            indicators::BOLLINGER_MULTIPLIER,
        );
        let levels = indicators::support_resistance(&closes);
        let trend = indicators::trend(&closes);

        Self {
            price_history,
            closes,
            rsi,
            macd,
            bollinger,
            support_levels: levels.support,
            resistance_levels: levels.resistance,
            trend,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialContext {
    pub income_statement: Vec<Value>,
    pub balance_sheet: Vec<Value>,
    pub cashflow: Vec<Value>,
    pub insider_transactions: Vec<Value>,
    pub metrics: FinancialMetrics,
}

/// Metric keys stay snake_case; they match the financial schema fields
/// the agent fills in.
#[derive(Debug, Clone, Serialize)]
pub struct FinancialMetrics {
    pub revenue_yoy: Option<f64>,
    pub eps_yoy: Option<f64>,
    pub roe: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub cash_flow: Option<f64>,
}

impl FinancialContext {
    /// Digs the interesting statement arrays and ratios out of a raw
    /// quoteSummary result. Absent modules become empty arrays and None
    /// metrics; nothing here fails.
    pub fn from_summary(summary: &Value) -> Self {
        let income_statement =
            statement_entries(summary, "/incomeStatementHistory/incomeStatementHistory");
        let balance_sheet = statement_entries(summary, "/balanceSheetHistory/balanceSheetStatements");
        let cashflow = statement_entries(summary, "/cashflowStatementHistory/cashflowStatements");
        let insider_transactions = statement_entries(summary, "/insiderTransactions/transactions");

        let revenue_yoy = year_over_year(&pick_numbers(&income_statement, "totalRevenue"));
        let eps_yoy = year_over_year(&pick_numbers(&income_statement, "dilutedEPS"));

        let financial_data = summary.pointer("/financialData");
        let roe = financial_data
            .and_then(|data| data.get("returnOnEquity"))
            .and_then(coerce_num);
        let debt_to_equity = financial_data
            .and_then(|data| data.get("debtToEquity"))
            .and_then(coerce_num);
        let cash_flow = financial_data
            .and_then(|data| data.get("operatingCashflow"))
            .and_then(coerce_num)
            .or_else(|| {
                financial_data
                    .and_then(|data| data.get("freeCashflow"))
                    .and_then(coerce_num)
            });

        Self {
            income_statement,
            balance_sheet,
            cashflow,
            insider_transactions,
            metrics: FinancialMetrics {
                revenue_yoy,
                eps_yoy,
                roe,
                debt_to_equity,
                cash_flow,
            },
        }
    }
}

fn statement_entries(summary: &Value, pointer: &str) -> Vec<Value> {
    summary
        .pointer(pointer)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Pulls `key` out of each statement entry and coerces it to a number;
/// entries that miss the key contribute None so positions stay aligned
/// with the statements.
pub(crate) fn pick_numbers(entries: &[Value], key: &str) -> Vec<Option<f64>> {
    entries
        .iter()
        .map(|entry| entry.get(key).and_then(coerce_num))
        .collect()
}

/// Growth of the newest value over the one before it, in percent.
/// Statement arrays arrive newest first. A zero or missing prior year
/// yields None.
pub(crate) fn year_over_year(values: &[Option<f64>]) -> Option<f64> {
    let filtered: Vec<f64> = values
        .iter()
        .filter_map(|value| *value)
        .filter(|value| value.is_finite())
        .collect();
    if filtered.len() < 2 {
        return None;
    }

    let latest = filtered[0];
    let previous = filtered[1];
    if previous == 0.0 {
        return None;
    }
    Some((latest - previous) / previous.abs() * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(institutional_net: Option<f64>, foreign_ownership: Option<f64>) -> OwnershipRow {
        OwnershipRow {
            date: "2026.08.22".to_string(),
            close: Some(71_200.0),
            change: Some(900.0),
            change_rate: Some(1.28),
            volume: Some(12_345_678.0),
            institutional_net,
            foreign_net: Some(98_700.0),
            foreign_shares: Some(3_120_450_000.0),
            foreign_ownership,
        }
    }

    fn bar(close: Option<f64>) -> PriceBar {
        PriceBar {
            date: None,
            open: None,
            high: None,
            low: None,
            close,
            volume: None,
        }
    }

    #[test]
    fn ownership_summary_diffs_first_two_rows() {
        let rows = vec![
            row(Some(-120_300.0), Some(53.11)),
            row(Some(-100_000.0), Some(53.05)),
        ];
        let summary = OwnershipSummary::from_rows(&rows).unwrap();
        assert_eq!(summary.institutional_net, Some(-120_300.0));
        assert_eq!(summary.institutional_net_delta, Some(-20_300.0));
        assert_eq!(summary.foreign_ownership, Some(53.11));
        assert!((summary.foreign_ownership_delta.unwrap() - 0.06).abs() < 1e-9);
    }

    #[test]
    fn ownership_summary_deltas_need_both_sides() {
        let rows = vec![row(Some(-120_300.0), None), row(None, Some(53.05))];
        let summary = OwnershipSummary::from_rows(&rows).unwrap();
        assert_eq!(summary.institutional_net, Some(-120_300.0));
        assert_eq!(summary.institutional_net_delta, None);
        assert_eq!(summary.foreign_ownership, None);
        assert_eq!(summary.foreign_ownership_delta, None);
    }

    #[test]
    fn ownership_summary_single_row_has_no_deltas() {
        let rows = vec![row(Some(-120_300.0), Some(53.11))];
        let summary = OwnershipSummary::from_rows(&rows).unwrap();
        assert_eq!(summary.institutional_net_delta, None);
        assert_eq!(summary.foreign_ownership_delta, None);
    }

    #[test]
    fn ownership_summary_absent_without_rows() {
        assert!(OwnershipSummary::from_rows(&[]).is_none());
    }

    #[test]
    fn technical_context_defaults_on_short_history() {
        let ctx = TechnicalContext::from_history(vec![bar(Some(100.0)), bar(Some(101.0))]);
        assert_eq!(ctx.closes, vec![100.0, 101.0]);
        assert_eq!(ctx.rsi, DEFAULT_RSI);
        assert_eq!(ctx.macd.macd, 0.0);
        assert_eq!(ctx.macd.signal, 0.0);
        assert_eq!(ctx.macd.hist, 0.0);
        assert!(ctx.bollinger.is_none());
        assert!(ctx.support_levels.is_empty());
        assert!(ctx.resistance_levels.is_empty());
        assert_eq!(ctx.trend, Trend::Sideways);
    }

    #[test]
    fn technical_context_skips_null_closes() {
        let ctx = TechnicalContext::from_history(vec![bar(Some(100.0)), bar(None), bar(Some(102.0))]);
        assert_eq!(ctx.closes, vec![100.0, 102.0]);
        assert_eq!(ctx.price_history.len(), 3);
    }

    #[test]
    fn technical_context_computes_indicators_on_long_history() {
        let bars: Vec<PriceBar> = (0..40).map(|i| bar(Some(100.0 + i as f64))).collect();
        let ctx = TechnicalContext::from_history(bars);
        // Strictly rising series: RSI pegs at 100 and the trend reads up.
        assert_eq!(ctx.rsi, 100.0);
        assert!(ctx.macd.macd > 0.0);
        assert!(ctx.bollinger.is_some());
        assert!(!ctx.support_levels.is_empty());
        assert!(!ctx.resistance_levels.is_empty());
        assert_eq!(ctx.trend, Trend::Up);
    }

    #[test]
    fn research_context_serializes_with_prompt_facing_keys() {
        let ctx = ResearchContext::new(
            "005930.KS".to_string(),
            true,
            Vec::new(),
            vec![NewsArticle {
                url: "https://n.news.naver.com/mnews/article/001/0001".to_string(),
                title: "제목".to_string(),
                content: "본문".to_string(),
            }],
            vec![row(Some(-120_300.0), Some(53.11))],
        );

        let value = serde_json::to_value(&ctx).unwrap();
        assert_eq!(value["isKorean"], json!(true));
        assert!(value["globalNews"].as_array().unwrap().is_empty());
        assert_eq!(value["naverNews"][0]["title"], json!("제목"));
        assert_eq!(value["ownership"][0]["institutionalNet"], json!(-120_300.0));
        assert_eq!(value["ownershipSummary"]["foreignOwnership"], json!(53.11));
    }

    #[test]
    fn year_over_year_uses_newest_first_ordering() {
        assert_eq!(year_over_year(&[Some(110.0), Some(100.0)]), Some(10.0));
        assert_eq!(year_over_year(&[Some(90.0), Some(-100.0)]), Some(190.0));
        assert_eq!(year_over_year(&[Some(110.0), Some(0.0)]), None);
        assert_eq!(year_over_year(&[Some(110.0)]), None);
        assert_eq!(year_over_year(&[None, Some(110.0), Some(100.0)]), Some(10.0));
    }

    #[test]
    fn financial_context_digs_summary_modules() {
        let summary = json!({
            "incomeStatementHistory": {
                "incomeStatementHistory": [
                    {"totalRevenue": {"raw": 2_200_000.0}, "dilutedEPS": "5.5"},
                    {"totalRevenue": {"raw": 2_000_000.0}, "dilutedEPS": "5.0"},
                ],
            },
            "balanceSheetHistory": {
                "balanceSheetStatements": [{"totalAssets": 9_000_000.0}],
            },
            "cashflowStatementHistory": {
                "cashflowStatements": [{"totalCashFromOperatingActivities": 350_000.0}],
            },
            "insiderTransactions": {"transactions": [{"filerName": "KIM"}]},
            "financialData": {
                "returnOnEquity": 0.091,
                "debtToEquity": {"raw": 45.3},
                "freeCashflow": 120_000.0,
            },
        });

        let ctx = FinancialContext::from_summary(&summary);
        assert_eq!(ctx.income_statement.len(), 2);
        assert_eq!(ctx.balance_sheet.len(), 1);
        assert_eq!(ctx.insider_transactions.len(), 1);
        assert!((ctx.metrics.revenue_yoy.unwrap() - 10.0).abs() < 1e-9);
        assert!((ctx.metrics.eps_yoy.unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(ctx.metrics.roe, Some(0.091));
        assert_eq!(ctx.metrics.debt_to_equity, Some(45.3));
        // operatingCashflow missing, freeCashflow picks up the slack
        assert_eq!(ctx.metrics.cash_flow, Some(120_000.0));
    }

    #[test]
    fn financial_context_tolerates_empty_summary() {
        let ctx = FinancialContext::from_summary(&json!({}));
        assert!(ctx.income_statement.is_empty());
        assert!(ctx.balance_sheet.is_empty());
        assert!(ctx.cashflow.is_empty());
        assert!(ctx.insider_transactions.is_empty());
        assert_eq!(ctx.metrics.revenue_yoy, None);
        assert_eq!(ctx.metrics.cash_flow, None);
    }

    #[test]
    fn pick_numbers_keeps_positions_aligned() {
        let entries = vec![
            json!({"totalRevenue": 100.0}),
            json!({"other": 1.0}),
            json!({"totalRevenue": {"raw": 90.0}}),
        ];
        assert_eq!(
            pick_numbers(&entries, "totalRevenue"),
            vec![Some(100.0), None, Some(90.0)]
        );
    }
}
