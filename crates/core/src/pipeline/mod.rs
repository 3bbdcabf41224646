//! End-to-end analysis pipeline for one symbol.
//!
//! `Analyzer::run` builds the three agent contexts in parallel, fans the
//! analysis agents out in parallel, synthesizes the final recommendation,
//! normalizes it, and persists it. A failure in any stage aborts the run
//! before anything is written.

pub mod context;

use std::sync::Arc;

use anyhow::{ensure, Context as _};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::domain::contract::{
    FinancialAnalysis, RecommendationDraft, ResearchAnalysis, TechnicalAnalysis,
};
use crate::domain::recommendation::RecommendationRecord;
use crate::domain::symbol::{krx_code, SymbolLocale};
use crate::llm::{run_structured, schema, AgentClient, AgentTask};
use crate::market::cache::{PriceHistoryCache, PriceKey};
use crate::market::throttle::Throttle;
use crate::market::{Interval, MarketDataClient};
use crate::naver::LocalFeedClient;
use crate::storage::RecommendationStore;

use context::{FinancialContext, ResearchContext, TechnicalContext};

/// Price window fed to the technical agent.
pub const HISTORY_MONTHS: u32 = 3;
const GLOBAL_NEWS_COUNT: u32 = 6;

const FINANCIAL_MODULES: &[&str] = &[
    "incomeStatementHistory",
    "incomeStatementHistoryQuarterly",
    "balanceSheetHistory",
    "balanceSheetHistoryQuarterly",
    "cashflowStatementHistory",
    "cashflowStatementHistoryQuarterly",
    "financialData",
    "insiderTransactions",
];

const RESEARCH_PROMPT: &str = "You are a financial research analyst.\n\
Assess the qualitative and quantitative mood around the company from the provided news and ownership data.\n\
- sentiment.score is a real number between -1 and 1.\n\
- sentiment.top_headlines lists the 3-5 key stories with title, link and tone.\n\
- Base the ownership fields on the most recent figures derived from the table.\n\
- Follow the JSON schema exactly and include nothing else.";

const TECHNICAL_PROMPT: &str = "You are a technical analyst.\n\
Summarize the quantitative picture from the price data, RSI, MACD, Bollinger bands, support/resistance levels and trend.\n\
- Use the provided rsi, macd, support_levels, resistance_levels and trend values as they are.\n\
- Do not invent missing values; use the closest provided figure.\n\
- Follow the JSON schema exactly.";

const FINANCIAL_PROMPT: &str = "You are a financial statement analyst.\n\
Fill the schema with the key profitability, growth and balance-sheet health metrics.\n\
- revenue_yoy and eps_yoy are year-over-year growth in percent based on the latest annual data.\n\
- Use the provided data for roe, debt_to_equity and cash_flow.\n\
- When a value is absent, prefer the most recent real figure over writing 0.\n\
- Follow the JSON schema exactly.";

const SYNTHESIS_PROMPT: &str = "You are a hedge fund manager.\n\
Weigh the research, technical and financial reports and decide the investment stance.\n\
- recommendation is one of BUY, SELL or HOLD.\n\
- report is a concise narrative report written in Korean.\n\
- score is a number between 0 and 100 expressing conviction.\n\
- Back the report with two or three concrete reasons.";

pub struct Analyzer {
    market: Arc<dyn MarketDataClient>,
    local_feed: Arc<dyn LocalFeedClient>,
    agent: Arc<dyn AgentClient>,
    store: Arc<dyn RecommendationStore>,
    throttle: Arc<Throttle>,
    price_cache: PriceHistoryCache,
}

/// Everything one run produced, including the stored row id.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub symbol: String,
    pub research: ResearchAnalysis,
    pub technical: TechnicalAnalysis,
    pub financial: FinancialAnalysis,
    pub recommendation: RecommendationRecord,
    pub recommendation_id: Uuid,
}

impl Analyzer {
    pub fn new(
        market: Arc<dyn MarketDataClient>,
        local_feed: Arc<dyn LocalFeedClient>,
        agent: Arc<dyn AgentClient>,
        store: Arc<dyn RecommendationStore>,
        throttle: Arc<Throttle>,
        price_cache: PriceHistoryCache,
    ) -> Self {
        Self {
            market,
            local_feed,
            agent,
            store,
            throttle,
            price_cache,
        }
    }

    pub async fn run(&self, symbol: &str) -> anyhow::Result<AnalysisReport> {
        let symbol = symbol.trim();
        ensure!(!symbol.is_empty(), "symbol must not be empty");

        let locale = SymbolLocale::classify(symbol);
        tracing::info!(symbol, locale = locale.as_str(), "starting analysis");

        let (research_ctx, technical_ctx, financial_ctx) = self
            .build_contexts(symbol, locale)
            .await
            .with_context(|| format!("context stage failed for {symbol}"))?;

        let (research, technical, financial) = tokio::try_join!(
            self.research_stage(symbol, &research_ctx),
            self.technical_stage(symbol, &technical_ctx),
            self.financial_stage(symbol, &financial_ctx),
        )?;

        let draft = self
            .synthesis_stage(symbol, &research, &technical, &financial)
            .await?;
        let recommendation = draft.normalize(symbol);

        let recommendation_id = self
            .store
            .insert(&recommendation)
            .await
            .with_context(|| format!("persist stage failed for {symbol}"))?;

        tracing::info!(
            symbol,
            id = %recommendation_id,
            verdict = recommendation.recommendation.as_str(),
            score = recommendation.score,
            "analysis stored"
        );

        Ok(AnalysisReport {
            symbol: symbol.to_string(),
            research,
            technical,
            financial,
            recommendation,
            recommendation_id,
        })
    }

    async fn build_contexts(
        &self,
        symbol: &str,
        locale: SymbolLocale,
    ) -> anyhow::Result<(ResearchContext, TechnicalContext, FinancialContext)> {
        tokio::try_join!(
            self.research_context(symbol, locale),
            self.technical_context(symbol),
            self.financial_context(symbol),
        )
    }

    async fn research_context(
        &self,
        symbol: &str,
        locale: SymbolLocale,
    ) -> anyhow::Result<ResearchContext> {
        let is_korean = locale.is_local();
        let (global_news, naver_news, ownership) = if is_korean {
            let code = krx_code(symbol);
            // The feed client paces its own page fetches through the
            // shared throttle, one slot per request.
            let (articles, rows) = tokio::try_join!(
                self.local_feed.news_articles(&code),
                self.local_feed.ownership_rows(&code),
            )?;
            (Vec::new(), articles, rows)
        } else {
            let stories = self
                .throttle
                .run("yahoo.search", || {
                    self.market.search_news(symbol, GLOBAL_NEWS_COUNT, 0)
                })
                .await?;
            (stories, Vec::new(), Vec::new())
        };

        Ok(ResearchContext::new(
            symbol.to_string(),
            is_korean,
            global_news,
            naver_news,
            ownership,
        ))
    }

    async fn technical_context(&self, symbol: &str) -> anyhow::Result<TechnicalContext> {
        let key = PriceKey::new(symbol, HISTORY_MONTHS, Interval::Daily);
        let bars = self
            .price_cache
            .get_or_fetch(key, || async {
                self.throttle
                    .run("yahoo.chart", || {
                        self.market.chart(symbol, HISTORY_MONTHS, Interval::Daily)
                    })
                    .await
            })
            .await?;
        Ok(TechnicalContext::from_history(bars.as_ref().clone()))
    }

    async fn financial_context(&self, symbol: &str) -> anyhow::Result<FinancialContext> {
        let summary = self
            .throttle
            .run("yahoo.quote_summary", || {
                self.market.quote_summary(symbol, FINANCIAL_MODULES)
            })
            .await?;
        Ok(FinancialContext::from_summary(&summary))
    }

    /// Generation calls spend throttle slots like every other outbound
    /// call, so the four agent stages share the rate budget with the
    /// data fetches and inherit the 429 retry discipline.
    async fn agent_stage<T: DeserializeOwned>(
        &self,
        op: &'static str,
        task: AgentTask,
    ) -> anyhow::Result<T> {
        self.throttle
            .run(op, || run_structured(self.agent.as_ref(), task.clone()))
            .await
    }

    async fn research_stage(
        &self,
        symbol: &str,
        ctx: &ResearchContext,
    ) -> anyhow::Result<ResearchAnalysis> {
        let context = serde_json::to_value(ctx).context("failed to serialize research context")?;
        let analysis: ResearchAnalysis = self
            .agent_stage(
                "agent.research",
                AgentTask {
                    schema: schema::research(),
                    system_prompt: RESEARCH_PROMPT,
                    subject: symbol.to_string(),
                    context,
                },
            )
            .await
            .with_context(|| format!("research stage failed for {symbol}"))?;
        Ok(analysis.clamp_headlines())
    }

    async fn technical_stage(
        &self,
        symbol: &str,
        ctx: &TechnicalContext,
    ) -> anyhow::Result<TechnicalAnalysis> {
        let context = serde_json::to_value(ctx).context("failed to serialize technical context")?;
        self.agent_stage(
            "agent.technical",
            AgentTask {
                schema: schema::technical(),
                system_prompt: TECHNICAL_PROMPT,
                subject: symbol.to_string(),
                context,
            },
        )
        .await
        .with_context(|| format!("technical stage failed for {symbol}"))
    }

    async fn financial_stage(
        &self,
        symbol: &str,
        ctx: &FinancialContext,
    ) -> anyhow::Result<FinancialAnalysis> {
        let context = serde_json::to_value(ctx).context("failed to serialize financial context")?;
        self.agent_stage(
            "agent.financial",
            AgentTask {
                schema: schema::financial(),
                system_prompt: FINANCIAL_PROMPT,
                subject: symbol.to_string(),
                context,
            },
        )
        .await
        .with_context(|| format!("financial stage failed for {symbol}"))
    }

    async fn synthesis_stage(
        &self,
        symbol: &str,
        research: &ResearchAnalysis,
        technical: &TechnicalAnalysis,
        financial: &FinancialAnalysis,
    ) -> anyhow::Result<RecommendationDraft> {
        self.agent_stage(
            "agent.synthesis",
            AgentTask {
                schema: schema::recommendation(),
                system_prompt: SYNTHESIS_PROMPT,
                subject: symbol.to_string(),
                context: json!({
                    "research": research,
                    "technical": technical,
                    "financial": financial,
                }),
            },
        )
        .await
        .with_context(|| format!("synthesis stage failed for {symbol}"))
    }
}
