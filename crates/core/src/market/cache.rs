use crate::config::Settings;
use crate::market::{Interval, PriceBar};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PriceKey {
    pub symbol: String,
    pub months: u32,
    pub interval: Interval,
}

impl PriceKey {
    pub fn new(symbol: &str, months: u32, interval: Interval) -> Self {
        Self {
            symbol: symbol.to_string(),
            months,
            interval,
        }
    }
}

struct CacheEntry {
    fetched_at: Instant,
    bars: Arc<Vec<PriceBar>>,
}

/// Read-through TTL cache for normalized price history.
///
/// Staleness is checked on read; nothing is swept in the background. Each
/// key owns an inner mutex, so concurrent misses serialize and exactly one
/// fetch runs per key (single-flight). A failed fetch caches nothing.
pub struct PriceHistoryCache {
    ttl: Duration,
    slots: Mutex<HashMap<PriceKey, Arc<Mutex<Option<CacheEntry>>>>>,
}

impl PriceHistoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(Duration::from_secs(settings.price_cache_ttl_secs))
    }

    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: PriceKey,
        fetch: F,
    ) -> anyhow::Result<Arc<Vec<PriceBar>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Vec<PriceBar>>>,
    {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots
                .entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(None)))
                .clone()
        };

        let mut entry = slot.lock().await;
        if let Some(cached) = entry.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return Ok(cached.bars.clone());
            }
        }

        let bars = Arc::new(fetch().await?);
        *entry = Some(CacheEntry {
            fetched_at: Instant::now(),
            bars: bars.clone(),
        });
        Ok(bars)
    }
}
