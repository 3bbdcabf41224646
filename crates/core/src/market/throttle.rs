use crate::config::Settings;
use crate::market::error;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Process-wide pacing for outbound calls.
///
/// One instance is shared by every caller. The tokio mutex wakes waiters
/// in FIFO order, so calls start in arrival order with at least `min_gap`
/// between consecutive starts, no matter how many tasks fan out at once.
/// Rate-limited failures re-enter the queue for each retry.
#[derive(Debug)]
pub struct Throttle {
    min_gap: Duration,
    retry_limit: u32,
    retry_pause: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(min_gap: Duration, retry_limit: u32, retry_pause: Duration) -> Self {
        Self {
            min_gap,
            retry_limit,
            retry_pause,
            last_call: Mutex::new(None),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            Duration::from_millis(settings.min_call_gap_ms),
            settings.retry_limit,
            Duration::from_millis(settings.retry_pause_ms),
        )
    }

    /// Waits for this caller's turn, then runs `f`. On a rate-limited
    /// error, pauses and retries up to the configured bound; any other
    /// error propagates immediately.
    pub async fn run<T, F, Fut>(&self, op: &str, f: F) -> anyhow::Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            self.wait_turn().await;
            match f().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt > self.retry_limit || !error::is_rate_limited(&err) {
                        return Err(err);
                    }
                    tracing::warn!(
                        op,
                        attempt,
                        pause_ms = self.retry_pause.as_millis() as u64,
                        error = %err,
                        "rate limited; pausing before retry"
                    );
                    tokio::time::sleep(self.retry_pause).await;
                }
            }
        }
    }

    // Holds the lock across the gap sleep so the next waiter cannot stamp
    // early; the call body itself runs after release.
    async fn wait_turn(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(last) = *last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_gap {
                tokio::time::sleep(self.min_gap - elapsed).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}
