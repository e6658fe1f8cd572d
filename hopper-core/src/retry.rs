//! Bounded retry loop for upstream page fetches.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::FetchError;
use crate::types::{CandidatePage, PageRequest};
use crate::upstream::ListingClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// Every retry waits `base_delay`
    Fixed,
    /// Retry `n` waits `base_delay * 2^(n-1)`, capped at `max_delay`
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per page, including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff: Backoff,
    /// Wait applied after an explicit rate-limit response
    pub rate_limit_delay_ms: u64,
    /// Bound on a single fetch attempt
    pub fetch_timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 16_000,
            backoff: Backoff::Exponential,
            rate_limit_delay_ms: 10_000,
            fetch_timeout_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based) after an ordinary failure.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let base = self.base_delay_ms;
        let ms = match self.backoff {
            Backoff::Fixed => base,
            Backoff::Exponential => {
                let shift = retry.saturating_sub(1).min(32);
                base.saturating_mul(1u64 << shift).min(self.max_delay_ms.max(base))
            }
        };
        Duration::from_millis(ms)
    }

    /// Delay after a rate-limit response. Never shorter than the server's
    /// `Retry-After` hint.
    pub fn rate_limit_delay(&self, retry_after: Option<Duration>) -> Duration {
        let floor = Duration::from_millis(self.rate_limit_delay_ms);
        retry_after.map_or(floor, |hint| hint.max(floor))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

/// What the retry loop had to do to obtain a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryStats {
    pub retries: u32,
    pub delays: Vec<Duration>,
}

/// A page fetch that ran out of attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted {
    pub last_error: FetchError,
    pub stats: RetryStats,
}

/// Fetch one page, retrying transport/status failures per `policy`.
pub async fn fetch_with_retry<L>(
    client: &L,
    request: &PageRequest,
    policy: &RetryPolicy,
) -> Result<(CandidatePage, RetryStats), RetryExhausted>
where
    L: ListingClient + ?Sized,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut stats = RetryStats::default();
    let mut attempt = 1;

    loop {
        let attempt_timeout = policy.fetch_timeout();
        let attempted = tokio::time::timeout(attempt_timeout, client.fetch_page(request)).await;
        let outcome = match attempted {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(attempt_timeout)),
        };

        let error = match outcome {
            Ok(page) => return Ok((page, stats)),
            Err(error) => error,
        };

        if attempt >= max_attempts {
            return Err(RetryExhausted {
                last_error: error,
                stats,
            });
        }

        let delay = match &error {
            FetchError::RateLimited { retry_after } => {
                let delay = policy.rate_limit_delay(*retry_after);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Upstream rate limited, backing off"
                );
                delay
            }
            other => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %other,
                    "Upstream fetch failed, retrying"
                );
                delay
            }
        };

        tokio::time::sleep(delay).await;
        stats.retries += 1;
        stats.delays.push(delay);
        attempt += 1;
    }
}
