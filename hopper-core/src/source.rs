//! Candidate sources: a caller-supplied batch, or a paginated upstream listing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::InputError;
use crate::retry::{fetch_with_retry, RetryPolicy};
use crate::types::{Candidate, PageRequest, SortOrder};
use crate::upstream::ListingClient;

/// An ordered, possibly paginated, sequence of candidates for one pass.
#[async_trait]
pub trait CandidateSource: Send {
    /// Next group of candidates in source order, or `None` when exhausted.
    async fn next_page(&mut self) -> Option<Vec<Candidate>>;
}

/// Parse a request payload into a non-empty candidate batch.
pub fn parse_batch(payload: &str) -> Result<Vec<Candidate>, InputError> {
    let value: serde_json::Value = serde_json::from_str(payload)
        .map_err(|e| InputError::Malformed(format!("invalid JSON: {}", e)))?;

    if !value.is_array() {
        return Err(InputError::Malformed("expected a JSON array of servers".to_string()));
    }

    let candidates: Vec<Candidate> = serde_json::from_value(value)
        .map_err(|e| InputError::Malformed(format!("invalid server entry: {}", e)))?;

    if candidates.is_empty() {
        return Err(InputError::Malformed("no servers received".to_string()));
    }

    Ok(candidates)
}

/// Caller-supplied candidates, yielded once with no I/O.
#[derive(Debug, Clone)]
pub struct BatchSource {
    candidates: Option<Vec<Candidate>>,
}

impl BatchSource {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates: Some(candidates),
        }
    }
}

#[async_trait]
impl CandidateSource for BatchSource {
    async fn next_page(&mut self) -> Option<Vec<Candidate>> {
        self.candidates.take()
    }
}

/// How page order is requested from the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortStrategy {
    Ascending,
    Descending,
    /// Coin flip per pass, so concurrent selectors walk the listing from
    /// different ends
    Random,
}

impl SortStrategy {
    pub fn pick(self) -> SortOrder {
        match self {
            SortStrategy::Ascending => SortOrder::Ascending,
            SortStrategy::Descending => SortOrder::Descending,
            SortStrategy::Random => {
                if rand::random::<bool>() {
                    SortOrder::Ascending
                } else {
                    SortOrder::Descending
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Hard cap on pages fetched in one pass
    pub max_pages: u32,
    /// Page size requested from the upstream
    pub page_limit: u32,
    /// Pause between consecutive page fetches
    pub page_delay_ms: u64,
    pub sort: SortStrategy,
    pub retry: RetryPolicy,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            max_pages: 50,
            page_limit: 100,
            page_delay_ms: 200,
            sort: SortStrategy::Random,
            retry: RetryPolicy::default(),
        }
    }
}

/// Walks an upstream listing page by page for a single pass.
pub struct PollingSource<L: ListingClient + ?Sized> {
    client: Arc<L>,
    config: PollingConfig,
    sort_order: SortOrder,
    cursor: Option<String>,
    pages_fetched: u32,
    done: bool,
}

impl<L: ListingClient + ?Sized> PollingSource<L> {
    pub fn new(client: Arc<L>, config: PollingConfig) -> Self {
        let sort_order = config.sort.pick();
        Self {
            client,
            config,
            sort_order,
            cursor: None,
            pages_fetched: 0,
            done: false,
        }
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }
}

#[async_trait]
impl<L: ListingClient + ?Sized> CandidateSource for PollingSource<L> {
    async fn next_page(&mut self) -> Option<Vec<Candidate>> {
        if self.done || self.pages_fetched >= self.config.max_pages.max(1) {
            return None;
        }

        if self.pages_fetched > 0 && self.config.page_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.page_delay_ms)).await;
        }

        let request = PageRequest {
            cursor: self.cursor.clone(),
            sort_order: self.sort_order,
            limit: self.config.page_limit,
        };

        match fetch_with_retry(self.client.as_ref(), &request, &self.config.retry).await {
            Ok((page, stats)) => {
                self.pages_fetched += 1;
                if page.is_last() {
                    self.done = true;
                    self.cursor = None;
                } else {
                    self.cursor = page.next_page_cursor.clone();
                }
                tracing::info!(
                    page = self.pages_fetched,
                    servers = page.data.len(),
                    retries = stats.retries,
                    last = self.done,
                    "Fetched listing page"
                );
                Some(page.data)
            }
            Err(exhausted) => {
                tracing::warn!(
                    page = self.pages_fetched + 1,
                    retries = exhausted.stats.retries,
                    error = %exhausted.last_error,
                    "Upstream unavailable, ending pass"
                );
                self.done = true;
                None
            }
        }
    }
}
