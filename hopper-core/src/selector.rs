//! First-fit selection over a candidate source with atomic reservation.
//!
//! A pass walks the source in order and returns the first candidate that
//! (1) passes the [`EligibilityPolicy`], (2) has no live reservation, and
//! (3) is successfully reserved via [`ReservationStore::put_if_absent`].
//! Step 3 is the conditional write; losing it to a concurrent selector just
//! moves the pass on to the next candidate.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::clock::{Clock, SystemClock};
use crate::eligibility::{Eligibility, EligibilityPolicy};
use crate::error::{SelectError, StoreError};
use crate::infrastructure::ReservationStore;
use crate::source::CandidateSource;
use crate::types::{Selection, DEFAULT_COOLDOWN_TTL_SECS};

/// How a pass learns which candidates are already reserved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionMode {
    /// One `get` per eligible candidate
    PerKey,
    /// One `list` at the start of the pass
    Snapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub cooldown_ttl_secs: u64,
    /// Passes attempted by `select_with_retry`
    pub max_pass_attempts: u32,
    pub pass_retry_delay_ms: u64,
    /// Bound on each individual store operation
    pub store_timeout_ms: u64,
    /// Optional bound on a whole pass
    pub pass_deadline_ms: Option<u64>,
    pub exclusion: ExclusionMode,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            cooldown_ttl_secs: DEFAULT_COOLDOWN_TTL_SECS,
            max_pass_attempts: 3,
            pass_retry_delay_ms: 1_000,
            store_timeout_ms: 2_000,
            pass_deadline_ms: None,
            exclusion: ExclusionMode::PerKey,
        }
    }
}

impl SelectorConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn pass_deadline(&self) -> Option<Duration> {
        self.pass_deadline_ms.map(Duration::from_millis)
    }
}

pub struct Selector {
    store: Arc<dyn ReservationStore>,
    policy: EligibilityPolicy,
    config: SelectorConfig,
    clock: Arc<dyn Clock>,
}

impl Selector {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        policy: EligibilityPolicy,
        config: SelectorConfig,
    ) -> Self {
        Self {
            store,
            policy,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Clock used for the reservation marker.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> &EligibilityPolicy {
        &self.policy
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Run a single pass. `NotFound` means the source was exhausted.
    pub async fn select_once(
        &self,
        source: &mut dyn CandidateSource,
    ) -> Result<Selection, SelectError> {
        let deadline = self
            .config
            .pass_deadline()
            .map(PassDeadline::starting_now);
        self.run_pass(source, deadline).await
    }

    /// Run up to `max_pass_attempts` passes, each over a fresh source.
    /// Store failures end the search immediately.
    pub async fn select_with_retry<S, F>(
        &self,
        mut make_source: F,
    ) -> Result<Selection, SelectError>
    where
        S: CandidateSource,
        F: FnMut() -> S + Send,
    {
        let attempts = self.config.max_pass_attempts.max(1);
        let delay = Duration::from_millis(self.config.pass_retry_delay_ms);

        for attempt in 1..=attempts {
            let mut source = make_source();
            match self.select_once(&mut source).await {
                Ok(selection) => return Ok(selection),
                Err(SelectError::Store(e)) => return Err(SelectError::Store(e)),
                Err(e) => {
                    tracing::info!(
                        attempt,
                        max_attempts = attempts,
                        reason = %e,
                        "Pass found no server"
                    );
                }
            }

            if attempt < attempts && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        Err(SelectError::NotFound { attempts })
    }

    async fn run_pass(
        &self,
        source: &mut dyn CandidateSource,
        deadline: Option<PassDeadline>,
    ) -> Result<Selection, SelectError> {
        let excluded: Option<HashSet<String>> = match self.config.exclusion {
            ExclusionMode::Snapshot => {
                let keys = within(deadline, self.bounded(self.store.list())).await??;
                Some(keys.into_iter().collect())
            }
            ExclusionMode::PerKey => None,
        };

        let mut evaluated = 0usize;
        while let Some(page) = within(deadline, source.next_page()).await? {
            for candidate in &page {
                evaluated += 1;

                let verdict = self.policy.check(candidate);
                if verdict != Eligibility::Eligible {
                    tracing::debug!(
                        candidate = %candidate.id,
                        reason = ?verdict,
                        "Skipping ineligible server"
                    );
                    continue;
                }

                let reserved = match &excluded {
                    Some(keys) => keys.contains(&candidate.id),
                    None => within(deadline, self.bounded(self.store.get(&candidate.id)))
                        .await??
                        .is_some(),
                };
                if reserved {
                    tracing::debug!(candidate = %candidate.id, "Skipping recently used server");
                    continue;
                }

                if let Some(deadline) = deadline {
                    deadline.check()?;
                }
                if !self.reserve(&candidate.id).await? {
                    tracing::debug!(candidate = %candidate.id, "Lost reservation race");
                    continue;
                }

                tracing::info!(
                    candidate = %candidate.id,
                    playing = candidate.playing,
                    max_players = candidate.max_players,
                    ttl_secs = self.config.cooldown_ttl_secs,
                    "Server selected and reserved"
                );
                return Ok(Selection::from(candidate));
            }
        }

        tracing::info!(evaluated, "No unvisited servers found");
        Err(SelectError::NotFound { attempts: 1 })
    }

    /// Issue the conditional write and wait for its answer.
    ///
    /// The write is never cancelled: a backend may commit it after the caller
    /// stops listening, which would hold the server for a full cooldown
    /// without handing it to anyone. A slow answer is only logged.
    async fn reserve(&self, key: &str) -> Result<bool, StoreError> {
        let marker = self.clock.now_ms().to_string();
        let started = Instant::now();
        let won = self
            .store
            .put_if_absent(key, &marker, self.config.cooldown_ttl_secs)
            .await?;

        let elapsed = started.elapsed();
        if elapsed > self.config.store_timeout() {
            tracing::warn!(
                candidate = %key,
                elapsed_ms = elapsed.as_millis() as u64,
                won,
                "Reservation write answered after the store timeout"
            );
        }
        Ok(won)
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let limit = self.config.store_timeout();
        tokio::time::timeout(limit, op)
            .await
            .map_err(|_| StoreError::Timeout(limit))?
    }
}

#[derive(Debug, Clone, Copy)]
struct PassDeadline {
    at: Instant,
    limit: Duration,
}

impl PassDeadline {
    fn starting_now(limit: Duration) -> Self {
        Self {
            at: Instant::now() + limit,
            limit,
        }
    }

    fn expired(&self) -> SelectError {
        tracing::warn!(
            deadline_ms = self.limit.as_millis() as u64,
            "Selection pass timed out"
        );
        SelectError::DeadlineExceeded(self.limit)
    }

    fn check(&self) -> Result<(), SelectError> {
        if Instant::now() >= self.at {
            return Err(self.expired());
        }
        Ok(())
    }
}

/// Await `op`, giving up when the pass deadline passes. Only used for reads.
async fn within<T, F>(deadline: Option<PassDeadline>, op: F) -> Result<T, SelectError>
where
    F: Future<Output = T>,
{
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline.at, op)
            .await
            .map_err(|_| deadline.expired()),
        None => Ok(op.await),
    }
}
