use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{FetchError, StoreError};
use crate::infrastructure::ReservationStore;
use crate::infrastructure_in_memory::InMemoryReservationStore;
use crate::types::{Candidate, CandidatePage, PageRequest, Reservation};
use crate::upstream::ListingClient;

pub(crate) fn server(id: &str, playing: u32, max_players: u32) -> Candidate {
    Candidate::new(id, playing, max_players)
}

/// Listing that serves canned pages keyed by `page-N` cursors, optionally
/// failing the first few calls.
pub(crate) struct ScriptedListing {
    pages: Vec<Vec<Candidate>>,
    endless: bool,
    failures: Mutex<VecDeque<FetchError>>,
    calls: AtomicU32,
    requests: Mutex<Vec<PageRequest>>,
}

impl ScriptedListing {
    pub(crate) fn paged(pages: Vec<Vec<Candidate>>) -> Self {
        Self {
            pages,
            endless: false,
            failures: Mutex::new(VecDeque::new()),
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every page advertises a next cursor, forever.
    pub(crate) fn endless(page: Vec<Candidate>) -> Self {
        Self {
            endless: true,
            ..Self::paged(vec![page])
        }
    }

    pub(crate) fn failing_first(self, failures: Vec<FetchError>) -> Self {
        *self.failures.lock().unwrap() = failures.into();
        self
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ListingClient for ScriptedListing {
    async fn fetch_page(&self, request: &PageRequest) -> Result<CandidatePage, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        let index: usize = request
            .cursor
            .as_deref()
            .and_then(|c| c.strip_prefix("page-"))
            .and_then(|n| n.parse().ok())
            .unwrap_or(0);

        if self.endless {
            return Ok(CandidatePage::new(
                self.pages[0].clone(),
                Some(format!("page-{}", index + 1)),
            ));
        }

        let data = self.pages.get(index).cloned().unwrap_or_default();
        let next = (index + 1 < self.pages.len()).then(|| format!("page-{}", index + 1));
        Ok(CandidatePage::new(data, next))
    }
}

/// Listing that never answers successfully.
pub(crate) struct DownListing {
    calls: AtomicU32,
}

impl DownListing {
    pub(crate) fn new() -> Self {
        Self {
            calls: AtomicU32::new(0),
        }
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ListingClient for DownListing {
    async fn fetch_page(&self, _request: &PageRequest) -> Result<CandidatePage, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(FetchError::Status(503))
    }
}

/// Store whose backend is unreachable.
pub(crate) struct BrokenStore;

#[async_trait]
impl ReservationStore for BrokenStore {
    async fn get(&self, _key: &str) -> Result<Option<Reservation>, StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }

    async fn put(&self, _key: &str, _marker: &str, _ttl_secs: u64) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }

    async fn put_if_absent(
        &self,
        _key: &str,
        _marker: &str,
        _ttl_secs: u64,
    ) -> Result<bool, StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }

    async fn evict_expired(&self) -> Result<usize, StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }
}

/// Store that hangs on every call.
pub(crate) struct StalledStore;

#[async_trait]
impl ReservationStore for StalledStore {
    async fn get(&self, _key: &str) -> Result<Option<Reservation>, StoreError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(None)
    }

    async fn put(&self, _key: &str, _marker: &str, _ttl_secs: u64) -> Result<(), StoreError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }

    async fn put_if_absent(
        &self,
        _key: &str,
        _marker: &str,
        _ttl_secs: u64,
    ) -> Result<bool, StoreError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }

    async fn evict_expired(&self) -> Result<usize, StoreError> {
        Ok(0)
    }
}

/// Store that commits every write immediately but acknowledges it late.
pub(crate) struct SlowAckStore {
    inner: InMemoryReservationStore,
    ack_delay: Duration,
}

impl SlowAckStore {
    pub(crate) fn new(ack_delay: Duration) -> Self {
        Self {
            inner: InMemoryReservationStore::new(),
            ack_delay,
        }
    }
}

#[async_trait]
impl ReservationStore for SlowAckStore {
    async fn get(&self, key: &str) -> Result<Option<Reservation>, StoreError> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, marker: &str, ttl_secs: u64) -> Result<(), StoreError> {
        self.inner.put(key, marker, ttl_secs).await?;
        tokio::time::sleep(self.ack_delay).await;
        Ok(())
    }

    async fn put_if_absent(
        &self,
        key: &str,
        marker: &str,
        ttl_secs: u64,
    ) -> Result<bool, StoreError> {
        let won = self.inner.put_if_absent(key, marker, ttl_secs).await?;
        tokio::time::sleep(self.ack_delay).await;
        Ok(won)
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        self.inner.list().await
    }

    async fn evict_expired(&self) -> Result<usize, StoreError> {
        self.inner.evict_expired().await
    }
}
