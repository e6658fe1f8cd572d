//! High-level client that wraps the selector + pluggable storage.
//! The `hopper` HTTP server and CLI delegate to this.

use std::sync::Arc;

use crate::config::HopperConfig;
use crate::error::{SelectError, StoreError};
use crate::infrastructure::ReservationStore;
use crate::infrastructure_in_memory::InMemoryReservationStore;
use crate::selector::Selector;
use crate::source::{BatchSource, PollingSource};
use crate::types::{Candidate, Selection};
use crate::upstream::ListingClient;

/// The main entry point for picking servers. Owns the reservation store,
/// the selector built from a [`HopperConfig`], and an optional upstream.
pub struct HopperClient {
    store: Arc<dyn ReservationStore>,
    selector: Selector,
    config: HopperConfig,
    listing: Option<Arc<dyn ListingClient>>,
}

impl HopperClient {
    /// Create a client with an empty in-memory store.
    pub fn new(config: HopperConfig) -> Self {
        Self::with_store(Arc::new(InMemoryReservationStore::new()), config)
    }

    pub fn with_store(store: Arc<dyn ReservationStore>, config: HopperConfig) -> Self {
        let selector = Selector::new(
            Arc::clone(&store),
            config.eligibility.clone(),
            config.selector.clone(),
        );
        Self {
            store,
            selector,
            config,
            listing: None,
        }
    }

    /// Create a client backed by SQLite at the given path.
    /// Reservations are shared by every process using the same file.
    #[cfg(feature = "sqlite")]
    pub fn with_sqlite(path: &str, config: HopperConfig) -> Result<Self, StoreError> {
        let store = crate::infrastructure_sqlite::SqliteReservationStore::open(path).map_err(|e| {
            StoreError::Backend(format!("Failed to open SQLite database at '{}': {}", path, e))
        })?;
        Ok(Self::with_store(Arc::new(store), config))
    }

    pub fn with_listing(mut self, listing: Arc<dyn ListingClient>) -> Self {
        self.listing = Some(listing);
        self
    }

    /// Attach an HTTP listing client for `config.listing_url`, if one is set.
    #[cfg(feature = "http")]
    pub fn with_configured_listing(self) -> Result<Self, crate::error::FetchError> {
        match self.config.listing_url.clone() {
            Some(url) => {
                let client = crate::upstream::HttpListingClient::new(&url)?;
                Ok(self.with_listing(Arc::new(client)))
            }
            None => Ok(self),
        }
    }

    pub fn config(&self) -> &HopperConfig {
        &self.config
    }

    pub fn has_listing(&self) -> bool {
        self.listing.is_some()
    }

    /// Single pass over a caller-supplied batch. No outer retry: an
    /// exhausted batch is `NotFound` straight away.
    pub async fn select_from_batch(
        &self,
        candidates: Vec<Candidate>,
    ) -> Result<Selection, SelectError> {
        let mut source = BatchSource::new(candidates);
        self.selector.select_once(&mut source).await
    }

    /// Polling-mode search: paginate the upstream listing, retrying whole
    /// passes per `selector.max_pass_attempts`.
    pub async fn search(&self) -> Result<Selection, SelectError> {
        let listing = self.listing.clone().ok_or(SelectError::NoListing)?;
        let polling = self.config.polling.clone();
        self.selector
            .select_with_retry(|| PollingSource::new(Arc::clone(&listing), polling.clone()))
            .await
    }

    /// Keys of all live reservations.
    pub async fn active_reservations(&self) -> Result<Vec<String>, StoreError> {
        self.store.list().await
    }

    /// Drop expired reservations. Returns the number removed.
    pub async fn evict_expired(&self) -> Result<usize, StoreError> {
        self.store.evict_expired().await
    }
}

impl Default for HopperClient {
    fn default() -> Self {
        Self::new(HopperConfig::default())
    }
}
