use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::clock::{Clock, SystemClock};
use crate::error::StoreError;
use crate::infrastructure::ReservationStore;
use crate::types::Reservation;

/// Process-local reservation store. Suitable for a single `hopper serve`
/// instance; every operation runs under one mutex so `put_if_absent` is atomic.
pub struct InMemoryReservationStore {
    // Map of candidate id -> Reservation
    records: Mutex<HashMap<String, Reservation>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryReservationStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn records(&self) -> Result<MutexGuard<'_, HashMap<String, Reservation>>, StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Backend("reservation map poisoned".to_string()))
    }
}

impl Default for InMemoryReservationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn get(&self, key: &str) -> Result<Option<Reservation>, StoreError> {
        let now = self.clock.now_ms();
        let records = self.records()?;
        Ok(records.get(key).filter(|r| r.is_active(now)).cloned())
    }

    async fn put(&self, key: &str, marker: &str, ttl_secs: u64) -> Result<(), StoreError> {
        let now = self.clock.now_ms();
        let reservation = Reservation::new(key.to_string(), marker.to_string(), ttl_secs, now);
        self.records()?.insert(key.to_string(), reservation);
        Ok(())
    }

    async fn put_if_absent(
        &self,
        key: &str,
        marker: &str,
        ttl_secs: u64,
    ) -> Result<bool, StoreError> {
        let now = self.clock.now_ms();
        let mut records = self.records()?;

        if records.get(key).is_some_and(|r| r.is_active(now)) {
            return Ok(false);
        }

        let reservation = Reservation::new(key.to_string(), marker.to_string(), ttl_secs, now);
        records.insert(key.to_string(), reservation);
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let now = self.clock.now_ms();
        let records = self.records()?;
        Ok(records
            .values()
            .filter(|r| r.is_active(now))
            .map(|r| r.key.clone())
            .collect())
    }

    async fn evict_expired(&self) -> Result<usize, StoreError> {
        let now = self.clock.now_ms();
        let mut records = self.records()?;
        let before = records.len();
        records.retain(|_, r| r.is_active(now));
        Ok(before - records.len())
    }
}
