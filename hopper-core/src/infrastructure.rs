use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::Reservation;

/// Defines the contract for reservation storage backends.
///
/// Expired records must be indistinguishable from records that never
/// existed, whether or not they have been physically evicted yet.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Fetch the live reservation for `key`, if any
    async fn get(&self, key: &str) -> Result<Option<Reservation>, StoreError>;

    /// Unconditionally write a reservation, replacing any existing one
    async fn put(&self, key: &str, marker: &str, ttl_secs: u64) -> Result<(), StoreError>;

    /// Atomically write a reservation only if no live one exists.
    /// Returns `false` when another caller already holds the key.
    async fn put_if_absent(
        &self,
        key: &str,
        marker: &str,
        ttl_secs: u64,
    ) -> Result<bool, StoreError>;

    /// Keys of all live reservations
    async fn list(&self) -> Result<Vec<String>, StoreError>;

    /// Physically drop expired records. Returns how many were removed.
    async fn evict_expired(&self) -> Result<usize, StoreError>;
}
