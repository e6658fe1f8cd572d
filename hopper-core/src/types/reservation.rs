use serde::{Deserialize, Serialize};

/// Cooldown applied to a freshly selected server, in seconds.
pub const DEFAULT_COOLDOWN_TTL_SECS: u64 = 450;

/// A time-bound exclusion record keyed by candidate id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Candidate id the record excludes
    pub key: String,
    /// Opaque marker written by the selector
    pub marker: String,
    /// When the reservation was written (ms since epoch)
    pub reserved_at: u64,
    /// When the store stops reporting it (reserved_at + ttl)
    pub expires_at: u64,
}

impl Reservation {
    pub fn new(key: String, marker: String, ttl_secs: u64, now: u64) -> Self {
        Self {
            key,
            marker,
            reserved_at: now,
            expires_at: now.saturating_add(ttl_secs.saturating_mul(1000)),
        }
    }

    /// A record is live strictly before its expiry instant.
    pub fn is_active(&self, now: u64) -> bool {
        now < self.expires_at
    }
}
