//! # hopper-core
//!
//! The reservation-and-selection kernel behind `hopper`.
//! Picks the first eligible, unreserved server from a batch or a paginated
//! upstream listing and reserves it for a cooldown window with an atomic
//! conditional write.

pub mod client;
pub mod clock;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod infrastructure;
#[path = "infrastructure_in_memory.rs"]
pub mod infrastructure_in_memory;
#[cfg(feature = "sqlite")]
#[path = "infrastructure_sqlite.rs"]
pub mod infrastructure_sqlite;
pub mod retry;
pub mod selector;
pub mod source;
pub mod types;
pub mod upstream;

#[cfg(test)]
mod testing;
