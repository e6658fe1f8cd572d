use std::time::Duration;

/// A candidate batch that cannot be used as selector input.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Malformed candidate batch: {0}")]
    Malformed(String),
}

/// Failure of a single upstream listing fetch.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Upstream transport error: {0}")]
    Transport(String),

    #[error("Upstream returned status {0}")]
    Status(u16),

    #[error("Upstream rate limited the request")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Upstream page could not be decoded: {0}")]
    Decode(String),

    #[error("Upstream fetch timed out after {0:?}")]
    Timeout(Duration),
}

impl FetchError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FetchError::RateLimited { .. })
    }
}

/// The reservation store could not answer.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Reservation store error: {0}")]
    Backend(String),

    #[error("Reservation store timed out after {0:?}")]
    Timeout(Duration),
}

/// Outcome of a selection that did not produce a winner.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectError {
    #[error("No eligible unreserved server found after {attempts} pass(es)")]
    NotFound { attempts: u32 },

    #[error("Selection pass exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),

    #[error("No listing endpoint configured for polling search")]
    NoListing,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SelectError {
    /// True for outcomes where the search ran correctly but found nothing.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SelectError::NotFound { .. } | SelectError::DeadlineExceeded(_)
        )
    }
}

/// A configuration file that could not be loaded.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}
