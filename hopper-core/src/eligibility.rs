use serde::{Deserialize, Serialize};

use crate::types::Candidate;

/// Why a candidate was, or was not, accepted by the policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    /// Identifier is missing or empty
    MissingId,
    /// Status tag matched a blocked marker
    NonOperational(String),
    /// Nobody is playing and empty servers are excluded
    Empty,
    /// Occupancy reached capacity
    Full,
    /// Occupancy exceeds `capacity - slack`
    NoHeadroom,
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible)
    }
}

/// A pure, configurable predicate over (occupancy, capacity, status).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EligibilityPolicy {
    /// Reject candidates whose status contains one of `blocked_status_markers`
    pub filter_status: bool,
    /// Case-insensitive substrings marking a non-operational server
    pub blocked_status_markers: Vec<String>,
    /// Reject servers with zero occupancy
    pub exclude_empty: bool,
    /// Seats that must stay free on top of the full-server check
    pub slack: u32,
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self {
            filter_status: true,
            blocked_status_markers: vec!["reserved".to_string(), "closing".to_string()],
            exclude_empty: true,
            slack: 0,
        }
    }
}

impl EligibilityPolicy {
    /// A policy with every optional rule switched off: only the id and
    /// full-server checks remain.
    pub fn permissive() -> Self {
        Self {
            filter_status: false,
            blocked_status_markers: Vec::new(),
            exclude_empty: false,
            slack: 0,
        }
    }

    pub fn with_slack(mut self, slack: u32) -> Self {
        self.slack = slack;
        self
    }

    pub fn is_eligible(&self, candidate: &Candidate) -> bool {
        self.check(candidate).is_eligible()
    }

    pub fn check(&self, candidate: &Candidate) -> Eligibility {
        if candidate.id.trim().is_empty() {
            return Eligibility::MissingId;
        }

        if self.filter_status {
            let status = candidate.status.to_lowercase();
            if let Some(marker) = self
                .blocked_status_markers
                .iter()
                .find(|m| !m.is_empty() && status.contains(&m.to_lowercase()))
            {
                return Eligibility::NonOperational(marker.clone());
            }
        }

        if self.exclude_empty && candidate.playing == 0 {
            return Eligibility::Empty;
        }

        if candidate.playing >= candidate.max_players {
            return Eligibility::Full;
        }

        if candidate.playing > candidate.max_players.saturating_sub(self.slack) {
            return Eligibility::NoHeadroom;
        }

        Eligibility::Eligible
    }
}
