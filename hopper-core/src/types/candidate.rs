use serde::{Deserialize, Deserializer, Serialize};

fn default_status() -> String {
    "unknown".to_string()
}

/// `null` ids read as empty so the eligibility filter can reject them.
fn id_or_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// One server instance under consideration for selection.
///
/// Field names follow the upstream listing format (`playing`, `maxPlayers`);
/// the more generic `occupancy` / `capacity` spellings are accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Opaque server identifier. Empty when the payload omitted it or sent `null`.
    #[serde(default, deserialize_with = "id_or_empty")]
    pub id: String,
    /// Current occupancy
    #[serde(default, alias = "occupancy")]
    pub playing: u32,
    /// Capacity
    #[serde(default, rename = "maxPlayers", alias = "max_players", alias = "capacity")]
    pub max_players: u32,
    /// Free-form status tag
    #[serde(default = "default_status")]
    pub status: String,
}

impl Candidate {
    pub fn new(id: impl Into<String>, playing: u32, max_players: u32) -> Self {
        Self {
            id: id.into(),
            playing,
            max_players,
            status: default_status(),
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }
}

/// Requested ordering of a listing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(rename = "Asc")]
    Ascending,
    #[serde(rename = "Desc")]
    Descending,
}

impl SortOrder {
    pub fn as_query(self) -> &'static str {
        match self {
            SortOrder::Ascending => "Asc",
            SortOrder::Descending => "Desc",
        }
    }
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_query())
    }
}

/// A single request against the upstream listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Continuation token; `None` requests the first page
    pub cursor: Option<String>,
    pub sort_order: SortOrder,
    pub limit: u32,
}

/// One page of the upstream listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePage {
    #[serde(default)]
    pub data: Vec<Candidate>,
    /// Absent on the final page
    #[serde(default, rename = "nextPageCursor", alias = "next_page_cursor")]
    pub next_page_cursor: Option<String>,
}

impl CandidatePage {
    pub fn new(data: Vec<Candidate>, next_page_cursor: Option<String>) -> Self {
        Self {
            data,
            next_page_cursor,
        }
    }

    pub fn is_last(&self) -> bool {
        self.next_page_cursor.as_deref().is_none_or(str::is_empty)
    }
}

/// The winner of a selection pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub id: String,
    pub playing: u32,
    #[serde(rename = "maxPlayers")]
    pub max_players: u32,
}

impl From<&Candidate> for Selection {
    fn from(candidate: &Candidate) -> Self {
        Self {
            id: candidate.id.clone(),
            playing: candidate.playing,
            max_players: candidate.max_players,
        }
    }
}
