use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use hopper_core::error::SelectError;
use hopper_core::types::Selection;

/// Body returned when no eligible, unreserved server exists.
pub const NOT_FOUND_BODY: &str = "NO_SERVER";

// ─── Request Types ──────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct SelectQuery {
    /// `json` for a structured reply, anything else for a bare id
    pub format: Option<String>,
}

impl SelectQuery {
    pub fn wants_json(&self) -> bool {
        self.format
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case("json"))
    }
}

// ─── Response Types ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SelectionResponse {
    pub id: String,
    pub playing: u32,
}

/// Outcome of one selection request, ready to be rendered.
#[derive(Debug)]
pub enum SelectReply {
    Id(String),
    Structured(SelectionResponse),
    NotFound,
    BadRequest(String),
    ServerError(String),
}

impl SelectReply {
    pub fn from_outcome(outcome: Result<Selection, SelectError>, json: bool) -> Self {
        match outcome {
            Ok(selection) if json => SelectReply::Structured(SelectionResponse {
                id: selection.id,
                playing: selection.playing,
            }),
            Ok(selection) => SelectReply::Id(selection.id),
            Err(e) if e.is_not_found() => SelectReply::NotFound,
            Err(SelectError::NoListing) => {
                SelectReply::BadRequest("No servers received and no listing configured".to_string())
            }
            Err(e) => SelectReply::ServerError(e.to_string()),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            SelectReply::Id(_) | SelectReply::Structured(_) => StatusCode::OK,
            SelectReply::NotFound => StatusCode::NOT_FOUND,
            SelectReply::BadRequest(_) => StatusCode::BAD_REQUEST,
            SelectReply::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SelectReply {
    fn into_response(self) -> Response {
        let status = self.status();
        let plain = [(header::CONTENT_TYPE, "text/plain")];
        match self {
            SelectReply::Id(id) => (status, plain, id).into_response(),
            SelectReply::Structured(body) => (status, Json(body)).into_response(),
            SelectReply::NotFound => (status, plain, NOT_FOUND_BODY).into_response(),
            SelectReply::BadRequest(msg) => {
                (status, plain, format!("Bad Request: {}", msg)).into_response()
            }
            SelectReply::ServerError(msg) => (status, plain, msg).into_response(),
        }
    }
}

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub active_reservations: usize,
    pub polling: bool,
    pub version: String,
}

#[derive(Serialize)]
pub struct EvictResponse {
    pub evicted: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use hopper_core::error::StoreError;
    use std::time::Duration;

    fn selection() -> Selection {
        Selection {
            id: "srv-1".to_string(),
            playing: 4,
            max_players: 10,
        }
    }

    #[test]
    fn success_is_bare_id_by_default() {
        let reply = SelectReply::from_outcome(Ok(selection()), false);
        assert_eq!(reply.status(), StatusCode::OK);
        assert!(matches!(reply, SelectReply::Id(ref id) if id == "srv-1"));
    }

    #[test]
    fn success_can_be_structured() {
        let reply = SelectReply::from_outcome(Ok(selection()), true);
        match reply {
            SelectReply::Structured(body) => {
                assert_eq!(body.id, "srv-1");
                assert_eq!(body.playing, 4);
            }
            other => panic!("expected structured reply, got {:?}", other),
        }
    }

    #[test]
    fn not_found_class_maps_to_404() {
        for err in [
            SelectError::NotFound { attempts: 1 },
            SelectError::DeadlineExceeded(Duration::from_secs(5)),
        ] {
            assert_eq!(SelectReply::from_outcome(Err(err), false).status(), StatusCode::NOT_FOUND);
        }
    }

    #[test]
    fn store_failure_maps_to_500() {
        let err = SelectError::Store(StoreError::Timeout(Duration::from_secs(2)));
        assert_eq!(
            SelectReply::from_outcome(Err(err), false).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn missing_listing_is_a_bad_request() {
        let reply = SelectReply::from_outcome(Err(SelectError::NoListing), false);
        assert_eq!(reply.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn format_query_is_case_insensitive() {
        let query = SelectQuery {
            format: Some("JSON".to_string()),
        };
        assert!(query.wants_json());
        assert!(!SelectQuery::default().wants_json());
    }
}
