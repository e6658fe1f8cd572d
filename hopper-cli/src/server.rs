use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use hopper_core::client::HopperClient;
use hopper_core::source::parse_batch;

use crate::handlers::*;

pub type AppState = Arc<HopperClient>;

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        // Health is always open (no auth)
        .route("/health", get(health))
        // Protected routes
        .route("/", post(select_server))
        .route("/reservations", get(list_reservations))
        .route("/evict", post(evict_expired))
        .layer(middleware::from_fn(auth_middleware))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run(
    host: &str,
    port: u16,
    client: HopperClient,
    max_body_bytes: usize,
) -> anyhow::Result<()> {
    let state: AppState = Arc::new(client);
    let app = router(state, max_body_bytes);

    let addr = format!("{}:{}", host, port);

    if std::env::var("HOPPER_API_KEY").is_ok() {
        tracing::info!("🔐 API key authentication enabled");
    } else {
        tracing::warn!("⚠️  No HOPPER_API_KEY set, server is open (dev mode)");
    }

    tracing::info!("🎯 Hopper server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

// ─── Auth Middleware ────────────────────────────────────────────────────────

async fn auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // If no API key is configured, allow all requests (dev mode)
    let expected_key = match std::env::var("HOPPER_API_KEY") {
        Ok(key) if !key.is_empty() => key,
        _ => return Ok(next.run(request).await),
    };

    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    if token == expected_key {
        Ok(next.run(request).await)
    } else {
        tracing::warn!("🚫 Unauthorized request to {}", request.uri().path());
        Err(StatusCode::UNAUTHORIZED)
    }
}

// ─── Handlers ───────────────────────────────────────────────────────────────

async fn select_server(
    State(client): State<AppState>,
    Query(query): Query<SelectQuery>,
    body: String,
) -> SelectReply {
    let started = Instant::now();

    let outcome = if body.trim().is_empty() {
        tracing::info!("📡 No batch supplied, searching upstream listing");
        client.search().await
    } else {
        match parse_batch(&body) {
            Ok(batch) => {
                tracing::info!(servers = batch.len(), "📦 Received servers from client");
                client.select_from_batch(batch).await
            }
            Err(e) => {
                tracing::warn!(error = %e, "❌ Rejected request body");
                return SelectReply::BadRequest(e.to_string());
            }
        }
    };

    if let Err(e) = &outcome {
        if e.is_not_found() {
            tracing::warn!(reason = %e, "🚫 No unvisited servers found");
        } else {
            tracing::error!(error = %e, "Selection failed");
        }
    }

    let reply = SelectReply::from_outcome(outcome, query.wants_json());
    tracing::info!(
        status = reply.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "⏱️ Selection request completed"
    );
    reply
}

async fn health(State(client): State<AppState>) -> Response {
    match client.active_reservations().await {
        Ok(keys) => Json(ApiResponse::ok(HealthResponse {
            status: "ok".to_string(),
            active_reservations: keys.len(),
            polling: client.has_listing(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }))
        .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::<HealthResponse>::err(e.to_string())),
        )
            .into_response(),
    }
}

async fn list_reservations(State(client): State<AppState>) -> Response {
    match client.active_reservations().await {
        Ok(mut keys) => {
            keys.sort();
            Json(ApiResponse::ok(keys)).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<Vec<String>>::err(e.to_string())),
        )
            .into_response(),
    }
}

async fn evict_expired(State(client): State<AppState>) -> Response {
    match client.evict_expired().await {
        Ok(evicted) => {
            tracing::info!(evicted = evicted, "Expired reservations evicted");
            Json(ApiResponse::ok(EvictResponse { evicted })).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<EvictResponse>::err(e.to_string())),
        )
            .into_response(),
    }
}
