//! REST API Server for the Catalog Agent Orchestrator
//!
//! Exposes the workflow engine via HTTP endpoints
//! Integrates with the artist cabinet frontend

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::models::{Question, WorkflowState};
use crate::workflow::WorkflowEngine;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QueryRequest {
    pub question: String,
    pub uuid: Option<String>,
    pub artist_name: Option<String>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<WorkflowEngine>,
}

/// =============================
/// Helpers — Session Identity
/// =============================

fn stable_uuid_from_string(input: &str) -> uuid::Uuid {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    uuid::Uuid::from_bytes(bytes)
}

fn parse_or_stable_uuid(value: Option<&str>, fallback_seed: &str) -> uuid::Uuid {
    match value {
        Some(v) if !v.trim().is_empty() => {
            uuid::Uuid::parse_str(v).unwrap_or_else(|_| stable_uuid_from_string(v))
        }
        _ => stable_uuid_from_string(fallback_seed),
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Main Query Endpoint
/// =============================

async fn run_query(
    State(state): State<ApiState>,
    Json(req): Json<QueryRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    if req.question.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Question must not be empty".into())),
        );
    }

    let session_id = parse_or_stable_uuid(req.uuid.as_deref(), "anonymous-session");
    info!(session = %session_id, "Received query: {}", req.question);

    let mut question = Question::new(req.question, session_id.to_string());
    if let Some(artist) = req.artist_name.filter(|a| !a.trim().is_empty()) {
        question = question.with_artist(artist);
    }

    let outcome = state.engine.run(&question).await;

    let mut data = match serde_json::to_value(&outcome) {
        Ok(data) => data,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(format!("Failed to serialise outcome: {}", e))),
            )
        }
    };
    data["uuid"] = serde_json::json!(session_id.to_string());

    // Infrastructure failures map to 5xx with an error envelope; the
    // serialized outcome still rides along for the frontend.
    match outcome.state {
        WorkflowState::Failed => {
            let message = outcome
                .error
                .clone()
                .unwrap_or_else(|| outcome.answer.clone());
            let mut response = ApiResponse::error(message);
            response.data = Some(data);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(response))
        }
        _ => (StatusCode::OK, Json(ApiResponse::success(data))),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(engine: Arc<WorkflowEngine>) -> Router {
    let state = ApiState { engine };

    Router::new()
        .route("/health", axum::routing::get(health))
        .route("/query", post(run_query))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    engine: Arc<WorkflowEngine>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(engine);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
