use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{ContentKind, Genre, SelectionCriteria, SessionSnapshot, SpinResult, StreamingService},
    services::Session,
};

use super::AppState;

// Request/Response types

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: Uuid,
    #[serde(flatten)]
    pub snapshot: SessionSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct GenreQuery {
    #[serde(default)]
    kind: Option<ContentKind>,
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Streaming services that can be selected
pub async fn get_services() -> Json<&'static [StreamingService]> {
    Json(StreamingService::catalog())
}

/// Genre list for a content kind (movies by default)
pub async fn get_genres(
    State(state): State<AppState>,
    Query(params): Query<GenreQuery>,
) -> AppResult<Json<Vec<Genre>>> {
    let kind = params.kind.unwrap_or(ContentKind::Movie);
    let genres = state.provider.genres(kind).await?;
    Ok(Json(genres))
}

/// Start a new session with a full spin budget
pub async fn create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<SessionResponse>) {
    let session = state.create_session().await;
    tracing::info!(session_id = %session.id(), budget = state.spin_budget, "Session created");

    let response = SessionResponse {
        id: session.id(),
        snapshot: session.snapshot().await,
    };
    (StatusCode::CREATED, Json(response))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SessionResponse>> {
    let session = find_session(&state, id).await?;
    Ok(Json(SessionResponse {
        id,
        snapshot: session.snapshot().await,
    }))
}

/// Run one spin for the session
pub async fn spin(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(criteria): Json<SelectionCriteria>,
) -> AppResult<Json<SpinResult>> {
    let session = find_session(&state, id).await?;
    let result = session.spin(&state.engine, &criteria).await?;
    Ok(Json(result))
}

pub async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SessionResponse>> {
    let session = find_session(&state, id).await?;
    let snapshot = session.reset()?;
    Ok(Json(SessionResponse { id, snapshot }))
}

async fn find_session(state: &AppState, id: Uuid) -> AppResult<Session> {
    state
        .session(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("session {}", id)))
}
