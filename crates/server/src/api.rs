//! JSON API for the conversational logging surface and saved interactions.
//!
//! Endpoints:
//! - `POST   /api/chat`               — one conversational turn against a session
//! - `POST   /api/reset`              — clear a session's form and history
//! - `POST   /api/interactions`       — validate and save the record
//! - `GET    /api/interactions`       — list saved interactions (newest first)
//! - `GET    /api/interactions/{id}`  — fetch one saved interaction
//! - `PATCH  /api/interactions/{id}`  — direct field edits on a saved interaction
//! - `DELETE /api/interactions/{id}`  — delete a saved interaction

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use uuid::Uuid;

use fieldrep_agent::{AgentRuntime, SessionStore};
use fieldrep_core::{
    ApplicationError, InteractionRecord, InterfaceError, RecordPatch, ALL_FIELDS,
};
use fieldrep_db::repositories::{InteractionRepository, RepositoryError};

#[derive(Clone)]
pub struct ApiState {
    pub runtime: Arc<AgentRuntime>,
    pub sessions: Arc<SessionStore>,
    pub repository: Arc<dyn InteractionRepository>,
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<Uuid>,
    /// When set, the session is bound to this saved interaction and the
    /// conversation edits it instead of building a fresh record.
    pub interaction_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: Uuid,
    pub form_data: InteractionRecord,
    pub chat_reply: String,
    pub intent: Option<&'static str>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetRequest {
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub id: i64,
    pub record: InteractionRecord,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub interactions: Vec<InteractionRecord>,
    pub count: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ApiError {
    NotFound { message: String, correlation_id: String },
    Interface(InterfaceError),
}

impl ApiError {
    fn from_repository(error: RepositoryError, correlation_id: &str) -> Self {
        match error {
            RepositoryError::NotFound(id) => Self::NotFound {
                message: format!("interaction {id} not found"),
                correlation_id: correlation_id.to_string(),
            },
            other => Self::Interface(
                ApplicationError::Persistence(other.to_string())
                    .into_interface(correlation_id),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound { message, correlation_id } => {
                warn!(event_name = "api.request.not_found", correlation_id = %correlation_id, %message);
                let body = serde_json::json!({
                    "error": message,
                    "correlation_id": correlation_id,
                });
                (StatusCode::NOT_FOUND, Json(body)).into_response()
            }
            Self::Interface(error) => {
                warn!(
                    event_name = "api.request.failed",
                    correlation_id = %error.correlation_id(),
                    error = %error,
                );
                let status = match &error {
                    InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
                    InterfaceError::UnprocessableRecord { .. } => {
                        StatusCode::UNPROCESSABLE_ENTITY
                    }
                    InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                    InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let mut body = serde_json::json!({
                    "error": error.user_message(),
                    "correlation_id": error.correlation_id(),
                });
                if let InterfaceError::UnprocessableRecord { violations, .. } = &error {
                    body["violations"] = serde_json::json!(violations);
                }
                (status, Json(body)).into_response()
            }
        }
    }
}

fn new_correlation_id() -> String {
    Uuid::new_v4().simple().to_string()
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/reset", post(reset))
        .route("/api/interactions", post(save_interaction).get(list_interactions))
        .route(
            "/api/interactions/{id}",
            get(get_interaction).patch(patch_interaction).delete(delete_interaction),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn chat(
    State(state): State<ApiState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let correlation_id = new_correlation_id();
    let message = body.message.trim();
    if message.is_empty() {
        return Err(ApiError::Interface(InterfaceError::BadRequest {
            message: "message must not be empty".to_string(),
            correlation_id,
        }));
    }

    let (session_id, handle) = state.sessions.get_or_create(body.session_id).await;
    let mut session = handle.lock().await;

    if let Some(interaction_id) = body.interaction_id {
        if session.bound_interaction_id() != Some(interaction_id) {
            let record = state
                .repository
                .load(interaction_id)
                .await
                .map_err(|e| ApiError::from_repository(e, &correlation_id))?;
            session.bind_interaction(interaction_id, record);
        }
    }

    match state.runtime.handle_turn(&mut session, message).await {
        Ok(outcome) => {
            info!(
                event_name = "api.chat.turn_completed",
                correlation_id = %correlation_id,
                session_id = %session_id,
                intent = outcome.intent.as_str(),
            );
            Ok(Json(ChatResponse {
                session_id,
                form_data: outcome.record,
                chat_reply: outcome.reply,
                intent: Some(outcome.intent.as_str()),
            }))
        }
        // A failed turn is a conversational outcome, not an HTTP failure:
        // the record is untouched and the reply says how to recover.
        Err(error) => {
            warn!(
                event_name = "api.chat.turn_failed",
                correlation_id = %correlation_id,
                session_id = %session_id,
                error = %error,
            );
            Ok(Json(ChatResponse {
                session_id,
                form_data: session.current_record().clone(),
                chat_reply: error.user_message(),
                intent: None,
            }))
        }
    }
}

async fn reset(
    State(state): State<ApiState>,
    Json(body): Json<ResetRequest>,
) -> Json<ChatResponse> {
    let (session_id, handle) = state.sessions.get_or_create(body.session_id).await;
    let mut session = handle.lock().await;
    session.reset();

    info!(event_name = "api.session.reset", session_id = %session_id);

    Json(ChatResponse {
        session_id,
        form_data: InteractionRecord::default(),
        chat_reply: "Cleared the form and conversation. Ready for a new interaction.".to_string(),
        intent: None,
    })
}

async fn save_interaction(
    State(state): State<ApiState>,
    Json(mut record): Json<InteractionRecord>,
) -> Result<(StatusCode, Json<SaveResponse>), ApiError> {
    let correlation_id = new_correlation_id();
    record.derive_provenance();

    let violations = record.validate_for_save();
    if !violations.is_empty() {
        return Err(ApiError::Interface(
            ApplicationError::Validation(violations).into_interface(correlation_id),
        ));
    }

    let id = state
        .repository
        .save(&record)
        .await
        .map_err(|e| ApiError::from_repository(e, &correlation_id))?;
    record.id = Some(id);

    info!(
        event_name = "api.interaction.saved",
        correlation_id = %correlation_id,
        interaction_id = id,
    );

    Ok((StatusCode::CREATED, Json(SaveResponse { id, record })))
}

async fn list_interactions(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    let correlation_id = new_correlation_id();
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let offset = query.offset.unwrap_or(0).max(0);

    let interactions = state
        .repository
        .list(limit, offset)
        .await
        .map_err(|e| ApiError::from_repository(e, &correlation_id))?;
    let count = interactions.len();

    Ok(Json(ListResponse { interactions, count }))
}

async fn get_interaction(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<InteractionRecord>, ApiError> {
    let correlation_id = new_correlation_id();
    let record = state
        .repository
        .load(id)
        .await
        .map_err(|e| ApiError::from_repository(e, &correlation_id))?;
    Ok(Json(record))
}

async fn patch_interaction(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(patch): Json<RecordPatch>,
) -> Result<Json<InteractionRecord>, ApiError> {
    let correlation_id = new_correlation_id();
    let existing = state
        .repository
        .load(id)
        .await
        .map_err(|e| ApiError::from_repository(e, &correlation_id))?;

    // Direct edits carry full field authority; merge rules (accumulation,
    // closed material vocabulary) still apply.
    let (next, changeset) = existing.apply_patch(&patch, ALL_FIELDS);

    let violations = next.validate_for_save();
    if !violations.is_empty() {
        return Err(ApiError::Interface(
            ApplicationError::Validation(violations).into_interface(correlation_id),
        ));
    }

    let updated = state
        .repository
        .update(id, &next)
        .await
        .map_err(|e| ApiError::from_repository(e, &correlation_id))?;

    info!(
        event_name = "api.interaction.patched",
        correlation_id = %correlation_id,
        interaction_id = id,
        changed_fields = changeset.changes.len(),
        rejected_fields = changeset.rejected.len(),
    );

    Ok(Json(updated))
}

async fn delete_interaction(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let correlation_id = new_correlation_id();
    state
        .repository
        .delete(id)
        .await
        .map_err(|e| ApiError::from_repository(e, &correlation_id))?;

    info!(
        event_name = "api.interaction.deleted",
        correlation_id = %correlation_id,
        interaction_id = id,
    );

    Ok(StatusCode::NO_CONTENT)
}
