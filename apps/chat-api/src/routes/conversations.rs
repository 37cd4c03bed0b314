//! Conversation list, unread totals and explicit mark-as-read.

use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody};
use crate::models::conversation::ConversationView;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/conversations", get(list_conversations))
        .route("/conversations/{username}/read", put(mark_conversation_read))
        .route("/unread", get(unread_total))
}

// ---------------------------------------------------------------------------
// GET /api/v1/conversations
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct ConversationsResponse {
    pub conversations: Vec<ConversationView>,
}

#[utoipa::path(
    get,
    path = "/api/v1/conversations",
    tag = "Conversations",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Conversations, newest activity first", body = ConversationsResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn list_conversations(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ConversationsResponse>, ApiError> {
    let conversations = state.gateway.direct.list_conversations(&identity).await?;
    Ok(Json(ConversationsResponse { conversations }))
}

// ---------------------------------------------------------------------------
// GET /api/v1/unread
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct UnreadResponse {
    pub unread_count: i64,
}

#[utoipa::path(
    get,
    path = "/api/v1/unread",
    tag = "Conversations",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Unread direct messages across all conversations", body = UnreadResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn unread_total(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UnreadResponse>, ApiError> {
    let unread_count = state.gateway.direct.unread_total(&identity).await?;
    Ok(Json(UnreadResponse { unread_count }))
}

// ---------------------------------------------------------------------------
// PUT /api/v1/conversations/:username/read
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct MarkReadResponse {
    pub marked: u64,
}

#[utoipa::path(
    put,
    path = "/api/v1/conversations/{username}/read",
    tag = "Conversations",
    security(("bearer" = [])),
    params(
        ("username" = String, Path, description = "Counterpart username"),
    ),
    responses(
        (status = 200, description = "Messages from the counterpart marked read", body = MarkReadResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 404, description = "User not found", body = ApiErrorBody),
    ),
)]
pub async fn mark_conversation_read(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<MarkReadResponse>, ApiError> {
    let marked = state.gateway.direct.mark_read(&identity, &username).await?;
    Ok(Json(MarkReadResponse { marked }))
}
