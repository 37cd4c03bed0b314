//! User search for starting new conversations.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::models::user::Identity;
use crate::AppState;

const SEARCH_LIMIT: i64 = 10;

pub fn router() -> Router<AppState> {
    Router::new().route("/users/search", get(search_users))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchParams {
    /// Case-insensitive substring of a username or email.
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SearchUsersResponse {
    pub users: Vec<Identity>,
}

#[utoipa::path(
    get,
    path = "/api/v1/users/search",
    tag = "Users",
    security(("bearer" = [])),
    params(SearchParams),
    responses(
        (status = 200, description = "Matching users, caller excluded", body = SearchUsersResponse),
        (status = 400, description = "Missing query", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn search_users(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchUsersResponse>, ApiError> {
    let query = params.q.trim();
    if query.is_empty() {
        return Err(ApiError::validation(vec![FieldError {
            field: "q".to_string(),
            message: "Search query is required".to_string(),
        }]));
    }

    // One extra so the caller can be dropped without shrinking the page.
    let users = state
        .directory
        .search(query, SEARCH_LIMIT + 1)
        .await?
        .into_iter()
        .filter(|u| u.id != identity.id)
        .take(SEARCH_LIMIT as usize)
        .collect();

    Ok(Json(SearchUsersResponse { users }))
}
