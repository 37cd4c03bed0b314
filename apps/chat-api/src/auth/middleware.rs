//! Bearer-token extraction for REST routes.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::error::ApiError;
use crate::models::user::Identity;
use crate::AppState;

/// Authenticated caller extracted from the `Authorization: Bearer <jwt>` header.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

        if !header.starts_with("Bearer ") {
            return Err(ApiError::unauthorized("Invalid Authorization header format"));
        }

        let identity = state.gate.authenticate(Some(header)).await?;
        Ok(AuthUser(identity))
    }
}
