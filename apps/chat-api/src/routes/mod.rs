pub mod conversations;
pub mod health;
pub mod users;

use axum::Router;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::gateway::server::router())
        .nest(
            "/api/v1",
            conversations::router().merge(users::router()),
        )
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health,
        // Conversations
        conversations::list_conversations,
        conversations::unread_total,
        conversations::mark_conversation_read,
        // Users
        users::search_users,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::FieldError,
            // Models
            crate::models::user::Identity,
            crate::models::conversation::ConversationView,
            crate::models::message::DirectMessage,
            crate::models::message::RoomMessage,
            // Route request/response types
            health::HealthResponse,
            conversations::ConversationsResponse,
            conversations::UnreadResponse,
            conversations::MarkReadResponse,
            users::SearchUsersResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Conversations", description = "Direct message conversations"),
        (name = "Users", description = "User directory"),
    )
)]
pub struct ApiDoc;
