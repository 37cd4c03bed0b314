use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chat_api::auth::{IdentityGate, JwtVerifier};
use chat_api::config::Config;
use chat_api::db::directory::PgDirectory;
use chat_api::db::pg::PgStore;
use chat_api::gateway::{ChatGateway, GatewaySettings};
use chat_api::AppState;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing; env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    // Connect to PostgreSQL.
    let db = chat_api::db::pool::connect(&config.database_url, 16).await;

    let store = Arc::new(PgStore::new(db.clone()));
    let directory = Arc::new(PgDirectory::new(db));
    let gate = IdentityGate::new(Arc::new(JwtVerifier::new(config.jwt_secret.as_bytes())));
    let gateway = ChatGateway::new(store, directory.clone(), GatewaySettings::from(&config));

    tracing::info!(worker_id = config.worker_id, "chat-api configured");

    let state = AppState {
        config: Arc::new(config),
        gate,
        directory,
        gateway: Arc::new(gateway),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(chat_api::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "chat-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}
