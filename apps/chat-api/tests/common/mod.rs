#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use jsonwebtoken::{EncodingKey, Header};

use chat_api::auth::gate::CredentialClaims;
use chat_api::auth::{IdentityGate, JwtVerifier};
use chat_api::config::Config;
use chat_api::db::directory::MemoryDirectory;
use chat_api::db::memory::MemoryStore;
use chat_api::gateway::{ChatGateway, GatewaySettings};
use chat_api::models::user::Identity;
use chat_api::AppState;

pub const TEST_SECRET: &str = "chat-test-secret";

/// Handles to the in-memory backends behind a test `AppState`.
pub struct TestBackends {
    pub store: Arc<MemoryStore>,
    pub directory: Arc<MemoryDirectory>,
}

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://unused/chat_test".to_string(),
        jwt_secret: TEST_SECRET.to_string(),
        port: 0,
        worker_id: 0,
        room_backfill_limit: 50,
        history_default_limit: 50,
        history_max_limit: 200,
    }
}

/// Build a test AppState over the memory store and directory, seeded with
/// `users`.
pub fn test_state(users: &[Identity]) -> (AppState, TestBackends) {
    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    let directory = Arc::new(MemoryDirectory::with_users(users.iter().cloned()));
    let gate = IdentityGate::new(Arc::new(JwtVerifier::new(config.jwt_secret.as_bytes())));
    let gateway = ChatGateway::new(store.clone(), directory.clone(), GatewaySettings::from(&config));

    let state = AppState {
        config: Arc::new(config),
        gate,
        directory: directory.clone(),
        gateway: Arc::new(gateway),
    };

    (state, TestBackends { store, directory })
}

/// Build the full application router wired to the test state.
pub fn test_app(users: &[Identity]) -> (Router, AppState, TestBackends) {
    let (state, backends) = test_state(users);
    let app = chat_api::routes::router().with_state(state.clone());
    (app, state, backends)
}

/// Serve the router on an ephemeral port for WebSocket tests.
pub async fn start_server(users: &[Identity]) -> (SocketAddr, AppState, TestBackends) {
    let (app, state, backends) = test_app(users);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state, backends)
}

/// Mint a credential token for `identity` that expires `exp_offset_secs`
/// from now.
pub fn mint_token_with_exp(identity: &Identity, exp_offset_secs: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = CredentialClaims {
        user_id: identity.id.clone(),
        username: identity.username.clone(),
        email: Some(format!("{}@example.com", identity.username)),
        exp: now + exp_offset_secs,
        iat: Some(now),
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("mint test token")
}

pub fn mint_token(identity: &Identity) -> String {
    mint_token_with_exp(identity, 300)
}

pub fn alice() -> Identity {
    Identity::new("usr_alice", "alice")
}

pub fn bob() -> Identity {
    Identity::new("usr_bob", "bob")
}

pub fn carol() -> Identity {
    Identity::new("usr_carol", "carol")
}

pub fn everyone() -> Vec<Identity> {
    vec![alice(), bob(), carol()]
}
