pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod routes;

use std::sync::Arc;

use auth::IdentityGate;
use config::Config;
use db::UserDirectory;
use gateway::ChatGateway;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gate: IdentityGate,
    pub directory: Arc<dyn UserDirectory>,
    pub gateway: Arc<ChatGateway>,
}
