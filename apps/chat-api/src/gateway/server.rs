//! WebSocket upgrade handler and per-connection event loop.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time;

use crate::error::ApiError;
use crate::models::user::Identity;
use crate::AppState;

use super::events::{ClientCommand, ServerEvent};
use super::handler::{handle_command, HEARTBEAT_INTERVAL_MS};
use super::session::Session;
use super::ChatGateway;

/// Close codes (4000-range for application-level).
const CLOSE_UNKNOWN_ERROR: u16 = 4000;
const CLOSE_SESSION_TIMEOUT: u16 = 4009;

type WsSink = SplitSink<WebSocket, Message>;
type WsStream = SplitStream<WebSocket>;

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub token: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/gateway", get(ws_upgrade))
}

/// Authenticate before upgrading: a rejected token never reaches the
/// registry and nobody hears about it.
async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let token = params
        .token
        .as_deref()
        .or_else(|| headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()));

    let identity = match state.gate.authenticate(token).await {
        Ok(identity) => identity,
        Err(err) => {
            tracing::debug!(%err, "gateway handshake rejected");
            return Err(err.into());
        }
    };

    let gateway = state.gateway.clone();
    Ok(ws.on_upgrade(move |socket| handle_connection(socket, gateway, identity)))
}

async fn handle_connection(socket: WebSocket, gateway: Arc<ChatGateway>, identity: Identity) {
    let (session, events) = gateway.connect(identity);

    tracing::info!(
        user_id = %session.user_id(),
        connection_id = %session.connection_id(),
        "gateway session established"
    );

    let (ws_tx, ws_rx) = socket.split();
    run_session(&gateway, &session, ws_tx, ws_rx, events).await;

    let went_offline = gateway.disconnect(&session);

    tracing::info!(
        user_id = %session.user_id(),
        connection_id = %session.connection_id(),
        went_offline,
        "gateway session ended"
    );
}

/// Main session event loop: run client commands, forward queued events,
/// enforce heartbeat.
async fn run_session(
    gateway: &ChatGateway,
    session: &Session,
    mut ws_tx: WsSink,
    mut ws_rx: WsStream,
    mut events: UnboundedReceiver<ServerEvent>,
) {
    // Heartbeat deadline: client must heartbeat within 1.5× the interval.
    let heartbeat_deadline = Duration::from_millis(HEARTBEAT_INTERVAL_MS * 3 / 2);
    let mut heartbeat_timer = time::interval(heartbeat_deadline);
    heartbeat_timer.tick().await; // First tick fires immediately; skip it.
    let mut got_heartbeat = true;

    loop {
        tokio::select! {
            // Client sends us a message.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let value: serde_json::Value = match serde_json::from_str(&text) {
                            Ok(v) => v,
                            Err(_) => {
                                let _ = send_close(&mut ws_tx, CLOSE_UNKNOWN_ERROR, "Invalid JSON").await;
                                break;
                            }
                        };

                        let command: ClientCommand = match serde_json::from_value(value) {
                            Ok(c) => c,
                            Err(e) => {
                                tracing::debug!(%e, user_id = %session.user_id(), "unrecognised command");
                                session.deliver(ServerEvent::notification("Unknown command"));
                                continue;
                            }
                        };

                        if matches!(command, ClientCommand::Heartbeat { .. }) {
                            got_heartbeat = true;
                        }
                        handle_command(gateway, session, command).await;
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(?e, user_id = %session.user_id(), "ws read error");
                        break;
                    }
                    _ => continue,
                }
            }

            // Event queued for this connection.
            event = events.recv() => {
                let Some(event) = event else { break };
                let json = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(%e, event = event.name(), "failed to serialise event");
                        continue;
                    }
                };
                if ws_tx.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }

            // Heartbeat timeout check.
            _ = heartbeat_timer.tick() => {
                if !got_heartbeat {
                    tracing::debug!(
                        user_id = %session.user_id(),
                        "heartbeat timeout, closing connection"
                    );
                    let _ = send_close(&mut ws_tx, CLOSE_SESSION_TIMEOUT, "Heartbeat timeout").await;
                    break;
                }
                got_heartbeat = false;
            }
        }
    }
}

/// Send a WebSocket close frame with a code and reason.
async fn send_close(ws_tx: &mut WsSink, code: u16, reason: &str) -> Result<(), axum::Error> {
    let close_msg = Message::Close(Some(axum::extract::ws::CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close_msg).await
}
