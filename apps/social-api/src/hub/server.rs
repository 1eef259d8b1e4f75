//! WebSocket upgrade handler and per-connection event loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time;

use crate::AppState;

use super::events::ClientMessage;
use super::fanout::EventHub;
use super::registry::Frame;

/// Close codes. 4000-range is application-level.
const CLOSE_GOING_AWAY: u16 = 1001;
const CLOSE_SESSION_TIMEOUT: u16 = 4009;

pub fn router() -> Router<AppState> {
    Router::new().route("/socket", get(ws_upgrade))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let Some(hub) = state.hub.get() else {
        tracing::warn!("socket upgrade before event hub installed");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };
    let ping_interval = state.config.ping_interval;
    let ping_timeout = state.config.ping_timeout;

    ws.on_upgrade(move |socket| handle_connection(socket, hub, ping_interval, ping_timeout))
}

async fn handle_connection(
    socket: WebSocket,
    hub: Arc<EventHub>,
    ping_interval: Duration,
    ping_timeout: Duration,
) {
    let (ws_tx, ws_rx) = socket.split();
    let (conn_id, outbound) = hub.connect();
    tracing::info!(%conn_id, "socket connected");

    run_connection(&hub, &conn_id, ws_tx, ws_rx, outbound, ping_interval, ping_timeout).await;

    hub.disconnect(&conn_id).await;
    tracing::info!(%conn_id, "socket disconnected");
}

const MIN_PING_INTERVAL: Duration = Duration::from_millis(10);

/// Main loop: apply control messages, forward queued frames, keep the
/// transport alive.
async fn run_connection(
    hub: &EventHub,
    conn_id: &str,
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut ws_rx: SplitStream<WebSocket>,
    mut outbound: mpsc::Receiver<Frame>,
    ping_interval: Duration,
    ping_timeout: Duration,
) {
    // `interval` panics on a zero period.
    let mut ping_timer = time::interval(ping_interval.max(MIN_PING_INTERVAL));
    ping_timer.tick().await; // First tick fires immediately; skip it.
    let mut last_heard = Instant::now();

    loop {
        tokio::select! {
            // Client sends us a message.
            msg = ws_rx.next() => {
                last_heard = Instant::now();
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(control) => hub.handle_client_message(conn_id, control).await,
                            Err(e) => {
                                tracing::warn!(%conn_id, error = %e, "ignoring malformed control frame");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(?e, %conn_id, "ws read error");
                        break;
                    }
                    _ => continue,
                }
            }

            // Frame queued by the hub.
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    let _ = send_close(&mut ws_tx, CLOSE_GOING_AWAY, "Server shutting down").await;
                    break;
                };
                if ws_tx.send(Message::Text(frame.to_string().into())).await.is_err() {
                    break;
                }
            }

            // Liveness.
            _ = ping_timer.tick() => {
                if last_heard.elapsed() > ping_timeout {
                    tracing::debug!(%conn_id, "ping timeout, closing connection");
                    let _ = send_close(&mut ws_tx, CLOSE_SESSION_TIMEOUT, "Ping timeout").await;
                    break;
                }
                if ws_tx.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Send a WebSocket close frame with a code and reason.
async fn send_close(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    code: u16,
    reason: &str,
) -> Result<(), axum::Error> {
    let close_msg = Message::Close(Some(axum::extract::ws::CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close_msg).await
}
