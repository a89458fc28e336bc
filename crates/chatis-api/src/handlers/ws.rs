//! WebSocket upgrade handler.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use chatis_realtime::connection::heartbeat::{HeartbeatConfig, Pulse, pulse};
use chatis_realtime::message::serializer::encode_server_event;
use chatis_realtime::{AuthenticatedIdentity, CloseReason, ConnectionHandle, ServerEvent, Session};

use crate::error::ApiError;
use crate::extractors::bearer_token;
use crate::state::AppState;

/// Query parameter for WebSocket authentication.
#[derive(Debug, Default, serde::Deserialize)]
pub struct WsQuery {
    /// JWT access token.
    pub token: Option<String>,
}

/// GET /ws?token={jwt}
///
/// WebSocket upgrade.
///
/// The token may also be sent as `Authorization: Bearer`. Verification runs
/// before the upgrade; a rejected credential gets a 401 and no connection.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let token = query.token.as_deref().or_else(|| bearer_token(&headers));
    let identity = state.realtime.authenticate(token).await?;

    let max_bytes = state.realtime.config().max_message_bytes;
    Ok(ws
        .max_message_size(max_bytes.saturating_mul(2))
        .on_upgrade(move |socket| handle_socket(state, identity, socket)))
}

/// Drives one established connection until it closes.
async fn handle_socket(state: AppState, identity: AuthenticatedIdentity, socket: WebSocket) {
    let engine = state.realtime.clone();
    let Session {
        identity,
        handle,
        outbound,
    } = match engine.connect(identity).await {
        Ok(session) => session,
        Err(e) => {
            warn!(error = %e, "Failed to register connection");
            return;
        }
    };

    let (ws_tx, mut ws_rx) = socket.split();
    let writer = tokio::spawn(write_loop(
        Arc::clone(&handle),
        outbound,
        ws_tx,
        engine.heartbeat(),
    ));

    loop {
        tokio::select! {
            _ = handle.cancelled() => break,
            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    engine.handle_inbound(&identity, &handle, text.as_str()).await;
                }
                Some(Ok(Message::Binary(_))) => {
                    handle.touch();
                    engine.reject_frame(&handle, "Binary frames are not supported");
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => handle.touch(),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(conn_id = %handle.id, error = %e, "WebSocket read error");
                    break;
                }
            },
        }
    }

    engine.disconnect(&handle, CloseReason::ClientClosed).await;
    if let Err(e) = writer.await {
        warn!(conn_id = %handle.id, error = %e, "Writer task failed");
    }
}

/// Forwards routed events to the socket, runs the heartbeat, and sends the
/// close frame once the connection is closed.
async fn write_loop(
    handle: Arc<ConnectionHandle>,
    mut outbound: mpsc::Receiver<ServerEvent>,
    mut ws_tx: SplitSink<WebSocket, Message>,
    heartbeat: HeartbeatConfig,
) {
    let mut ticker = heartbeat.interval();

    loop {
        tokio::select! {
            _ = handle.cancelled() => break,
            event = outbound.recv() => {
                let Some(event) = event else { break };
                let text = match encode_server_event(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(conn_id = %handle.id, event = event.name(), error = %e, "Failed to encode event");
                        continue;
                    }
                };
                if ws_tx.send(Message::Text(text.into())).await.is_err() {
                    handle.close(CloseReason::TransportClosed);
                    break;
                }
            }
            _ = ticker.tick() => match pulse(&handle, &heartbeat) {
                Pulse::Ping => {
                    if ws_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                        handle.close(CloseReason::TransportClosed);
                        break;
                    }
                }
                Pulse::Expired => {
                    warn!(conn_id = %handle.id, idle = ?handle.idle_for(), "Heartbeat timeout");
                    handle.close(CloseReason::HeartbeatTimeout);
                    break;
                }
            },
        }
    }

    let reason = handle.close_reason().unwrap_or(CloseReason::ClientClosed);
    let frame = CloseFrame {
        code: close_code_for(reason),
        reason: Utf8Bytes::from_static(reason.as_str()),
    };
    let _ = ws_tx.send(Message::Close(Some(frame))).await;
}

fn close_code_for(reason: CloseReason) -> u16 {
    match reason {
        CloseReason::Superseded => close_code::POLICY,
        CloseReason::HeartbeatTimeout | CloseReason::Shutdown => close_code::AWAY,
        CloseReason::ClientClosed | CloseReason::Logout | CloseReason::TransportClosed => {
            close_code::NORMAL
        }
    }
}
