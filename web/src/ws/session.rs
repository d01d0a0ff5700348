//! WebSocket session lifecycle: handles a single connected client from upgrade
//! through disconnect.
//!
//! Frames in both directions are JSON envelopes `{ "event": <name>, "data": <payload> }`.
//! Inbound events:
//!
//! - `driver:location` with a location submission, run through the ingestion pipeline
//! - `subscribe:route` with a route id, joining that route group
//!
//! Rejected submissions are answered with `driver:error` to this connection only.

use crate::error::client_message;
use crate::AppState;
use axum::extract::ws::{Message, WebSocket};
use broadcast::connection::ConnectionId;
use broadcast::message::{Event, Message as OutboundMessage, MessageScope};
use domain::error::{ingestion_error, IngestionErrorKind};
use domain::{EntryPath, LocationSubmission};
use futures::{SinkExt, StreamExt};
use log::*;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;

const DRIVER_LOCATION: &str = "driver:location";
const SUBSCRIBE_ROUTE: &str = "subscribe:route";

#[derive(Debug, Deserialize)]
struct ClientFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the connection (it is in the unfiltered group from the start)
/// 2. Sends a `connection:established` event with the connection id
/// 3. Forwards outbound frames via the registry channel
/// 4. Dispatches inbound text frames
/// 5. Unregisters on disconnect
pub(crate) async fn run_ws_session(ws: WebSocket, app_state: AppState) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (send_tx, mut send_rx) = mpsc::unbounded_channel();

    let guard = app_state.broadcast.register_guarded(send_tx);
    let connection_id = guard.id().clone();
    info!("WebSocket client {connection_id} connected");

    app_state.broadcast.send_message(OutboundMessage {
        event: Event::ConnectionEstablished {
            connection_id: connection_id.to_string(),
        },
        scope: MessageScope::Connection {
            connection_id: connection_id.clone(),
        },
    });

    let outbound = tokio::spawn(async move {
        while let Some(frame) = send_rx.recv().await {
            let text = match frame.to_envelope() {
                Ok(text) => text,
                Err(e) => {
                    warn!("Dropping {} frame with malformed data: {e}", frame.event);
                    continue;
                }
            };
            if ws_tx.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_rx.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Binary(data) => match String::from_utf8(data) {
                Ok(text) => text,
                Err(_) => {
                    debug!("Ignoring non-UTF8 binary frame from {connection_id}");
                    continue;
                }
            },
            Message::Close(_) => {
                info!("WebSocket client {connection_id} sent close frame");
                break;
            }
            // Pongs are answered by axum
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        handle_client_frame(&app_state, &connection_id, &text).await;
    }

    drop(guard);
    outbound.abort();
    info!("WebSocket client {connection_id} disconnected");
}

/// Dispatch one inbound text frame.
pub(crate) async fn handle_client_frame(
    app_state: &AppState,
    connection_id: &ConnectionId,
    text: &str,
) {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!("Ignoring undecodable frame from {connection_id}: {e}");
            return;
        }
    };

    match frame.event.as_str() {
        SUBSCRIBE_ROUTE => match route_id(&frame.data) {
            Some(route_id) => {
                debug!("{SUBSCRIBE_ROUTE} {route_id} from {connection_id}");
                app_state.broadcast.join_route(connection_id, &route_id);
            }
            None => debug!("Ignoring {SUBSCRIBE_ROUTE} without a route id"),
        },
        DRIVER_LOCATION => {
            let result = match serde_json::from_value::<LocationSubmission>(frame.data) {
                Ok(submission) => app_state
                    .ingestion
                    .submit(submission, EntryPath::Stream)
                    .await
                    .map(|_| ()),
                Err(e) => {
                    debug!("Undecodable {DRIVER_LOCATION} from {connection_id}: {e}");
                    Err(ingestion_error(
                        IngestionErrorKind::InvalidPayload,
                        "payload is not a JSON object",
                    ))
                }
            };

            if let Err(e) = result {
                app_state.broadcast.send_message(OutboundMessage {
                    event: Event::DriverError {
                        error: client_message(&e.error_kind).to_string(),
                    },
                    scope: MessageScope::Connection {
                        connection_id: connection_id.clone(),
                    },
                });
            }
        }
        other => debug!("Ignoring unknown event {other} from {connection_id}"),
    }
}

fn route_id(data: &Value) -> Option<String> {
    match data {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
