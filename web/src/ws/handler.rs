use crate::ws::session::run_ws_session;
use crate::AppState;
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;

/// GET upgrade to a WebSocket session.
pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_ws_session(socket, app_state))
}
