use crate::params::subscription::SubscribeParams;
use crate::AppState;
use async_stream::stream;
use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use log::*;
use std::convert::Infallible;
use tokio::sync::mpsc;

/// SSE handler that establishes a long-lived, receive-only subscription.
///
/// The connection gets every `bus:update`; `?routeId=` additionally joins that
/// route group.
pub(crate) async fn sse_handler(
    State(app_state): State<AppState>,
    Query(params): Query<SubscribeParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let guard = app_state.broadcast.register_guarded(tx);
    if let Some(route_id) = params.route_id.as_deref() {
        app_state.broadcast.join_route(guard.id(), route_id);
    }
    debug!(
        "Established SSE subscription {} (route: {:?})",
        guard.id(),
        params.route_id
    );

    // The guard lives inside the stream: dropping the response unregisters.
    let stream = stream! {
        let _guard = guard;
        while let Some(frame) = rx.recv().await {
            yield Ok::<_, Infallible>(Event::default().event(frame.event).data(frame.data));
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
