//! `GET /events` Server-Sent Events stream.
//!
//! Each connection registers a [`ChannelSink`] with the registry. The SSE
//! body owns a [`Subscription`] guard, so when hyper drops the body (peer
//! gone, write error, shutdown) the session is unregistered and the
//! keep-alive timer goes with it.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::header,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use futures::stream::{self, Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::broadcast::{ChannelSink, Registry, SessionHandle};
use crate::web::AppState;

/// First event every subscriber receives.
pub const CONNECTED_EVENT: &str = r#"{"type":"connected"}"#;

/// Comment text of the periodic keep-alive.
pub const KEEP_ALIVE_TEXT: &str = "ping";

/// Unregisters its session when dropped.
pub struct Subscription {
    registry: Registry,
    handle: SessionHandle,
}

impl Subscription {
    pub fn new(registry: Registry, handle: SessionHandle) -> Self {
        Self { registry, handle }
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.registry.unregister(&self.handle) {
            debug!(session_id = %self.handle.id(), "subscription_dropped");
        }
    }
}

/// Register a subscriber and return the stream of serialized events it receives.
///
/// The connected event is queued before the session becomes visible to
/// publishers, so it is always first.
pub fn subscribe(
    registry: &Registry,
    buffer: usize,
) -> impl Stream<Item = Arc<str>> + Send + 'static {
    let (tx, rx) = mpsc::channel::<Arc<str>>(buffer.max(1));

    // Fresh channel with capacity >= 1, cannot be full.
    let _ = tx.try_send(Arc::from(CONNECTED_EVENT));

    let handle = registry.register(ChannelSink::new(tx));
    let subscription = Subscription::new(registry.clone(), handle);

    stream::unfold((rx, subscription), |(mut rx, subscription)| async move {
        let payload = rx.recv().await?;
        Some((payload, (rx, subscription)))
    })
}

/// `GET /events` handler.
pub async fn events(State(state): State<AppState>) -> impl IntoResponse {
    let stream = subscribe(&state.registry, state.config.events_buffer)
        .map(|payload| Ok::<_, Infallible>(Event::default().data(&*payload)));

    info!(subscribers = state.registry.len(), "events_stream_opened");

    let keep_alive = KeepAlive::new()
        .interval(Duration::from_secs(state.config.events_keep_alive_secs.max(1)))
        .text(KEEP_ALIVE_TEXT);

    (
        [(header::CONNECTION, "keep-alive")],
        Sse::new(stream).keep_alive(keep_alive),
    )
}
