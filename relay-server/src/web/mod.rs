//! HTTP surface: webhook verification and delivery, subscriber event stream,
//! and liveness routes.
//!
//! ```text
//! GET  /          liveness text
//! GET  /health    JSON status with subscriber count
//! GET  /webhook   verification handshake
//! POST /webhook   message delivery → broadcast → echo reply
//! GET  /events    Server-Sent Events stream of broadcasts
//! ```

pub mod events;
pub mod handlers;
pub mod signature;

use std::any::Any;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::error;

pub use events::{events, subscribe, Subscription, CONNECTED_EVENT};
pub use handlers::{
    health, home, receive_webhook, verify_subscription, verify_webhook, AppState,
    HealthResponse, Verification, VerifyParams, WebhookResponse,
};
pub use signature::{is_signature_verification_enabled, verify_payload_signature};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .route("/events", get(events))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Turn a handler panic into a generic 500 instead of dropping the connection.
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };

    error!(panic = %detail, "handler_panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
        .into_response()
}
