//! Webhook endpoint handlers.
//!
//! The delivery handler runs the whole pipeline inline:
//! 1. Verify the payload signature (if an app secret is configured)
//! 2. Normalize the payload into a `MessageRecord`
//! 3. Broadcast the record to live `/events` subscribers
//! 4. Send the echo reply and report its outcome

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::broadcast::Registry;
use crate::inbound::{has_object_marker, normalize, NormalizeError};
use crate::outbound::GraphClient;
use crate::web::signature::{
    constant_time_eq, is_signature_verification_enabled, verify_payload_signature,
    SIGNATURE_HEADER,
};
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Registry,
    pub graph: GraphClient,
}

impl AppState {
    pub fn new(config: Config, registry: Registry, graph: GraphClient) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            graph,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Liveness text for `GET /`.
pub async fn home() -> &'static str {
    "WhatsApp Webhook Server is running"
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub subscribers: usize,
}

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        subscribers: state.registry.len(),
    })
}

// =============================================================================
// Verification Handshake
// =============================================================================

/// Query parameters of the verification request.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyParams {
    #[serde(default, rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(default, rename = "hub.challenge")]
    pub challenge: Option<String>,
    #[serde(default, rename = "hub.verify_token")]
    pub verify_token: Option<String>,
}

/// Outcome of a verification handshake.
#[derive(Debug, PartialEq, Eq)]
pub enum Verification {
    /// Echo the challenge back.
    Accepted(String),
    /// Mode or token missing.
    Incomplete,
    /// Wrong mode or token.
    Rejected,
}

/// Decide the handshake outcome from the query and the configured secret.
pub fn verify_subscription(params: VerifyParams, expected_token: &str) -> Verification {
    let (mode, token) = match (params.mode, params.verify_token) {
        (Some(mode), Some(token)) if !mode.is_empty() && !token.is_empty() => (mode, token),
        _ => return Verification::Incomplete,
    };

    if mode == "subscribe" && constant_time_eq(&token, expected_token) {
        Verification::Accepted(params.challenge.unwrap_or_default())
    } else {
        Verification::Rejected
    }
}

/// `GET /webhook` verification endpoint.
pub async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Response {
    match verify_subscription(params, &state.config.verify_token) {
        Verification::Accepted(challenge) => {
            info!("webhook_verified");
            (StatusCode::OK, challenge).into_response()
        }
        Verification::Incomplete => {
            warn!("webhook_verify_missing_params");
            StatusCode::BAD_REQUEST.into_response()
        }
        Verification::Rejected => {
            warn!("webhook_verify_rejected");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

// =============================================================================
// Message Delivery
// =============================================================================

/// Webhook response.
#[derive(Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered: Option<usize>,
}

impl WebhookResponse {
    fn status(status: &'static str) -> Json<Self> {
        Json(Self {
            status,
            delivered: None,
        })
    }
}

/// `POST /webhook` delivery endpoint.
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<WebhookResponse>) {
    info!(body_length = body.len(), "webhook_delivery_received");

    if is_signature_verification_enabled(&state.config.app_secret) {
        let app_secret = state.config.app_secret.as_deref().unwrap_or_default();
        let header = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok());

        if !verify_payload_signature(app_secret, &body, header) {
            return (
                StatusCode::UNAUTHORIZED,
                WebhookResponse::status("unauthorized"),
            );
        }
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "webhook_body_not_json");
            return (StatusCode::BAD_REQUEST, WebhookResponse::status("invalid_json"));
        }
    };

    if !has_object_marker(&payload) {
        warn!("webhook_missing_object");
        return (StatusCode::BAD_REQUEST, WebhookResponse::status("missing_object"));
    }

    let record = match normalize(&payload) {
        Ok(record) => record,
        Err(NormalizeError::MalformedPayload(reason)) => {
            warn!(reason = %reason, "webhook_malformed_payload");
            return (
                StatusCode::BAD_REQUEST,
                WebhookResponse::status("malformed_payload"),
            );
        }
    };

    info!(
        phone_number_id = %record.phone_number_id,
        from = %record.from,
        message_length = record.message_body.len(),
        "webhook_message_received"
    );

    let delivered = state.registry.publish(&record);

    info!(
        delivered = delivered,
        subscribers = state.registry.len(),
        "webhook_message_broadcast"
    );

    if let Err(e) = state
        .graph
        .send_text(&record.phone_number_id, &record.from, &record.echo_text())
        .await
    {
        error!(
            phone_number_id = %record.phone_number_id,
            to = %record.from,
            error = %e,
            "whatsapp_echo_failed"
        );
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(WebhookResponse {
                status: "reply_failed",
                delivered: Some(delivered),
            }),
        );
    }

    (
        StatusCode::OK,
        Json(WebhookResponse {
            status: "ok",
            delivered: Some(delivered),
        }),
    )
}
