//! Webhook payload → [`MessageRecord`].

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::types::{MessageRecord, WebhookPayload};

/// Errors raised while normalizing an inbound payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// The body does not carry a usable first message.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

impl NormalizeError {
    fn malformed(reason: impl Into<String>) -> Self {
        NormalizeError::MalformedPayload(reason.into())
    }
}

/// Whether the body carries a truthy top-level `object` marker.
pub fn has_object_marker(body: &Value) -> bool {
    match body.get("object") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(_) => true,
    }
}

/// Extract the first message of a webhook delivery.
///
/// Requires `entry[0].changes[0].value.messages[0]` to exist, and that
/// message to carry a sender, a text body, and a receiving
/// `metadata.phone_number_id`.
pub fn normalize(body: &Value) -> Result<MessageRecord, NormalizeError> {
    let payload: WebhookPayload = serde_json::from_value(body.clone()).map_err(|e| {
        warn!(error = %e, "webhook_payload_shape_invalid");
        NormalizeError::malformed(e.to_string())
    })?;

    let value = payload
        .entry
        .into_iter()
        .next()
        .and_then(|entry| entry.changes.into_iter().next())
        .and_then(|change| change.value)
        .ok_or_else(|| NormalizeError::malformed("missing entry[0].changes[0].value"))?;

    let message = value
        .messages
        .into_iter()
        .next()
        .ok_or_else(|| NormalizeError::malformed("missing value.messages[0]"))?;

    let phone_number_id = value
        .metadata
        .get("phone_number_id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| NormalizeError::malformed("missing metadata.phone_number_id"))?
        .to_string();

    let from = message
        .from
        .filter(|s| !s.is_empty())
        .ok_or_else(|| NormalizeError::malformed("missing messages[0].from"))?;

    let message_body = message.text.and_then(|t| t.body).ok_or_else(|| {
        NormalizeError::malformed(format!(
            "messages[0] has no text body (type {})",
            message.kind.as_str().unwrap_or("unknown")
        ))
    })?;

    debug!(
        phone_number_id = %phone_number_id,
        from = %from,
        body_length = message_body.len(),
        "webhook_payload_normalized"
    );

    Ok(MessageRecord {
        phone_number_id,
        from,
        message_body,
        metadata: value.metadata,
    })
}
