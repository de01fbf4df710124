//! WhatsApp Cloud API webhook payload shapes and the normalized record.
//!
//! Only the fields needed to route a reply are typed; everything else is
//! either ignored or carried through as raw JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Provider Payload
// =============================================================================

/// Top-level webhook delivery body.
///
/// ```json
/// {"object": "whatsapp_business_account",
///  "entry": [{"id": "...", "changes": [{"field": "messages", "value": {...}}]}]}
/// ```
///
/// Only the path down to the first message is typed. `object` is checked on
/// the raw JSON by [`has_object_marker`](super::has_object_marker); ids,
/// timestamps and field names are never read.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub entry: Vec<Entry>,
}

/// One business account entry.
#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub changes: Vec<Change>,
}

/// One change notification within an entry.
#[derive(Debug, Clone, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub value: Option<ChangeValue>,
}

/// Body of a `messages` change.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeValue {
    /// Receiving number details (`display_phone_number`, `phone_number_id`)
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
}

/// A single message sent by a WhatsApp user.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    /// Sender's WhatsApp id (phone number)
    #[serde(default)]
    pub from: Option<String>,
    /// `text`, `image`, `audio`, ...; only used in diagnostics
    #[serde(default, rename = "type")]
    pub kind: Value,
    #[serde(default)]
    pub text: Option<TextContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextContent {
    #[serde(default)]
    pub body: Option<String>,
}

// =============================================================================
// Normalized Record
// =============================================================================

/// Canonical inbound message, broadcast to subscribers as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    /// Business phone number id that received the message; replies go out through it
    pub phone_number_id: String,
    /// Sender's WhatsApp id
    pub from: String,
    /// Text body of the message
    pub message_body: String,
    /// Raw `value.metadata` from the provider, passed through untouched
    pub metadata: Value,
}

impl MessageRecord {
    /// Text of the automatic reply for this message.
    pub fn echo_text(&self) -> String {
        format!("Echo: {}", self.message_body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_serializes_camel_case() {
        let record = MessageRecord {
            phone_number_id: "106540352242922".to_string(),
            from: "15551234567".to_string(),
            message_body: "hello".to_string(),
            metadata: json!({"phone_number_id": "106540352242922"}),
        };

        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["phoneNumberId"], "106540352242922");
        assert_eq!(value["from"], "15551234567");
        assert_eq!(value["messageBody"], "hello");
        assert_eq!(value["metadata"]["phone_number_id"], "106540352242922");
    }

    #[test]
    fn test_echo_text() {
        let record = MessageRecord {
            phone_number_id: "1".to_string(),
            from: "2".to_string(),
            message_body: "ping".to_string(),
            metadata: Value::Null,
        };

        assert_eq!(record.echo_text(), "Echo: ping");
    }

    #[test]
    fn test_payload_ignores_unknown_fields() {
        let payload: WebhookPayload = serde_json::from_value(json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "WABA",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "contacts": [{"profile": {"name": "Kerry"}, "wa_id": "1555"}],
                        "messages": [{"from": "1555", "type": "image", "image": {"id": "x"}}]
                    }
                }]
            }]
        }))
        .unwrap();

        let message = &payload.entry[0].changes[0].value.as_ref().unwrap().messages[0];
        assert_eq!(message.kind, "image");
        assert!(message.text.is_none());
    }
}
