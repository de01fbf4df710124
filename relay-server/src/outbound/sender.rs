//! Graph API message sender.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::Config;

/// Errors from a single outbound send.
#[derive(Debug, Error)]
pub enum SendError {
    /// The request never produced a response (connect, timeout, body read).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("provider rejected send ({status}): {detail}")]
    Provider { status: StatusCode, detail: String },

    /// The send URL could not be built from the configured base.
    #[error("invalid send endpoint: {0}")]
    Endpoint(String),
}

/// Successful send acknowledgement.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendAck {
    #[serde(default)]
    pub messages: Vec<SentMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SentMessage {
    pub id: String,
}

impl SendAck {
    pub fn message_ids(&self) -> Vec<&str> {
        self.messages.iter().map(|m| m.id.as_str()).collect()
    }
}

#[derive(Serialize)]
struct TextMessageRequest<'a> {
    messaging_product: &'static str,
    to: &'a str,
    text: TextBody<'a>,
}

#[derive(Serialize)]
struct TextBody<'a> {
    body: &'a str,
}

#[derive(Deserialize)]
struct GraphErrorEnvelope {
    error: GraphError,
}

#[derive(Deserialize)]
struct GraphError {
    #[serde(default)]
    message: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    code: Option<i64>,
}

/// Client for the WhatsApp Cloud API `messages` endpoint.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Clone)]
pub struct GraphClient {
    http: Client,
    base_url: Url,
    api_version: String,
    access_token: String,
}

impl GraphClient {
    /// Build a client from configuration.
    pub fn new(config: &Config) -> Result<Self, SendError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self {
            http,
            base_url: config.graph_api_url.clone(),
            api_version: config.graph_api_version.clone(),
            access_token: config.access_token.clone(),
        })
    }

    /// `{base}/{version}/{phone_number_id}/messages`
    fn messages_url(&self, phone_number_id: &str) -> Result<Url, SendError> {
        // `url` silently drops dot segments, which would change the endpoint.
        if matches!(phone_number_id, "" | "." | "..") {
            return Err(SendError::Endpoint(format!(
                "invalid phone number id {:?}",
                phone_number_id
            )));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SendError::Endpoint(self.base_url.to_string()))?
            .pop_if_empty()
            .extend([self.api_version.as_str(), phone_number_id, "messages"]);
        Ok(url)
    }

    /// Send a text message from `phone_number_id` to `to`.
    ///
    /// One attempt only. Any transport or provider failure is returned.
    pub async fn send_text(
        &self,
        phone_number_id: &str,
        to: &str,
        body: &str,
    ) -> Result<SendAck, SendError> {
        let url = self.messages_url(phone_number_id)?;

        info!(
            phone_number_id = %phone_number_id,
            to = %to,
            body_length = body.len(),
            "whatsapp_send_starting"
        );

        let request = TextMessageRequest {
            messaging_product: "whatsapp",
            to,
            text: TextBody { body },
        };

        let response = match self
            .http
            .post(url)
            .query(&[("access_token", self.access_token.as_str())])
            .json(&request)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                // The error's URL carries the access token in its query.
                let e = e.without_url();
                if e.is_timeout() {
                    error!(phone_number_id = %phone_number_id, error = %e, "whatsapp_send_timeout");
                } else {
                    error!(phone_number_id = %phone_number_id, error = %e, "whatsapp_send_request_error");
                }
                return Err(SendError::Transport(e));
            }
        };

        let status = response.status();
        let text = response.text().await.map_err(|e| e.without_url())?;

        if !status.is_success() {
            let detail = provider_error_detail(&text);
            error!(
                phone_number_id = %phone_number_id,
                status_code = status.as_u16(),
                detail = %detail,
                "whatsapp_send_rejected"
            );
            return Err(SendError::Provider { status, detail });
        }

        let ack: SendAck = serde_json::from_str(&text).unwrap_or_default();

        info!(
            phone_number_id = %phone_number_id,
            status_code = status.as_u16(),
            message_ids = ?ack.message_ids(),
            "whatsapp_send_complete"
        );

        Ok(ack)
    }
}

/// Pull a readable message out of a Graph error body, falling back to the raw text.
fn provider_error_detail(body: &str) -> String {
    match serde_json::from_str::<GraphErrorEnvelope>(body) {
        Ok(envelope) => {
            let err = envelope.error;
            let mut detail = err.message;
            if let Some(kind) = err.kind {
                detail.push_str(&format!(" [{}]", kind));
            }
            if let Some(code) = err.code {
                detail.push_str(&format!(" (code {})", code));
            }
            detail
        }
        Err(_) => body.chars().take(500).collect(),
    }
}
