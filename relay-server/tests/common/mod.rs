//! Shared fixtures: configuration, app state, and a mock Graph API.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use tokio::net::TcpListener;

use waba_relay::{AppState, Config, GraphClient, Registry};

pub const VERIFY_TOKEN: &str = "verify-secret";
pub const ACCESS_TOKEN: &str = "graph-token";

/// One request received by the mock Graph API.
#[derive(Debug, Clone)]
pub struct CapturedSend {
    pub phone_number_id: String,
    pub access_token: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct MockState {
    status: StatusCode,
    captured: Arc<Mutex<Vec<CapturedSend>>>,
}

/// Handle to a running mock Graph API.
pub struct MockGraph {
    pub base_url: String,
    captured: Arc<Mutex<Vec<CapturedSend>>>,
}

impl MockGraph {
    pub fn sends(&self) -> Vec<CapturedSend> {
        self.captured.lock().unwrap().clone()
    }
}

async fn mock_send(
    State(state): State<MockState>,
    Path((_version, phone_number_id)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.captured.lock().unwrap().push(CapturedSend {
        phone_number_id,
        access_token: query.get("access_token").cloned(),
        body,
    });

    if state.status.is_success() {
        (
            state.status,
            Json(json!({
                "messaging_product": "whatsapp",
                "contacts": [{"input": "16505551234", "wa_id": "16505551234"}],
                "messages": [{"id": "wamid.mock"}]
            })),
        )
    } else {
        (
            state.status,
            Json(json!({
                "error": {
                    "message": "(#131030) Recipient phone number not in allowed list",
                    "type": "OAuthException",
                    "code": 131030
                }
            })),
        )
    }
}

/// Start a mock Graph API answering every send with `status`.
pub async fn spawn_mock_graph(status: StatusCode) -> MockGraph {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let state = MockState {
        status,
        captured: Arc::clone(&captured),
    };

    let app = Router::new()
        .route("/:version/:phone_number_id/messages", post(mock_send))
        .with_state(state);

    let addr = serve(app).await;

    MockGraph {
        base_url: format!("http://{}", addr),
        captured,
    }
}

/// Serve `app` on an ephemeral local port.
pub async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

pub fn test_config(graph_url: &str, app_secret: Option<&str>) -> Config {
    let mut vars: HashMap<&str, String> = HashMap::new();
    vars.insert("TOKEN", ACCESS_TOKEN.to_string());
    vars.insert("MYTOKEN", VERIFY_TOKEN.to_string());
    vars.insert("PORT", "0".to_string());
    vars.insert("GRAPH_API_URL", graph_url.to_string());
    vars.insert("REQUEST_TIMEOUT_MS", "2000".to_string());
    if let Some(secret) = app_secret {
        vars.insert("APP_SECRET", secret.to_string());
    }

    Config::from_lookup(move |name| vars.get(name).cloned()).unwrap()
}

pub fn test_state(config: Config) -> (AppState, Registry) {
    let registry = Registry::new();
    let graph = GraphClient::new(&config).unwrap();
    (AppState::new(config, registry.clone(), graph), registry)
}

/// `X-Hub-Signature-256` value Meta would send for `body`.
pub fn sign_payload(app_secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(app_secret.as_bytes()).unwrap();
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// A well-formed single text message delivery.
pub fn text_message_payload(text: &str) -> Value {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "102290129340398",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "metadata": {
                        "display_phone_number": "15550783881",
                        "phone_number_id": "106540352242922"
                    },
                    "contacts": [{"profile": {"name": "Sheena"}, "wa_id": "16505551234"}],
                    "messages": [{
                        "from": "16505551234",
                        "id": "wamid.HBgLMTY1MDM4Nzk0MzkVAgASGBQzQTRBNjU5OUFFRTAzODEwMTQ0RgA=",
                        "timestamp": "1749416383",
                        "type": "text",
                        "text": {"body": text}
                    }]
                }
            }]
        }]
    })
}
