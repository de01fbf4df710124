//! Webhook authentication helpers.
//!
//! Meta signs webhook deliveries with HMAC-SHA256 over the raw request body,
//! keyed by the app secret, and sends it as `X-Hub-Signature-256: sha256=<hex>`.
//! Reference: https://developers.facebook.com/docs/graph-api/webhooks/getting-started#validate-payloads

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

/// Verify a webhook payload signature.
///
/// # Arguments
///
/// * `app_secret` - The app secret from the Meta developer console
/// * `body` - The raw request body exactly as received
/// * `header` - The `X-Hub-Signature-256` header value, if present
///
/// # Returns
///
/// `true` if the header is well formed and matches the body.
pub fn verify_payload_signature(app_secret: &str, body: &[u8], header: Option<&str>) -> bool {
    let header = match header {
        Some(h) if !h.is_empty() => h,
        _ => {
            warn!("webhook_signature_missing");
            return false;
        }
    };

    let provided_hex = match header.strip_prefix("sha256=") {
        Some(hex) => hex,
        None => {
            warn!("webhook_signature_bad_scheme");
            return false;
        }
    };

    let provided = match hex::decode(provided_hex) {
        Ok(bytes) => bytes,
        Err(_) => {
            warn!(actual_length = provided_hex.len(), "webhook_signature_not_hex");
            return false;
        }
    };

    let mut mac = match HmacSha256::new_from_slice(app_secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            warn!("webhook_signature_invalid_key");
            return false;
        }
    };

    mac.update(body);

    // verify_slice compares in constant time
    let valid = mac.verify_slice(&provided).is_ok();

    if !valid {
        warn!(body_length = body.len(), "webhook_signature_mismatch");
    }

    valid
}

/// Constant-time string comparison to prevent timing attacks.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

/// Check if payload signature verification is enabled.
pub fn is_signature_verification_enabled(app_secret: &Option<String>) -> bool {
    app_secret
        .as_ref()
        .map(|k| !k.trim().is_empty())
        .unwrap_or(false)
}
