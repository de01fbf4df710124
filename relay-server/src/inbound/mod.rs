//! Inbound webhook normalization.
//!
//! ```text
//! POST /webhook body → normalize() → MessageRecord
//! ```

pub mod normalize;
pub mod types;

pub use normalize::{has_object_marker, normalize, NormalizeError};
pub use types::{MessageRecord, WebhookPayload};
