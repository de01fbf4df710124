//! waba-relay - WhatsApp webhook relay.
//!
//! Receives WhatsApp Cloud API webhooks, fans each inbound text message out
//! to live Server-Sent Events subscribers, and answers the sender with an
//! echo reply through the Graph API.
//!
//! ## Architecture
//!
//! ```text
//! Webhook → web → inbound::normalize → broadcast::Registry → /events subscribers
//!                                    ↘ outbound::GraphClient → Graph API
//! ```

pub mod broadcast;
pub mod config;
pub mod inbound;
pub mod outbound;
pub mod web;

// Re-export commonly used types
pub use broadcast::{ChannelSink, EventSink, Registry, SessionHandle, SinkError};
pub use config::{Config, ConfigError};
pub use inbound::{normalize, MessageRecord, NormalizeError};
pub use outbound::{GraphClient, SendAck, SendError};
pub use web::{router, AppState};
