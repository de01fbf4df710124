//! Outbound replies through the WhatsApp Cloud API.

pub mod sender;

pub use sender::{GraphClient, SendAck, SendError, SentMessage};
