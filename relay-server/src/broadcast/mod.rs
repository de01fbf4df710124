//! Subscriber registry and event fan-out.
//!
//! ```text
//! /events connection → register(ChannelSink) → SessionHandle
//! webhook record     → publish(&event)       → every live sink
//! ```
//!
//! Dead or slow sinks are pruned as a side effect of `publish`.

pub mod registry;
pub mod sink;

pub use registry::{Registry, SessionHandle, SessionId};
pub use sink::{ChannelSink, EventSink, SinkError};
