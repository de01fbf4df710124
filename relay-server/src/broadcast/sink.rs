//! Output sinks that subscriber sessions write serialized events into.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

/// Why a sink rejected a write.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SinkError {
    /// The reading side has gone away.
    #[error("sink closed")]
    Closed,

    /// The reader is not keeping up and its buffer is full.
    #[error("sink buffer full")]
    Full,
}

/// Destination for serialized events belonging to one subscriber.
///
/// `write` must not block: the broadcaster calls it for every live session
/// in turn and a stalled sink would delay everybody behind it.
pub trait EventSink: Send + Sync {
    /// Hand one serialized event to the sink.
    fn write(&self, payload: &Arc<str>) -> Result<(), SinkError>;

    /// Whether the sink has already ended and can never accept writes.
    fn is_closed(&self) -> bool;
}

/// Sink backed by a bounded tokio channel whose receiver feeds an SSE stream.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Arc<str>>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Arc<str>>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn write(&self, payload: &Arc<str>) -> Result<(), SinkError> {
        self.tx.try_send(Arc::clone(payload)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Full,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
