//! Live subscriber registry with snapshot-based fan-out.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::sink::{EventSink, SinkError};

/// Identifier of one subscriber session. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Handle returned by [`Registry::register`], used to unregister later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    id: SessionId,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }
}

/// Registry of connected event-stream subscribers.
///
/// Cheap to clone; all clones share the same session set. The set lives
/// behind a mutex that is only held to insert, remove, or copy out a
/// snapshot, never while writing to a sink.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    sessions: Mutex<HashMap<SessionId, Arc<dyn EventSink>>>,
    next_id: AtomicU64,
    /// Set by [`Registry::shutdown`]; only read or written under `sessions`.
    shut_down: AtomicBool,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new session writing into `sink`.
    ///
    /// After [`shutdown`](Self::shutdown) the sink is dropped instead, which
    /// ends its stream, and the returned handle names no live session.
    pub fn register<S>(&self, sink: S) -> SessionHandle
    where
        S: EventSink + 'static,
    {
        let id = SessionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));

        let total = {
            let mut sessions = self.sessions();
            if self.inner.shut_down.load(Ordering::Relaxed) {
                drop(sessions);
                info!(session_id = %id, "subscriber_rejected_shutting_down");
                return SessionHandle { id };
            }
            sessions.insert(id, Arc::new(sink));
            sessions.len()
        };

        info!(session_id = %id, total_subscribers = total, "subscriber_registered");

        SessionHandle { id }
    }

    /// Remove a session. Unknown or already removed handles are ignored.
    ///
    /// Returns `true` if this call removed the session.
    pub fn unregister(&self, handle: &SessionHandle) -> bool {
        let (removed, total) = {
            let mut sessions = self.sessions();
            let removed = sessions.remove(&handle.id).is_some();
            (removed, sessions.len())
        };

        if removed {
            info!(session_id = %handle.id, total_subscribers = total, "subscriber_unregistered");
        }

        removed
    }

    /// Deliver `event` to every session live when this call starts.
    ///
    /// Sessions whose sink is closed or rejects the write are unregistered
    /// and delivery continues with the rest. Returns the number of sessions
    /// that accepted the event.
    pub fn publish<T>(&self, event: &T) -> usize
    where
        T: Serialize + ?Sized,
    {
        let payload: Arc<str> = match serde_json::to_string(event) {
            Ok(json) => Arc::from(json),
            Err(e) => {
                warn!(error = %e, "broadcast_serialize_failed");
                return 0;
            }
        };

        let snapshot: Vec<(SessionId, Arc<dyn EventSink>)> = self
            .sessions()
            .iter()
            .map(|(id, sink)| (*id, Arc::clone(sink)))
            .collect();

        if snapshot.is_empty() {
            debug!("broadcast_no_subscribers");
            return 0;
        }

        let mut delivered = 0;
        let mut pruned = 0;

        for (id, sink) in &snapshot {
            let result = if sink.is_closed() {
                Err(SinkError::Closed)
            } else {
                sink.write(&payload)
            };

            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    debug!(session_id = %id, reason = %e, "broadcast_sink_failed");
                    if self.unregister(&SessionHandle { id: *id }) {
                        pruned += 1;
                    }
                }
            }
        }

        debug!(
            recipients = snapshot.len(),
            delivered = delivered,
            pruned = pruned,
            payload_length = payload.len(),
            "broadcast_complete"
        );

        delivered
    }

    /// Drop every session, ending their streams.
    pub fn close_all(&self) -> usize {
        let closed = {
            let mut sessions = self.sessions();
            let count = sessions.len();
            sessions.clear();
            count
        };

        if closed > 0 {
            info!(closed_subscribers = closed, "subscribers_closed");
        }

        closed
    }

    /// Drop every session and refuse all later registrations.
    pub fn shutdown(&self) -> usize {
        let closed = {
            let mut sessions = self.sessions();
            self.inner.shut_down.store(true, Ordering::Relaxed);
            let count = sessions.len();
            sessions.clear();
            count
        };

        info!(closed_subscribers = closed, "registry_shut_down");

        closed
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn contains(&self, handle: &SessionHandle) -> bool {
        self.sessions().contains_key(&handle.id)
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, Arc<dyn EventSink>>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.inner
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
