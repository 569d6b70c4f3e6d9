//! Observer-facing types for live subscription updates.

use crate::types::SourceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Unique identifier for an observer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObserverId(pub u64);

impl fmt::Debug for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObserverId({})", self.0)
    }
}

/// Configuration for one observer.
#[derive(Clone, Debug)]
pub struct ObserverConfig {
    /// Max buffered events before the observer is dropped.
    /// Default: 256
    pub buffer_size: usize,

    /// Deliver the currently published result sequence (if any)
    /// immediately on attach. Default: true
    pub replay_current: bool,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            buffer_size: 256,
            replay_current: true,
        }
    }
}

/// Events delivered to observers.
///
/// A `Results` event is published only when a reconciliation cycle actually
/// changed the cache; the carried `Arc` is the same allocation returned by
/// [`LiveQuery::current`](crate::LiveQuery::current) until the next change.
#[derive(Clone, Debug)]
pub enum LiveEvent<D> {
    /// A freshly derived result sequence.
    Results(Arc<Vec<D>>),

    /// The change source failed; the subscription is now idle.
    /// The error is the source's own, untranslated.
    SourceError(SourceError),

    /// This observer was dropped and will receive nothing further.
    Dropped { reason: DropReason },
}

/// Why an observer was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Event buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unobserved.
    Unobserved,
    /// The subscription was torn down by an internal error.
    Error(String),
}

/// Handle for receiving observer events.
pub struct ObserverHandle<D> {
    pub id: ObserverId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<LiveEvent<D>>,
}

impl<D> ObserverHandle<D> {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<LiveEvent<D>, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<LiveEvent<D>, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<LiveEvent<D>, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}
