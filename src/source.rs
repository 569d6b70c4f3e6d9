//! Change source contract: the boundary to the remote live-query subsystem.

use crate::error::Result;
use crate::types::{Snapshot, SourceError};
use std::sync::Arc;

/// One message from a change source to the subscription's inbox.
#[derive(Clone, Debug)]
pub enum SourceMessage<D> {
    /// A new snapshot: current documents plus changes since the last one.
    Snapshot(Snapshot<D>),
    /// The source failed. Terminal for the subscription.
    Error(SourceError),
}

/// Sending half of a subscription's inbox, handed to the change source on
/// attach. Sends after the subscription is torn down land on a disconnected
/// channel and are silently discarded.
pub type SnapshotSender<D> = crossbeam_channel::Sender<SourceMessage<D>>;

/// A remote live-query subsystem that delivers ordered snapshots for a
/// query descriptor.
///
/// Implementations must deliver snapshots strictly sequentially on the
/// given sender. After [`SourceHandle::detach`] returns, no further
/// messages may be sent for that attachment.
pub trait ChangeSource<Q, D> {
    /// Start delivering snapshots for `query` into `inbox`.
    ///
    /// Fails fast (for example on an invalid query) with a
    /// [`SourceError`]; transient failures after attach are delivered as
    /// [`SourceMessage::Error`] instead.
    fn attach(&self, query: &Arc<Q>, inbox: SnapshotSender<D>) -> Result<Box<dyn SourceHandle>>;
}

/// Cancellation handle for one attachment.
pub trait SourceHandle {
    /// Stop further snapshot deliveries. Idempotent.
    fn detach(&mut self);
}
