//! Subscription lifecycle: owns the keyed cache, binds it to a change
//! source, and publishes the derived result sequence on change.

use crate::cache::KeyedCache;
use crate::error::{Error, Result};
use crate::reconcile::reconcile;
use crate::source::{ChangeSource, SourceHandle, SourceMessage};
use crate::types::Snapshot;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use super::identity::SubscriptionIdentity;
use super::types::{DropReason, LiveEvent, ObserverConfig, ObserverHandle, ObserverId};

/// Default capacity of the snapshot inbox.
const DEFAULT_INBOX_CAPACITY: usize = 64;

/// Internal observer state.
struct Observer<D> {
    sender: Sender<LiveEvent<D>>,
}

impl<D> Observer<D> {
    /// Try to send an event. Returns false if the buffer is full
    /// (the observer will be dropped).
    fn try_send(&self, event: LiveEvent<D>) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(crossbeam_channel::TrySendError::Full(_)) => false,
            Err(crossbeam_channel::TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Fan-out of published events to observers.
///
/// Observers outlive individual subscriptions: resubscribing with a new
/// identity keeps them attached to the manager's event stream.
struct Publisher<D> {
    /// Active observers by ID.
    observers: RwLock<HashMap<ObserverId, Observer<D>>>,
    /// Counter for generating observer IDs.
    next_id: AtomicU64,
}

impl<D: Clone> Publisher<D> {
    fn new() -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn observe(&self, config: &ObserverConfig) -> ObserverHandle<D> {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size);

        self.observers.write().insert(id, Observer { sender });

        ObserverHandle { id, receiver }
    }

    fn unobserve(&self, id: ObserverId) {
        let mut observers = self.observers.write();
        if let Some(observer) = observers.remove(&id) {
            // Best effort.
            let _ = observer.sender.try_send(LiveEvent::Dropped {
                reason: DropReason::Unobserved,
            });
        }
    }

    fn count(&self) -> usize {
        self.observers.read().len()
    }

    /// Send an event directly to one observer (for replay on attach).
    /// Returns false if the observer is gone.
    fn send_to(&self, id: ObserverId, event: LiveEvent<D>) -> bool {
        let observers = self.observers.read();
        match observers.get(&id) {
            Some(observer) => observer.try_send(event),
            None => false,
        }
    }

    /// Broadcast to all observers. Drops observers that fail to receive.
    fn broadcast(&self, event: LiveEvent<D>) {
        let mut to_remove = Vec::new();

        {
            let observers = self.observers.read();
            for (id, observer) in observers.iter() {
                if !observer.try_send(event.clone()) {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut observers = self.observers.write();
            for id in to_remove {
                if let Some(observer) = observers.remove(&id) {
                    // Try to notify about the drop (might fail, that's ok).
                    let _ = observer.sender.try_send(LiveEvent::Dropped {
                        reason: DropReason::BufferOverflow,
                    });
                }
            }
        }
    }

    /// Notify every observer the subscription is fatally broken, then
    /// clear the registry.
    fn drop_all(&self, reason: DropReason) {
        let mut observers = self.observers.write();
        for (_, observer) in observers.drain() {
            let _ = observer.sender.try_send(LiveEvent::Dropped {
                reason: reason.clone(),
            });
        }
    }
}

/// Per-subscription state while attached to a change source.
struct Active<Q, D, K> {
    identity: SubscriptionIdentity<Q, D, K>,
    cache: KeyedCache<K, D>,
    inbox: Receiver<SourceMessage<D>>,
    handle: Box<dyn SourceHandle>,
    /// Last published result sequence. Kept until the cache actually
    /// changes so that no-op cycles republish nothing.
    published: Option<Arc<Vec<D>>>,
}

/// Owns a [`KeyedCache`]'s lifetime, binds it to a [`ChangeSource`], and
/// exposes the derived result sequence to observers.
///
/// Single-threaded and event-driven: snapshots accumulate in a bounded
/// inbox and are folded in strictly sequentially by [`pump`](Self::pump).
/// The manager is either idle (no cache, nothing published) or subscribed
/// under exactly one [`SubscriptionIdentity`]. Supplying an identity equal
/// to the current one is a no-op; supplying a different one detaches,
/// discards the cache, and restarts empty.
pub struct LiveQuery<S, Q, D, K> {
    source: S,
    inbox_capacity: usize,
    active: Option<Active<Q, D, K>>,
    publisher: Publisher<D>,
}

impl<S, Q, D, K> LiveQuery<S, Q, D, K>
where
    S: ChangeSource<Q, D>,
    K: Eq + Hash + Clone,
    D: Clone,
{
    /// Create an idle manager over the given change source.
    pub fn new(source: S) -> Self {
        Self::with_inbox_capacity(source, DEFAULT_INBOX_CAPACITY)
    }

    /// Create an idle manager with a custom inbox capacity.
    pub fn with_inbox_capacity(source: S, inbox_capacity: usize) -> Self {
        Self {
            source,
            inbox_capacity,
            active: None,
            publisher: Publisher::new(),
        }
    }

    /// Whether a subscription is currently attached.
    pub fn is_subscribed(&self) -> bool {
        self.active.is_some()
    }

    /// The last published result sequence, if any.
    ///
    /// The returned `Arc` is the same allocation observers received; it
    /// only changes when a reconciliation cycle actually changed the cache.
    pub fn current(&self) -> Option<Arc<Vec<D>>> {
        self.active
            .as_ref()
            .and_then(|active| active.published.as_ref().map(Arc::clone))
    }

    /// Number of documents in the live cache. Zero when idle.
    pub fn len(&self) -> usize {
        self.active.as_ref().map_or(0, |active| active.cache.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attach under the given identity.
    ///
    /// A no-op if the identity equals the current one (per the identity's
    /// own equality). Otherwise any existing subscription is detached and
    /// its cache discarded; the new one starts empty, with a fresh inbox.
    pub fn subscribe(&mut self, identity: SubscriptionIdentity<Q, D, K>) -> Result<()> {
        if let Some(active) = &self.active {
            if active.identity.same_as(&identity) {
                trace!("identity unchanged, resubscribe skipped");
                return Ok(());
            }
        }
        self.stop();

        let (sender, inbox) = bounded(self.inbox_capacity);
        let handle = self.source.attach(identity.query(), sender)?;
        debug!("subscription attached");

        self.active = Some(Active {
            identity,
            cache: KeyedCache::new(),
            inbox,
            handle,
            published: None,
        });
        Ok(())
    }

    /// Detach and discard the cache. Idle afterwards.
    ///
    /// Dropping the inbox receiver here is the late-event guard: a
    /// snapshot the old source sends after this lands on a disconnected
    /// channel and can never reach a cache.
    pub fn stop(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.handle.detach();
            debug!("subscription detached");
        }
    }

    /// Drain the inbox, reconciling each pending snapshot in order.
    ///
    /// Publishes a freshly derived result sequence after every cycle that
    /// changed the cache; republishes nothing after a no-op cycle. A
    /// source error is broadcast verbatim to observers, tears the
    /// subscription down, and is returned. A key-extraction failure also
    /// tears down, dropping all observers, since the identity's extractor
    /// cannot start working on retry.
    ///
    /// Returns the number of messages processed. Idle managers process
    /// nothing.
    pub fn pump(&mut self) -> Result<usize> {
        let mut processed = 0;
        loop {
            let message = match self.active.as_ref() {
                Some(active) => match active.inbox.try_recv() {
                    Ok(message) => message,
                    Err(_) => break,
                },
                None => break,
            };
            processed += 1;

            match message {
                SourceMessage::Snapshot(snapshot) => {
                    if let Err(err) = self.apply_snapshot(snapshot) {
                        debug!(error = %err, "reconciliation rejected, going idle");
                        self.publisher.drop_all(DropReason::Error(err.to_string()));
                        self.stop();
                        return Err(err);
                    }
                }
                SourceMessage::Error(err) => {
                    debug!(error = %err, "change source failed, going idle");
                    self.publisher.broadcast(LiveEvent::SourceError(err.clone()));
                    self.stop();
                    return Err(Error::Source(err));
                }
            }
        }
        Ok(processed)
    }

    fn apply_snapshot(&mut self, snapshot: Snapshot<D>) -> Result<()> {
        let active = match self.active.as_mut() {
            Some(active) => active,
            None => return Ok(()),
        };

        let key_of = Arc::clone(active.identity.key_of());
        let changed = reconcile(&snapshot.changes, &mut active.cache, |doc| (*key_of)(doc))?;

        if changed {
            let sequence: Arc<Vec<D>> = Arc::new(active.cache.values().cloned().collect());
            active.published = Some(Arc::clone(&sequence));
            trace!(len = sequence.len(), "publishing result sequence");
            self.publisher.broadcast(LiveEvent::Results(sequence));
        } else {
            trace!("no-op cycle, keeping published sequence");
        }
        Ok(())
    }

    /// Attach an observer to the published event stream.
    ///
    /// With `replay_current` set (the default), the currently published
    /// sequence is delivered immediately so late observers start from the
    /// present instead of the next change.
    pub fn observe(&self, config: ObserverConfig) -> ObserverHandle<D> {
        let replay = config.replay_current;
        let handle = self.publisher.observe(&config);
        if replay {
            if let Some(sequence) = self.current() {
                self.publisher.send_to(handle.id, LiveEvent::Results(sequence));
            }
        }
        handle
    }

    /// Detach an observer.
    pub fn unobserve(&self, id: ObserverId) {
        self.publisher.unobserve(id);
    }

    /// Number of attached observers.
    pub fn observer_count(&self) -> usize {
        self.publisher.count()
    }
}
