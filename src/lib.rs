//! # liveset
//!
//! Keyed, order-stable live query results reconciled from a remote change
//! stream.
//!
//! ## Core Concepts
//!
//! - **Keyed Cache**: insertion-ordered map of current documents, the single
//!   source of truth for "current results"
//! - **Reconciler**: pure fold of one snapshot's add/modify/remove records
//!   into the cache, tolerant of duplicates and out-of-order events
//! - **Subscription Manager**: owns the cache lifetime, tracks subscription
//!   identity, and republishes the derived sequence only when the cache
//!   actually changed
//!
//! The remote query subsystem is an external collaborator behind the
//! [`ChangeSource`] trait: no network I/O, retry, or rendering concerns
//! live here.
//!
//! ## Example
//!
//! ```ignore
//! use liveset::{key_fn, LiveQuery, ObserverConfig, SubscriptionIdentity};
//! use std::sync::Arc;
//!
//! let mut query = LiveQuery::new(firestore_like_source);
//! query.subscribe(SubscriptionIdentity::new(
//!     Arc::new(QueryDescriptor::collection("users")),
//!     key_fn(|doc: &Arc<User>| doc.id.clone()),
//! ))?;
//!
//! let observer = query.observe(ObserverConfig::default());
//! query.pump()?;
//! if let Some(users) = query.current() {
//!     // stable, duplicate-free, insertion-ordered
//! }
//! ```

pub mod cache;
pub mod error;
pub mod reconcile;
pub mod source;
pub mod subscription;
pub mod types;

// Re-exports
pub use cache::KeyedCache;
pub use error::{Error, KeyError, Result};
pub use reconcile::reconcile;
pub use source::{ChangeSource, SnapshotSender, SourceHandle, SourceMessage};
pub use subscription::{
    DropReason, LiveEvent, LiveQuery, ObserverConfig, ObserverHandle, ObserverId, QueryEq,
    SubscriptionIdentity,
};
pub use types::{key_fn, try_key_fn, ChangeKind, ChangeRecord, KeyFn, Snapshot, SourceError};
