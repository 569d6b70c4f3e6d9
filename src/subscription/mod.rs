//! Subscription lifecycle around the keyed cache.
//!
//! This module provides:
//! - [`SubscriptionIdentity`]: the (query, key extractor) pair whose change
//!   triggers resubscription, compared by pluggable equality
//! - [`LiveQuery`]: the manager owning the cache, the change-source
//!   attachment, and publish-on-change of the derived result sequence
//! - Observer plumbing: bounded event channels with slow-consumer dropping
//!
//! # Example
//!
//! ```ignore
//! let mut query = LiveQuery::new(source);
//!
//! let ident = SubscriptionIdentity::new(
//!     Arc::new(descriptor),
//!     key_fn(|doc: &Doc| doc.id.clone()),
//! );
//! query.subscribe(ident)?;
//!
//! let observer = query.observe(ObserverConfig::default());
//! loop {
//!     query.pump()?;
//!     match observer.try_recv() {
//!         Ok(LiveEvent::Results(docs)) => render(&docs),
//!         Ok(LiveEvent::SourceError(err)) => break,
//!         _ => {}
//!     }
//! }
//! ```

mod identity;
mod manager;
mod types;

pub use identity::{QueryEq, SubscriptionIdentity};
pub use manager::LiveQuery;
pub use types::{DropReason, LiveEvent, ObserverConfig, ObserverHandle, ObserverId};
