//! Subscription identity: the (query, key extractor) pair whose change
//! triggers resubscription.

use crate::types::KeyFn;
use std::fmt;
use std::sync::Arc;

/// Equality used for the query descriptor half of an identity.
pub type QueryEq<Q> = fn(&Arc<Q>, &Arc<Q>) -> bool;

/// An identity-stable description of one live subscription.
///
/// Two identities are "the same subscription" when their query descriptors
/// compare equal under the identity's pluggable equality (reference equality
/// by default) and their key extractor `Arc`s are the same allocation. The
/// subscription manager owns this check: supplying an equal identity again
/// is a no-op, never a resubscribe.
///
/// Callers who want stability must therefore hold on to the `Arc`s rather
/// than rebuilding them per call.
pub struct SubscriptionIdentity<Q, D, K> {
    query: Arc<Q>,
    key_of: KeyFn<D, K>,
    query_eq: QueryEq<Q>,
}

impl<Q, D, K> SubscriptionIdentity<Q, D, K> {
    /// New identity compared by reference equality on both parts.
    pub fn new(query: Arc<Q>, key_of: KeyFn<D, K>) -> Self {
        Self {
            query,
            key_of,
            query_eq: Arc::ptr_eq,
        }
    }

    /// Replace the query-descriptor equality.
    ///
    /// The function must not capture (it is a plain `fn`); for value
    /// equality pass `|a, b| a == b` on a `Q: PartialEq`.
    pub fn with_query_eq(mut self, query_eq: QueryEq<Q>) -> Self {
        self.query_eq = query_eq;
        self
    }

    pub fn query(&self) -> &Arc<Q> {
        &self.query
    }

    pub fn key_of(&self) -> &KeyFn<D, K> {
        &self.key_of
    }

    /// Whether `other` names the same subscription as `self`.
    ///
    /// Uses `self`'s query equality; the key extractor is always compared
    /// by `Arc` identity, never by behavior.
    pub fn same_as(&self, other: &Self) -> bool {
        (self.query_eq)(&self.query, &other.query) && Arc::ptr_eq(&self.key_of, &other.key_of)
    }
}

impl<Q, D, K> Clone for SubscriptionIdentity<Q, D, K> {
    fn clone(&self) -> Self {
        Self {
            query: Arc::clone(&self.query),
            key_of: Arc::clone(&self.key_of),
            query_eq: self.query_eq,
        }
    }
}

impl<Q: fmt::Debug, D, K> fmt::Debug for SubscriptionIdentity<Q, D, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionIdentity")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}
