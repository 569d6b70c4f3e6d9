//! Insertion-ordered keyed cache of current documents.

use std::collections::HashMap;
use std::hash::Hash;

/// The authoritative in-memory map of current documents.
///
/// Keys are unique and iteration order is first-insertion order:
/// overwriting an existing key keeps its original position (update-in-place,
/// not move-to-end), deleting a key removes it from the order, and
/// re-inserting a previously deleted key appends it at the end as a brand-new
/// key. This ordering rule is what keeps the derived result sequence stable
/// across unrelated updates elsewhere in the same snapshot.
///
/// The cache is mutated only by [`reconcile`](crate::reconcile()) while
/// owned by a live subscription.
#[derive(Clone, Debug)]
pub struct KeyedCache<K, D> {
    entries: HashMap<K, D>,
    order: Vec<K>,
}

impl<K, D> KeyedCache<K, D>
where
    K: Eq + Hash + Clone,
{
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Number of documents currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Look up a document by key. No side effects.
    pub fn get(&self, key: &K) -> Option<&D> {
        self.entries.get(key)
    }

    /// Insert or overwrite a document.
    ///
    /// Inserting appends the key to the iteration order; overwriting keeps
    /// the key's original position. Returns the previous document, if any.
    pub fn set(&mut self, key: K, doc: D) -> Option<D> {
        match self.entries.insert(key.clone(), doc) {
            Some(prev) => Some(prev),
            None => {
                self.order.push(key);
                None
            }
        }
    }

    /// Remove a key. A silent no-op (not an error) if absent.
    ///
    /// Returns whether a document was actually removed.
    pub fn delete(&mut self, key: &K) -> bool {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
            true
        } else {
            false
        }
    }

    /// Lazy iterator of `(key, document)` pairs in stable insertion order.
    ///
    /// Finite and restartable: each call re-derives from current state.
    pub fn entries(&self) -> impl Iterator<Item = (&K, &D)> {
        self.order
            .iter()
            .filter_map(move |k| self.entries.get(k).map(|d| (k, d)))
    }

    /// Keys in stable insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.order.iter()
    }

    /// Documents in stable insertion order.
    pub fn values(&self) -> impl Iterator<Item = &D> {
        self.entries().map(|(_, d)| d)
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

impl<K, D> Default for KeyedCache<K, D>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
