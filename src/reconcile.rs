//! The reconciliation fold: apply one snapshot's change records to a cache.

use crate::cache::KeyedCache;
use crate::error::{Error, KeyError, Result};
use crate::types::ChangeRecord;
use std::hash::Hash;

/// Apply one snapshot's change records to the cache, in place, and report
/// whether the cache's observable contents changed.
///
/// Records are processed in delivery order; within a batch, a later record
/// for the same key overrides an earlier one. `Added` and `Modified` both
/// map to [`KeyedCache::set`] (a `Modified` for an unknown key inserts it),
/// `Removed` maps to [`KeyedCache::delete`] (silent no-op when absent). The
/// snapshot's remote ordering and per-record `index` are never consulted:
/// final order is entirely the cache's first-insertion order, which is what
/// keeps the derived sequence stable across unrelated updates.
///
/// Returns `Ok(true)` iff at least one record was processed — the contract
/// is literal, so a non-empty batch that nets out to identical contents
/// still reports `true`. An empty batch returns `Ok(false)` and leaves the
/// cache untouched.
///
/// All keys are extracted before any mutation: if the extractor fails for
/// any record, the whole cycle is rejected with [`Error::KeyExtraction`]
/// and the cache is left exactly as it was.
pub fn reconcile<K, D, F>(
    changes: &[ChangeRecord<D>],
    cache: &mut KeyedCache<K, D>,
    key_of: F,
) -> Result<bool>
where
    K: Eq + Hash + Clone,
    D: Clone,
    F: Fn(&D) -> std::result::Result<K, KeyError>,
{
    if changes.is_empty() {
        return Ok(false);
    }

    // Validation pass: reject the whole batch before touching the cache.
    let mut keys = Vec::with_capacity(changes.len());
    for (index, record) in changes.iter().enumerate() {
        let key = key_of(record.doc())
            .map_err(|source| Error::KeyExtraction { index, source })?;
        keys.push(key);
    }

    for (record, key) in changes.iter().zip(keys) {
        match record {
            ChangeRecord::Added { doc, .. } | ChangeRecord::Modified { doc, .. } => {
                cache.set(key, doc.clone());
            }
            ChangeRecord::Removed { .. } => {
                cache.delete(&key);
            }
        }
    }

    Ok(true)
}
