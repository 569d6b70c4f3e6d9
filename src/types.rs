//! Core types for the live result set engine.

use crate::error::KeyError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Caller-supplied key extractor: maps a document to its stable identity.
///
/// Must be pure and deterministic — the same document yields the same key
/// across snapshots. Non-unique or non-deterministic extractors cause silent
/// overwrites in the cache; that is a precondition violation, not a detected
/// error.
///
/// The `Arc` is also the extractor's identity for subscription comparison
/// (see [`SubscriptionIdentity`](crate::SubscriptionIdentity)): clone the
/// same `Arc` to mean "same extractor".
pub type KeyFn<D, K> = Arc<dyn Fn(&D) -> Result<K, KeyError> + Send + Sync>;

/// Lift an infallible closure into a [`KeyFn`].
pub fn key_fn<D, K, F>(f: F) -> KeyFn<D, K>
where
    F: Fn(&D) -> K + Send + Sync + 'static,
{
    Arc::new(move |doc| Ok(f(doc)))
}

/// Lift a fallible closure into a [`KeyFn`].
pub fn try_key_fn<D, K, F>(f: F) -> KeyFn<D, K>
where
    F: Fn(&D) -> Result<K, KeyError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// The kind of a change record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Added => write!(f, "added"),
            ChangeKind::Modified => write!(f, "modified"),
            ChangeKind::Removed => write!(f, "removed"),
        }
    }
}

/// One change event from the change source.
///
/// `index` is the record's position within the snapshot's ordered document
/// list at the time of the event. It is informational only: the cache never
/// uses remote-supplied ordering to determine final order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeRecord<D> {
    /// A document entered the result set.
    Added { doc: D, index: usize },
    /// A document in the result set changed.
    Modified { doc: D, index: usize },
    /// A document left the result set.
    Removed { doc: D, index: usize },
}

impl<D> ChangeRecord<D> {
    pub fn added(doc: D, index: usize) -> Self {
        ChangeRecord::Added { doc, index }
    }

    pub fn modified(doc: D, index: usize) -> Self {
        ChangeRecord::Modified { doc, index }
    }

    pub fn removed(doc: D, index: usize) -> Self {
        ChangeRecord::Removed { doc, index }
    }

    /// The document this record refers to.
    pub fn doc(&self) -> &D {
        match self {
            ChangeRecord::Added { doc, .. }
            | ChangeRecord::Modified { doc, .. }
            | ChangeRecord::Removed { doc, .. } => doc,
        }
    }

    /// The record's position in the snapshot's document list.
    pub fn index(&self) -> usize {
        match self {
            ChangeRecord::Added { index, .. }
            | ChangeRecord::Modified { index, .. }
            | ChangeRecord::Removed { index, .. } => *index,
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeRecord::Added { .. } => ChangeKind::Added,
            ChangeRecord::Modified { .. } => ChangeKind::Modified,
            ChangeRecord::Removed { .. } => ChangeKind::Removed,
        }
    }
}

/// One delivery from the change source: the current ordered document list
/// plus the change records since the prior snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<D> {
    /// Current documents, in the source's order. Not used for cache order.
    pub docs: Vec<D>,
    /// Changes since the previous snapshot, in delivery order.
    pub changes: Vec<ChangeRecord<D>>,
}

impl<D> Snapshot<D> {
    pub fn new(docs: Vec<D>, changes: Vec<ChangeRecord<D>>) -> Self {
        Self { docs, changes }
    }

    /// A snapshot carrying only change records.
    pub fn of_changes(changes: Vec<ChangeRecord<D>>) -> Self {
        Self {
            docs: Vec::new(),
            changes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// A failure reported by the change source.
///
/// Surfaced to the consumer verbatim; the engine never translates,
/// suppresses, or retries.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("invalid query: {message}")]
    InvalidQuery { message: String },

    #[error("source unavailable: {message}")]
    Unavailable { message: String },

    #[error("transport error: {message}")]
    Transport { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_record_accessors() {
        let record = ChangeRecord::modified("doc", 3);
        assert_eq!(*record.doc(), "doc");
        assert_eq!(record.index(), 3);
        assert_eq!(record.kind(), ChangeKind::Modified);
    }

    #[test]
    fn test_change_record_serde_tagging() {
        let record = ChangeRecord::added(serde_json::json!({"id": "a"}), 0);
        let encoded = serde_json::to_value(&record).unwrap();
        assert_eq!(encoded["type"], "added");
        assert_eq!(encoded["index"], 0);
        assert_eq!(encoded["doc"]["id"], "a");
    }

    #[test]
    fn test_source_error_display() {
        let err = SourceError::InvalidQuery {
            message: "bad filter".to_string(),
        };
        assert_eq!(err.to_string(), "invalid query: bad filter");
    }

    #[test]
    fn test_key_fn_infallible() {
        let key_of: KeyFn<&str, usize> = key_fn(|doc: &&str| doc.len());
        assert_eq!((*key_of)(&"abc").unwrap(), 3);
    }

    #[test]
    fn test_try_key_fn_propagates() {
        let key_of: KeyFn<&str, usize> = try_key_fn(|doc: &&str| {
            if doc.is_empty() {
                Err(KeyError::new("empty document"))
            } else {
                Ok(doc.len())
            }
        });
        assert!((*key_of)(&"").is_err());
        assert_eq!((*key_of)(&"ab").unwrap(), 2);
    }
}
