//! Error types for the live result set engine.

use crate::types::SourceError;
use thiserror::Error;

/// A failure reported by a caller-supplied key extractor.
///
/// Key extractors are pure by contract; this exists so that a caller whose
/// documents can be malformed (missing id field, wrong type) has somewhere
/// to put that information instead of panicking.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct KeyError(pub String);

impl KeyError {
    pub fn new(message: impl Into<String>) -> Self {
        KeyError(message.into())
    }
}

/// Main error type for reconciliation and subscription operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The change source failed. Propagated verbatim, never translated.
    #[error("change source error: {0}")]
    Source(#[from] SourceError),

    /// The key extractor rejected a document. The whole reconciliation
    /// cycle is rejected and the cache is left exactly as it was.
    #[error("key extraction failed for change record {index}: {source}")]
    KeyExtraction { index: usize, source: KeyError },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
