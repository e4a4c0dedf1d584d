//! Error types for word-level arithmetic coding.

use thiserror::Error;

use crate::arith::Symbol;

/// Error variants for vocabulary, coder and container operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A coder was built from a frequency table with no probability mass.
    #[error("empty model: frequency table has no mass")]
    EmptyModel,

    /// The frequency table's total weight exceeds what the coder's precision can split.
    #[error("frequency overflow: total weight {total} exceeds {max}")]
    FrequencyOverflow {
        /// Sum of all weights in the table.
        total: u64,
        /// Largest total the coder accepts.
        max: u64,
    },

    /// A symbol without an interval in the cumulative table reached the encoder.
    #[error("unknown symbol: {0}")]
    UnknownSymbol(Symbol),

    /// Training produced no tokens at all.
    #[error("invalid corpus: no tokens to train on")]
    InvalidCorpus,

    /// A message does not fit the container's fixed-width length fields.
    #[error("input too large: {what} is {len}, limit is {max}")]
    InputTooLarge {
        /// Which field overflowed.
        what: &'static str,
        /// Offending length.
        len: usize,
        /// Largest value the field can hold.
        max: usize,
    },

    /// Compressed bytes are truncated or inconsistent with their header.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A token outside the vocabulary was seen while escaping is disabled.
    #[error("unknown token in frozen model: {0:?}")]
    UnknownToken(String),

    /// A vocabulary snapshot is internally inconsistent.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// A configuration value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Snapshot (de)serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Error::MalformedPayload(message.into())
    }
}

/// A specialized Result type for coding operations.
pub type Result<T> = std::result::Result<T, Error>;
