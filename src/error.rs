use thiserror::Error;

/// Errors returned by the streaming engine in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Input dataset is empty.
    #[error("empty input")]
    EmptyInput,

    /// Invalid engine or context configuration.
    #[error("bad config {name}: {message}")]
    BadConfig {
        /// Parameter name.
        name: &'static str,
        /// Human-readable explanation.
        message: &'static str,
    },

    /// A sample arrived with a timestamp older than one already ingested.
    #[error("out-of-order sample: last timestamp {last}, got {given}")]
    OutOfOrder {
        /// Most recent timestamp accepted by the engine.
        last: u64,
        /// Timestamp of the rejected sample.
        given: u64,
    },

    /// A sample's length disagrees with the context dimensionality.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected dimensionality.
        expected: usize,
        /// Found dimensionality.
        found: usize,
    },
}

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, Error>;
