//! Error types.
//!
//! Nothing here ever reaches an HTTP client: logging is best-effort and the
//! worst failure mode is silently missing output. These errors surface only
//! from sink construction and from formatting unrepresentable field values.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A field value could not be encoded as JSON.
    #[error("failed to serialize log record: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The minimum-severity option named an unrecognized level.
    #[error("invalid log level {0:?}, expected one of trace, debug, info, warn, error")]
    InvalidLevel(String),
}
