//! Error types for `funnel-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A mandatory field was absent or blank on ingestion.
  #[error("missing required field: {0}")]
  MissingField(&'static str),

  #[error("invalid timestamp {value:?}: {reason}")]
  InvalidTimestamp { value: String, reason: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
