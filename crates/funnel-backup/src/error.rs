//! Error type for `funnel-backup`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("i/o error on {path}: {source}")]
  Io {
    path:   PathBuf,
    source: std::io::Error,
  },

  #[error("malformed backup {path}: {source}")]
  Json {
    path:   PathBuf,
    source: serde_json::Error,
  },
}

impl Error {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io { path: path.into(), source }
  }

  pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
    Self::Json { path: path.into(), source }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
