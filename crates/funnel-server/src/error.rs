//! Errors raised by the server's collaborators (CRM, geolocation, backups).

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("CRM is not configured")]
  CrmDisabled,

  #[error("CRM rejected the contact ({status}): {body}")]
  Rejected { status: u16, body: String },

  #[error("geolocation lookup failed: {0}")]
  Geolocation(String),

  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error(transparent)]
  Invalid(#[from] funnel_core::Error),

  #[error("bad request: {0}")]
  BadRequest(&'static str),

  #[error(transparent)]
  Backup(#[from] funnel_backup::Error),

  #[error("background task failed: {0}")]
  Join(#[from] tokio::task::JoinError),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = match &self {
      Error::CrmDisabled => StatusCode::SERVICE_UNAVAILABLE,
      Error::Rejected { status, body } => {
        let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY);
        return (
          status,
          Json(json!({ "success": false, "error": body, "status": status.as_u16() })),
        )
          .into_response();
      }
      Error::Http(_) | Error::Geolocation(_) => StatusCode::BAD_GATEWAY,
      Error::Invalid(_) | Error::BadRequest(_) => StatusCode::BAD_REQUEST,
      Error::Backup(_) | Error::Join(_) | Error::Store(_) => {
        tracing::error!(error = %self, "request failed");
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };
    (status, Json(json!({ "success": false, "error": self.to_string() }))).into_response()
  }
}
