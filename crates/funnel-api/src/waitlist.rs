//! Handlers for the waiting list.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/waitinglist` | Public. Joining twice is reported, not rejected |
//! | `GET`  | `/api/waitinglist` | Admin |

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use chrono::Utc;
use funnel_core::{
  contact::ContactUpsert,
  store::{FunnelStore, Insertion},
  waitlist::{NewWaitlistEntry, WaitlistEntry},
};
use serde_json::json;

use crate::{ApiState, auth::Admin, error::ApiError};

/// `POST /api/waitinglist`
pub async fn join<S: FunnelStore>(
  State(state): State<ApiState<S>>,
  Json(mut input): Json<NewWaitlistEntry>,
) -> Result<impl IntoResponse, ApiError> {
  let timestamp = *input.timestamp.get_or_insert_with(Utc::now);
  input.validate()?;
  let email = input.email.as_deref().unwrap_or_default().trim().to_owned();
  let details = input.details.clone();

  match state.store.join_waitlist(input).await.map_err(ApiError::store)? {
    Insertion::Created(id) => {
      let entry = WaitlistEntry { id, email, timestamp, details, created_at: None };
      state.sync_contact(ContactUpsert::from_waitlist(&entry));
      Ok((
        StatusCode::CREATED,
        Json(json!({
          "success": true,
          "id": id,
          "message": "Successfully added to waiting list",
        })),
      ))
    }
    Insertion::Duplicate => Ok((
      StatusCode::OK,
      Json(json!({
        "success": true,
        "duplicate": true,
        "message": "Already on waiting list",
      })),
    )),
  }
}

/// `GET /api/waitinglist`
pub async fn list<S: FunnelStore>(
  _: Admin,
  State(state): State<ApiState<S>>,
) -> Result<Json<Vec<WaitlistEntry>>, ApiError> {
  Ok(Json(state.store.list_waitlist().await.map_err(ApiError::store)?))
}
