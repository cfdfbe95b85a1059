//! Handlers for registrations.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/analytics/registration` | Public. Duplicate `(email, timestamp)` is reported, not rejected |
//! | `GET`  | `/api/registrations` | Admin. Optional `?limit` |
//! | `GET`  | `/api/registration/{id}` | Admin. 404 if not found |
//! | `DELETE` | `/api/registration/{id}` | Admin. 404 if not found |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::Utc;
use funnel_core::{
  contact::ContactUpsert,
  registration::{NewRegistration, Registration},
  store::{FunnelStore, Insertion},
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::{ApiState, auth::Admin, error::ApiError};

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /api/analytics/registration`
pub async fn create<S: FunnelStore>(
  State(state): State<ApiState<S>>,
  Json(mut input): Json<NewRegistration>,
) -> Result<impl IntoResponse, ApiError> {
  let timestamp = *input.timestamp.get_or_insert_with(Utc::now);
  input.validate()?;
  let email = input.email.as_deref().unwrap_or_default().trim().to_owned();
  let details = input.details.clone();

  let insertion = state
    .store
    .append_registration(input)
    .await
    .map_err(ApiError::store)?;

  match insertion {
    Insertion::Created(id) => {
      info!(id, email = %email, "registration created");
      let registration = Registration { id, email, timestamp, details, created_at: None };
      state.sync_contact(ContactUpsert::from_registration(&registration));
      Ok((StatusCode::CREATED, Json(json!({ "success": true, "id": id }))))
    }
    Insertion::Duplicate => Ok((
      StatusCode::OK,
      Json(json!({
        "success": true,
        "duplicate": true,
        "message": "Registration already exists",
      })),
    )),
  }
}

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub limit: Option<usize>,
}

/// `GET /api/registrations`
pub async fn list<S: FunnelStore>(
  _: Admin,
  State(state): State<ApiState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Registration>>, ApiError> {
  let registrations = state
    .store
    .list_registrations(params.limit)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(registrations))
}

// ─── Get / delete one ────────────────────────────────────────────────────────

/// `GET /api/registration/{id}`
pub async fn get_one<S: FunnelStore>(
  _: Admin,
  State(state): State<ApiState<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Registration>, ApiError> {
  let registration = state
    .store
    .get_registration(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("registration {id} not found")))?;
  Ok(Json(registration))
}

/// `DELETE /api/registration/{id}`
///
/// Registrations that named this one as their referrer keep the id.
pub async fn delete_one<S: FunnelStore>(
  _: Admin,
  State(state): State<ApiState<S>>,
  Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
  if !state.store.delete_registration(id).await.map_err(ApiError::store)? {
    return Err(ApiError::NotFound(format!("registration {id} not found")));
  }
  Ok(Json(json!({ "success": true, "message": format!("registration {id} deleted") })))
}
