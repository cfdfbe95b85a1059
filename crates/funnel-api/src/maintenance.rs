//! `POST /api/database/reset`: admin-only wipe of events and registrations.

use axum::{Json, extract::State};
use funnel_core::store::FunnelStore;
use serde_json::{Value, json};
use tracing::warn;

use crate::{ApiState, auth::Admin, error::ApiError};

pub async fn reset<S: FunnelStore>(
  _: Admin,
  State(state): State<ApiState<S>>,
) -> Result<Json<Value>, ApiError> {
  let deleted = state.store.reset().await.map_err(ApiError::store)?;
  warn!(events = deleted.events, registrations = deleted.registrations, "database reset via api");
  Ok(Json(json!({ "success": true, "deleted": deleted })))
}
