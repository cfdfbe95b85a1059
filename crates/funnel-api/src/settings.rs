//! Handlers for site settings.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/api/settings` | Public |
//! | `GET`  | `/api/settings/{key}` | Public. 404 if not found |
//! | `PUT`/`POST` | `/api/settings/{key}` | Admin. Body: `{"value": ...}` |

use axum::{
  Json,
  extract::{Path, State},
};
use funnel_core::{setting::Setting, store::FunnelStore};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::{ApiState, auth::Admin, error::ApiError};

/// `GET /api/settings`
pub async fn list<S: FunnelStore>(
  State(state): State<ApiState<S>>,
) -> Result<Json<Vec<Setting>>, ApiError> {
  Ok(Json(state.store.list_settings().await.map_err(ApiError::store)?))
}

/// `GET /api/settings/{key}`
pub async fn get_one<S: FunnelStore>(
  State(state): State<ApiState<S>>,
  Path(key): Path<String>,
) -> Result<Json<Setting>, ApiError> {
  let setting = state
    .store
    .get_setting(&key)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("setting {key:?} not found")))?;
  Ok(Json(setting))
}

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  #[serde(default)]
  pub value: Value,
}

/// Settings are stored as text; `true` and `42` become `"true"` and `"42"`.
fn value_text(value: Value) -> Option<String> {
  match value {
    Value::Null => None,
    Value::String(s) => Some(s),
    other => Some(other.to_string()),
  }
}

/// `PUT /api/settings/{key}`
pub async fn update<S: FunnelStore>(
  _: Admin,
  State(state): State<ApiState<S>>,
  Path(key): Path<String>,
  Json(body): Json<UpdateBody>,
) -> Result<Json<Setting>, ApiError> {
  let value = value_text(body.value).ok_or_else(|| ApiError::BadRequest("value is required".into()))?;
  let setting = state.store.set_setting(&key, &value).await.map_err(ApiError::store)?;
  info!(key = %setting.key, value = %setting.value, "setting updated");
  Ok(Json(setting))
}
