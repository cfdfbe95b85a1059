//! Handlers for tracked events.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/analytics/track` | Public. Server time is used if `timestamp` is absent |
//! | `GET`  | `/api/analytics/events` | Admin. `?event&start_date&end_date&limit` |
//! | `GET`  | `/api/analytics/event/{id}` | Admin. 404 if not found |
//! | `DELETE` | `/api/analytics/event/{id}` | Admin. 404 if not found |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::Utc;
use funnel_core::{
  event::{Event, EventKind, NewEvent},
  store::{EventQuery, FunnelStore},
};
use serde::Deserialize;
use serde_json::json;

use crate::{
  ApiState,
  auth::Admin,
  error::ApiError,
  params::{Bound, parse_bound},
};

// ─── Track ───────────────────────────────────────────────────────────────────

/// `POST /api/analytics/track`
pub async fn track<S: FunnelStore>(
  State(state): State<ApiState<S>>,
  Json(mut event): Json<NewEvent>,
) -> Result<impl IntoResponse, ApiError> {
  event.timestamp.get_or_insert_with(Utc::now);
  event.validate()?;

  let id = state.store.append_event(event).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(json!({ "success": true, "id": id }))))
}

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub event:      Option<String>,
  pub start_date: Option<String>,
  pub end_date:   Option<String>,
  pub limit:      Option<usize>,
}

impl ListParams {
  fn into_query(self) -> Result<EventQuery, ApiError> {
    Ok(EventQuery {
      kind:  self.event.filter(|e| !e.is_empty()).map(EventKind::from),
      from:  self.start_date.as_deref().map(|d| parse_bound(d, Bound::Start)).transpose()?,
      to:    self.end_date.as_deref().map(|d| parse_bound(d, Bound::End)).transpose()?,
      limit: self.limit,
    })
  }
}

/// `GET /api/analytics/events`
pub async fn list<S: FunnelStore>(
  _: Admin,
  State(state): State<ApiState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Event>>, ApiError> {
  let events = state
    .store
    .list_events(params.into_query()?)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(events))
}

// ─── Get / delete one ────────────────────────────────────────────────────────

/// `GET /api/analytics/event/{id}`
pub async fn get_one<S: FunnelStore>(
  _: Admin,
  State(state): State<ApiState<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Event>, ApiError> {
  let event = state
    .store
    .get_event(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("event {id} not found")))?;
  Ok(Json(event))
}

/// `DELETE /api/analytics/event/{id}`
pub async fn delete_one<S: FunnelStore>(
  _: Admin,
  State(state): State<ApiState<S>>,
  Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
  if !state.store.delete_event(id).await.map_err(ApiError::store)? {
    return Err(ApiError::NotFound(format!("event {id} not found")));
  }
  Ok(Json(json!({ "success": true, "message": format!("event {id} deleted") })))
}
