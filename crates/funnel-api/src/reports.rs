//! Read-only reports over the whole store.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET` | `/api/analytics/stats` | Headline counts |
//! | `GET` | `/api/analytics/ab-test` | `?count_visit_with_email&include_registrations&min_sample` |
//! | `GET` | `/api/referrals` | Global referral totals and ranking |
//! | `GET` | `/api/referrals/{id}` | One referrer; unknown ids yield zeroes |
//! | `GET` | `/api/reports/daily` | Optional `?date=YYYY-MM-DD`, default today (UTC) |
//!
//! All of these are admin routes.

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{NaiveDate, Utc};
use funnel_core::{
  event::Event,
  referral::{self, GlobalReferralStats, ReferralStats},
  registration::Registration,
  report::{self, DailyReport},
  store::{EventQuery, FunnelStore, StoreStats},
  variant::{self, AggregateOptions, VariantReport},
};
use serde::Deserialize;

use crate::{ApiState, auth::Admin, error::ApiError};

async fn snapshot<S: FunnelStore>(store: &S) -> Result<(Vec<Registration>, Vec<Event>), ApiError> {
  let registrations = store.list_registrations(None).await.map_err(ApiError::store)?;
  let events = store.list_events(EventQuery::default()).await.map_err(ApiError::store)?;
  Ok((registrations, events))
}

/// `GET /api/analytics/stats`
pub async fn stats<S: FunnelStore>(
  _: Admin,
  State(state): State<ApiState<S>>,
) -> Result<Json<StoreStats>, ApiError> {
  Ok(Json(state.store.stats().await.map_err(ApiError::store)?))
}

// ─── A/B test ────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct AbTestParams {
  /// Defaults to counting a visit that carries an email as a conversion.
  pub count_visit_with_email: Option<bool>,
  /// Fold stored registrations in as registration events.
  #[serde(default)]
  pub include_registrations:  bool,
  pub min_sample:             Option<u64>,
}

impl AbTestParams {
  fn options(&self) -> AggregateOptions {
    let defaults = AggregateOptions::default();
    AggregateOptions {
      count_visit_with_email: self.count_visit_with_email.unwrap_or(defaults.count_visit_with_email),
      min_sample:             self.min_sample.unwrap_or(defaults.min_sample),
    }
  }
}

/// `GET /api/analytics/ab-test`
pub async fn ab_test<S: FunnelStore>(
  _: Admin,
  State(state): State<ApiState<S>>,
  Query(params): Query<AbTestParams>,
) -> Result<Json<VariantReport>, ApiError> {
  let mut events = state
    .store
    .list_events(EventQuery::default())
    .await
    .map_err(ApiError::store)?;

  if params.include_registrations {
    let registrations = state.store.list_registrations(None).await.map_err(ApiError::store)?;
    events.extend(registrations.iter().map(Registration::to_event));
  }

  Ok(Json(variant::aggregate(&events, &params.options())))
}

// ─── Referrals ───────────────────────────────────────────────────────────────

/// `GET /api/referrals`
pub async fn referrals<S: FunnelStore>(
  _: Admin,
  State(state): State<ApiState<S>>,
) -> Result<Json<GlobalReferralStats>, ApiError> {
  let (registrations, events) = snapshot(state.store.as_ref()).await?;
  Ok(Json(referral::global_stats(&registrations, &events)))
}

/// `GET /api/referrals/{id}`
pub async fn referrals_for<S: FunnelStore>(
  _: Admin,
  State(state): State<ApiState<S>>,
  Path(id): Path<i64>,
) -> Result<Json<ReferralStats>, ApiError> {
  let (registrations, events) = snapshot(state.store.as_ref()).await?;
  Ok(Json(referral::stats_for(id, &registrations, &events)))
}

// ─── Daily report ────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct DailyParams {
  pub date: Option<NaiveDate>,
}

/// `GET /api/reports/daily`
pub async fn daily<S: FunnelStore>(
  _: Admin,
  State(state): State<ApiState<S>>,
  Query(params): Query<DailyParams>,
) -> Result<Json<DailyReport>, ApiError> {
  let today = params.date.unwrap_or_else(|| Utc::now().date_naive());
  let (registrations, events) = snapshot(state.store.as_ref()).await?;
  Ok(Json(report::daily_report(&registrations, &events, today)))
}
