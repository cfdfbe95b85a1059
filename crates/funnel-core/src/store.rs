//! Persistence boundary for events, registrations, settings and the waiting
//! list. `funnel-store-sqlite` is the production backend; everything above
//! it is written against [`FunnelStore`].

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  event::{Event, EventKind, NewEvent},
  registration::{NewRegistration, Registration},
  setting::Setting,
  waitlist::{NewWaitlistEntry, WaitlistEntry},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`FunnelStore::list_events`].
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
  pub kind:  Option<EventKind>,
  /// Inclusive lower bound on the event timestamp.
  pub from:  Option<DateTime<Utc>>,
  /// Inclusive upper bound on the event timestamp.
  pub to:    Option<DateTime<Utc>>,
  pub limit: Option<usize>,
}

/// Outcome of an insert into a collection with a uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Insertion {
  Created(i64),
  /// An equal record already exists. Nothing was written.
  Duplicate,
}

impl Insertion {
  pub fn id(self) -> Option<i64> {
    match self {
      Self::Created(id) => Some(id),
      Self::Duplicate => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryCount {
  pub country: String,
  pub count:   u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCount {
  pub page:  String,
  pub count: u64,
}

/// Headline numbers for the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
  pub total_events:             u64,
  pub total_visits:             u64,
  pub unique_visitors:          u64,
  pub total_registrations:      u64,
  pub button_clicks:            u64,
  /// Most registrations first.
  pub registrations_by_country: Vec<CountryCount>,
  /// Most visits first.
  pub page_views:               Vec<PageCount>,
}

/// Rows removed by [`FunnelStore::reset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetCounts {
  pub events:        u64,
  pub registrations: u64,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a funnel store backend.
///
/// Every write is a single atomic statement, or a single transaction for the
/// bulk restore methods, and is visible to the next read.
///
/// Futures are `Send` so handlers can hold them across `.await` on a
/// multi-threaded runtime.
pub trait FunnelStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Events ────────────────────────────────────────────────────────────

  /// Validate and append an event, returning its new id.
  fn append_event(
    &self,
    event: NewEvent,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + '_;

  /// Events matching `query`, newest first.
  fn list_events(
    &self,
    query: EventQuery,
  ) -> impl Future<Output = Result<Vec<Event>, Self::Error>> + Send + '_;

  fn get_event(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Event>, Self::Error>> + Send + '_;

  /// Returns `false` if there was no such event.
  fn delete_event(&self, id: i64) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Registrations ─────────────────────────────────────────────────────

  /// Validate and append a registration. A second registration with the
  /// same `(email, timestamp)` yields [`Insertion::Duplicate`].
  fn append_registration(
    &self,
    registration: NewRegistration,
  ) -> impl Future<Output = Result<Insertion, Self::Error>> + Send + '_;

  /// Registrations, newest first.
  fn list_registrations(
    &self,
    limit: Option<usize>,
  ) -> impl Future<Output = Result<Vec<Registration>, Self::Error>> + Send + '_;

  fn get_registration(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Registration>, Self::Error>> + Send + '_;

  /// Returns `false` if there was no such registration.
  fn delete_registration(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Maintenance ───────────────────────────────────────────────────────

  fn stats(&self) -> impl Future<Output = Result<StoreStats, Self::Error>> + Send + '_;

  /// Delete every event and registration. Settings and the waiting list
  /// are kept.
  fn reset(&self) -> impl Future<Output = Result<ResetCounts, Self::Error>> + Send + '_;

  /// Insert events keeping their ids, skipping ids that already exist.
  /// Returns the number of rows inserted.
  fn restore_events(
    &self,
    events: Vec<Event>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Insert registrations keeping their ids, skipping rows whose id or
  /// `(email, timestamp)` already exists. Returns the number inserted.
  fn restore_registrations(
    &self,
    registrations: Vec<Registration>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Settings ──────────────────────────────────────────────────────────

  fn get_setting<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<Setting>, Self::Error>> + Send + 'a;

  /// Insert or overwrite a setting.
  fn set_setting<'a>(
    &'a self,
    key: &'a str,
    value: &'a str,
  ) -> impl Future<Output = Result<Setting, Self::Error>> + Send + 'a;

  fn list_settings(&self) -> impl Future<Output = Result<Vec<Setting>, Self::Error>> + Send + '_;

  // ── Waiting list ──────────────────────────────────────────────────────

  /// Add an entry. An email already on the list yields
  /// [`Insertion::Duplicate`].
  fn join_waitlist(
    &self,
    entry: NewWaitlistEntry,
  ) -> impl Future<Output = Result<Insertion, Self::Error>> + Send + '_;

  /// Entries, newest first.
  fn list_waitlist(&self)
  -> impl Future<Output = Result<Vec<WaitlistEntry>, Self::Error>> + Send + '_;
}
