//! Conversions between domain types and the text and JSON columns of the funnel tables.
//!
//! Timestamps are stored as RFC 3339 UTC strings with microsecond precision,
//! so every stored timestamp has the same width and text order is time
//! order. Descriptive metadata is stored as compact JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use funnel_core::{
  event::{Event, EventDetails},
  registration::{Registration, RegistrationDetails},
  setting::Setting,
  waitlist::{WaitlistDetails, WaitlistEntry},
  wire,
};
use rusqlite::Row;

use crate::Result;

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> { Ok(wire::parse_timestamp(s)?) }

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Raw row types ───────────────────────────────────────────────────────────

/// Column values read from an `events` row before decoding.
pub struct RawEvent {
  pub id:           i64,
  pub event:        String,
  pub timestamp:    String,
  pub details_json: String,
  pub created_at:   Option<String>,
}

impl RawEvent {
  pub const COLUMNS: &'static str = "id, event, timestamp, details_json, created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           row.get("id")?,
      event:        row.get("event")?,
      timestamp:    row.get("timestamp")?,
      details_json: row.get("details_json")?,
      created_at:   row.get("created_at")?,
    })
  }

  pub fn into_event(self) -> Result<Event> {
    let details: EventDetails = serde_json::from_str(&self.details_json)?;
    Ok(Event {
      id: self.id,
      kind: self.event.into(),
      timestamp: decode_dt(&self.timestamp)?,
      details,
      created_at: decode_opt_dt(self.created_at)?,
    })
  }
}

/// Column values read from a `registrations` row before decoding.
pub struct RawRegistration {
  pub id:           i64,
  pub email:        String,
  pub timestamp:    String,
  pub details_json: String,
  pub created_at:   Option<String>,
}

impl RawRegistration {
  pub const COLUMNS: &'static str = "id, email, timestamp, details_json, created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           row.get("id")?,
      email:        row.get("email")?,
      timestamp:    row.get("timestamp")?,
      details_json: row.get("details_json")?,
      created_at:   row.get("created_at")?,
    })
  }

  pub fn into_registration(self) -> Result<Registration> {
    let details: RegistrationDetails = serde_json::from_str(&self.details_json)?;
    Ok(Registration {
      id: self.id,
      email: self.email,
      timestamp: decode_dt(&self.timestamp)?,
      details,
      created_at: decode_opt_dt(self.created_at)?,
    })
  }
}

pub struct RawWaitlistEntry {
  pub id:           i64,
  pub email:        String,
  pub timestamp:    String,
  pub details_json: String,
  pub created_at:   Option<String>,
}

impl RawWaitlistEntry {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           row.get("id")?,
      email:        row.get("email")?,
      timestamp:    row.get("timestamp")?,
      details_json: row.get("details_json")?,
      created_at:   row.get("created_at")?,
    })
  }

  pub fn into_entry(self) -> Result<WaitlistEntry> {
    let details: WaitlistDetails = serde_json::from_str(&self.details_json)?;
    Ok(WaitlistEntry {
      id: self.id,
      email: self.email,
      timestamp: decode_dt(&self.timestamp)?,
      details,
      created_at: decode_opt_dt(self.created_at)?,
    })
  }
}

pub struct RawSetting {
  pub key:        String,
  pub value:      String,
  pub updated_at: String,
}

impl RawSetting {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      key:        row.get("key")?,
      value:      row.get("value")?,
      updated_at: row.get("updated_at")?,
    })
  }

  pub fn into_setting(self) -> Result<Setting> {
    Ok(Setting { key: self.key, value: self.value, updated_at: decode_dt(&self.updated_at)? })
  }
}
