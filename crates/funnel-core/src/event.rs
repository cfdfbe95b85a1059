//! Events: one observed visitor action on the landing pages.
//!
//! Events are immutable once stored. They can only be deleted by id as an
//! administrative purge.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, wire};

// ─── Kind ────────────────────────────────────────────────────────────────────

/// The discriminant stored in the `event` column.
///
/// The set is open: trackers may send kinds this crate does not know about,
/// which are kept verbatim in [`EventKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
  PageVisit,
  ButtonClick,
  Registration,
  Other(String),
}

impl EventKind {
  pub fn as_str(&self) -> &str {
    match self {
      Self::PageVisit => "page_visit",
      Self::ButtonClick => "button_click",
      Self::Registration => "registration",
      Self::Other(s) => s,
    }
  }

  pub fn is_visit(&self) -> bool { matches!(self, Self::PageVisit) }
}

impl From<&str> for EventKind {
  fn from(s: &str) -> Self {
    match s {
      "page_visit" => Self::PageVisit,
      "button_click" => Self::ButtonClick,
      "registration" => Self::Registration,
      other => Self::Other(other.to_owned()),
    }
  }
}

impl From<String> for EventKind {
  fn from(s: String) -> Self { Self::from(s.as_str()) }
}

impl From<EventKind> for String {
  fn from(kind: EventKind) -> Self { kind.as_str().to_owned() }
}

impl fmt::Display for EventKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Context ─────────────────────────────────────────────────────────────────

/// Descriptive metadata carried alongside events and registrations. The core
/// never interprets these fields beyond grouping by country.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitContext {
  pub country:      Option<String>,
  pub city:         Option<String>,
  pub region:       Option<String>,
  pub timezone:     Option<String>,
  #[serde(alias = "ip_address")]
  pub ip_address:   Option<String>,
  /// The HTTP referrer string (e.g. `"Direct"`). Not to be confused with
  /// referral attribution, which is `referred_by`.
  pub referrer:     Option<String>,
  #[serde(alias = "utm_source")]
  pub utm_source:   Option<String>,
  #[serde(alias = "utm_medium")]
  pub utm_medium:   Option<String>,
  #[serde(alias = "utm_campaign")]
  pub utm_campaign: Option<String>,
  #[serde(alias = "utm_content")]
  pub utm_content:  Option<String>,
}

// ─── Details ─────────────────────────────────────────────────────────────────

/// Everything about an event except its identity, kind and timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetails {
  pub page:          Option<String>,
  #[serde(alias = "visitor_id")]
  pub visitor_id:    Option<String>,
  #[serde(alias = "session_id")]
  pub session_id:    Option<String>,
  pub email:         Option<String>,
  pub name:          Option<String>,
  /// Experiment arm, e.g. `"A"` or `"B"`.
  #[serde(rename = "hookVariant", alias = "hook_variant", alias = "variant")]
  pub variant:       Option<String>,
  /// Id of the registration credited with this visit.
  #[serde(
    alias = "referred_by",
    default,
    deserialize_with = "wire::opt_id"
  )]
  pub referred_by:   Option<i64>,
  #[serde(alias = "button_name")]
  pub button_name:   Option<String>,
  /// Time on page, in seconds.
  pub duration:      Option<i64>,
  #[serde(alias = "user_agent")]
  pub user_agent:    Option<String>,
  #[serde(alias = "screen_width")]
  pub screen_width:  Option<i64>,
  #[serde(alias = "screen_height")]
  pub screen_height: Option<i64>,
  pub language:      Option<String>,
  #[serde(flatten)]
  pub context:       VisitContext,
}

// ─── Event ───────────────────────────────────────────────────────────────────

/// A stored event. `kind` and `timestamp` are always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
  pub id:         i64,
  #[serde(rename = "event", alias = "event_type")]
  pub kind:       EventKind,
  #[serde(with = "wire::timestamp")]
  pub timestamp:  DateTime<Utc>,
  #[serde(flatten)]
  pub details:    EventDetails,
  /// Server-assigned insertion time.
  #[serde(alias = "created_at", default, with = "wire::opt_timestamp")]
  pub created_at: Option<DateTime<Utc>>,
}

// ─── NewEvent ────────────────────────────────────────────────────────────────

/// Input to [`crate::store::FunnelStore::append_event`].
///
/// Both `kind` and `timestamp` are optional here so that a malformed payload
/// can be deserialised and then rejected with a precise validation error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
  #[serde(rename = "event", alias = "event_type")]
  pub kind:      Option<EventKind>,
  #[serde(default, with = "wire::opt_timestamp")]
  pub timestamp: Option<DateTime<Utc>>,
  #[serde(flatten)]
  pub details:   EventDetails,
}

impl NewEvent {
  /// Convenience constructor with all descriptive fields empty.
  pub fn new(kind: EventKind, timestamp: DateTime<Utc>) -> Self {
    Self {
      kind:      Some(kind),
      timestamp: Some(timestamp),
      details:   EventDetails::default(),
    }
  }

  /// Reject events without a kind or timestamp.
  pub fn validate(&self) -> Result<()> {
    match &self.kind {
      None => return Err(Error::MissingField("event")),
      Some(kind) if kind.as_str().trim().is_empty() => {
        return Err(Error::MissingField("event"));
      }
      Some(_) => {}
    }
    if self.timestamp.is_none() {
      return Err(Error::MissingField("timestamp"));
    }
    Ok(())
  }

  /// Validate and attach an id, e.g. for events read from JSON exports that
  /// never went through a store.
  pub fn into_event(self, id: i64) -> Result<Event> {
    let kind = self
      .kind
      .filter(|k| !k.as_str().trim().is_empty())
      .ok_or(Error::MissingField("event"))?;
    let timestamp = self.timestamp.ok_or(Error::MissingField("timestamp"))?;
    Ok(Event { id, kind, timestamp, details: self.details, created_at: None })
  }
}
