//! Registrations: completed sign-ups, unique by `(email, timestamp)`.
//!
//! A registration may name another registration as its referrer through
//! `referred_by`. The link is a plain id: it is never checked against the
//! store and may dangle once the referrer is deleted. Resolution is always a
//! single hop, so referral cycles are harmless.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  event::{Event, EventDetails, EventKind, VisitContext},
  merge::DedupKey,
  wire,
};

/// Everything about a registration except its identity and timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationDetails {
  #[serde(alias = "first_name")]
  pub first_name:  Option<String>,
  #[serde(alias = "last_name")]
  pub last_name:   Option<String>,
  pub phone:       Option<String>,
  #[serde(alias = "visitor_id")]
  pub visitor_id:  Option<String>,
  #[serde(alias = "session_id")]
  pub session_id:  Option<String>,
  #[serde(rename = "hookVariant", alias = "hook_variant", alias = "variant")]
  pub variant:     Option<String>,
  /// Id of the registration credited with this sign-up.
  #[serde(
    alias = "referred_by",
    default,
    deserialize_with = "wire::opt_id"
  )]
  pub referred_by: Option<i64>,
  #[serde(flatten)]
  pub context:     VisitContext,
}

impl RegistrationDetails {
  /// `"First Last"`, trimmed; `None` when both parts are blank.
  pub fn full_name(&self) -> Option<String> {
    let full = format!(
      "{} {}",
      self.first_name.as_deref().unwrap_or_default(),
      self.last_name.as_deref().unwrap_or_default()
    );
    let full = full.trim();
    (!full.is_empty()).then(|| full.to_owned())
  }
}

// ─── Registration ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
  pub id:         i64,
  #[serde(alias = "emailAddress")]
  pub email:      String,
  #[serde(with = "wire::timestamp")]
  pub timestamp:  DateTime<Utc>,
  #[serde(flatten)]
  pub details:    RegistrationDetails,
  #[serde(alias = "created_at", default, with = "wire::opt_timestamp")]
  pub created_at: Option<DateTime<Utc>>,
}

impl Registration {
  /// A synthetic `registration` event carrying this sign-up's variant,
  /// visitor and name, so that it can be folded into variant reports
  /// alongside tracked events.
  pub fn to_event(&self) -> Event {
    Event {
      id:         self.id,
      kind:       EventKind::Registration,
      timestamp:  self.timestamp,
      details:    EventDetails {
        visitor_id: self.details.visitor_id.clone(),
        session_id: self.details.session_id.clone(),
        email: Some(self.email.clone()),
        name: self.details.full_name(),
        variant: self.details.variant.clone(),
        referred_by: self.details.referred_by,
        context: self.details.context.clone(),
        ..EventDetails::default()
      },
      created_at: self.created_at,
    }
  }
}

// ─── NewRegistration ─────────────────────────────────────────────────────────

/// Input to [`crate::store::FunnelStore::append_registration`], and the
/// record shape of client-side daily backup files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRegistration {
  #[serde(alias = "emailAddress")]
  pub email:     Option<String>,
  #[serde(default, with = "wire::opt_timestamp")]
  pub timestamp: Option<DateTime<Utc>>,
  #[serde(flatten)]
  pub details:   RegistrationDetails,
}

impl NewRegistration {
  pub fn new(email: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
    Self {
      email:     Some(email.into()),
      timestamp: Some(timestamp),
      details:   RegistrationDetails::default(),
    }
  }

  /// Reject registrations without an email or timestamp.
  pub fn validate(&self) -> Result<()> {
    if wire::non_blank(self.email.as_deref()).is_none() {
      return Err(Error::MissingField("email"));
    }
    if self.timestamp.is_none() {
      return Err(Error::MissingField("timestamp"));
    }
    Ok(())
  }
}

impl From<Registration> for NewRegistration {
  fn from(r: Registration) -> Self {
    Self {
      email:     Some(r.email),
      timestamp: Some(r.timestamp),
      details:   r.details,
    }
  }
}

impl DedupKey for NewRegistration {
  fn email(&self) -> Option<&str> { self.email.as_deref() }

  fn timestamp(&self) -> Option<DateTime<Utc>> { self.timestamp }
}

impl DedupKey for Registration {
  fn email(&self) -> Option<&str> { Some(&self.email) }

  fn timestamp(&self) -> Option<DateTime<Utc>> { Some(self.timestamp) }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn accepts_legacy_field_spellings() {
    let json = r#"{
      "emailAddress": "amina@example.com",
      "first_name": "Amina",
      "last_name": "Yusuf",
      "variant": "B",
      "utm_campaign": "nov",
      "timestamp": "2025-11-20T08:30:00"
    }"#;
    let reg: NewRegistration = serde_json::from_str(json).unwrap();
    assert_eq!(reg.email.as_deref(), Some("amina@example.com"));
    assert_eq!(reg.details.full_name().as_deref(), Some("Amina Yusuf"));
    assert_eq!(reg.details.variant.as_deref(), Some("B"));
    assert_eq!(reg.details.context.utm_campaign.as_deref(), Some("nov"));
    reg.validate().unwrap();
  }

  #[test]
  fn blank_email_is_a_validation_error() {
    let ts = Utc.with_ymd_and_hms(2025, 11, 20, 8, 0, 0).unwrap();
    let reg = NewRegistration::new("  ", ts);
    assert!(matches!(reg.validate(), Err(Error::MissingField("email"))));

    let mut reg = NewRegistration::new("a@example.com", ts);
    reg.timestamp = None;
    assert!(matches!(reg.validate(), Err(Error::MissingField("timestamp"))));
  }

  #[test]
  fn synthetic_event_carries_conversion_fields() {
    let reg = Registration {
      id:         9,
      email:      "sara@example.com".into(),
      timestamp:  Utc.with_ymd_and_hms(2025, 11, 20, 8, 0, 0).unwrap(),
      details:    RegistrationDetails {
        first_name: Some("Sara".into()),
        visitor_id: Some("v-3".into()),
        variant: Some("A".into()),
        ..Default::default()
      },
      created_at: None,
    };
    let ev = reg.to_event();
    assert_eq!(ev.kind, EventKind::Registration);
    assert_eq!(ev.details.email.as_deref(), Some("sara@example.com"));
    assert_eq!(ev.details.name.as_deref(), Some("Sara"));
    assert_eq!(ev.details.variant.as_deref(), Some("A"));
    assert_eq!(ev.details.visitor_id.as_deref(), Some("v-3"));
  }
}
