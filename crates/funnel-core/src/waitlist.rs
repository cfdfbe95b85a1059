//! Waiting list used while registration is closed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, wire};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistDetails {
  #[serde(alias = "first_name")]
  pub first_name: Option<String>,
  #[serde(alias = "last_name")]
  pub last_name:  Option<String>,
  pub phone:      Option<String>,
  /// Free-text answer to "how did you hear about us".
  #[serde(alias = "hear_about")]
  pub hear_about: Option<String>,
  pub page:       Option<String>,
  #[serde(alias = "user_agent")]
  pub user_agent: Option<String>,
}

/// A stored waiting-list entry. Email is unique across the list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistEntry {
  pub id:         i64,
  pub email:      String,
  #[serde(with = "wire::timestamp")]
  pub timestamp:  DateTime<Utc>,
  #[serde(flatten)]
  pub details:    WaitlistDetails,
  #[serde(default, with = "wire::opt_timestamp", skip_serializing_if = "Option::is_none")]
  pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWaitlistEntry {
  #[serde(default)]
  pub email:     Option<String>,
  #[serde(default, with = "wire::opt_timestamp")]
  pub timestamp: Option<DateTime<Utc>>,
  #[serde(flatten)]
  pub details:   WaitlistDetails,
}

impl NewWaitlistEntry {
  pub fn new(email: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
    Self { email: Some(email.into()), timestamp: Some(timestamp), ..Default::default() }
  }

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
