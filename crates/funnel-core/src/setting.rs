//! Site-wide key/value settings. Last write wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::wire;

pub const SITE_CLOSED: &str = "site_closed";
pub const CLOSED_MESSAGE: &str = "closed_message";

/// Settings every fresh store starts with.
pub const DEFAULTS: &[(&str, &str)] = &[
  (SITE_CLOSED, "false"),
  (
    CLOSED_MESSAGE,
    "Registration is currently closed. Join our waiting list to be notified when we open again!",
  ),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
  pub key:        String,
  pub value:      String,
  #[serde(with = "wire::timestamp")]
  pub updated_at: DateTime<Utc>,
}

impl Setting {
  /// Interprets the value as a flag. Anything but `true`/`1`/`yes` is false.
  pub fn as_bool(&self) -> bool {
    matches!(self.value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
  }
}
