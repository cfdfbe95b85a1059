//! Wire-format helpers shared by every record type.
//!
//! Timestamps are written as RFC 3339 UTC with millisecond precision
//! (`2025-11-24T10:00:00.000Z`), the same shape browsers produce with
//! `Date.toISOString()`. Because the width is fixed, the text form sorts in
//! chronological order, which the SQLite store relies on.
//!
//! Historical backups also contain naive ISO 8601 stamps and SQLite's
//! `YYYY-MM-DD HH:MM:SS` form; both are read as UTC.
//!
//! Parsed timestamps are truncated to the microsecond, the precision the
//! store keeps, so two stamps that compare equal in storage compare equal in
//! memory too.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound as _, Utc};
use serde::{Deserialize, Deserializer, Serializer, de};

use crate::{Error, Result};

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Render a timestamp in the canonical wire/storage form.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Drop sub-microsecond digits.
pub fn truncate(dt: DateTime<Utc>) -> DateTime<Utc> { dt.trunc_subsecs(6) }

/// Parse any of the accepted timestamp spellings.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
  let s = s.trim();
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Ok(truncate(dt.with_timezone(&Utc)));
  }
  NAIVE_FORMATS
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    .map(|naive| truncate(naive.and_utc()))
    .ok_or_else(|| Error::InvalidTimestamp {
      value:  s.to_owned(),
      reason: "expected RFC 3339 or ISO 8601 date-time".to_owned(),
    })
}

/// `#[serde(with = "wire::timestamp")]` for mandatory timestamps.
pub mod timestamp {
  use super::*;

  pub fn serialize<S: Serializer>(
    dt: &DateTime<Utc>,
    s: S,
  ) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_timestamp(*dt))
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(
    d: D,
  ) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(d)?;
    parse_timestamp(&raw).map_err(de::Error::custom)
  }
}

/// `#[serde(default, with = "wire::opt_timestamp")]` for optional timestamps.
/// Blank strings read as `None`.
pub mod opt_timestamp {
  use super::*;

  pub fn serialize<S: Serializer>(
    dt: &Option<DateTime<Utc>>,
    s: S,
  ) -> Result<S::Ok, S::Error> {
    match dt {
      Some(dt) => s.serialize_some(&format_timestamp(*dt)),
      None => s.serialize_none(),
    }
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(
    d: D,
  ) -> Result<Option<DateTime<Utc>>, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    match raw.as_deref().map(str::trim) {
      None | Some("") => Ok(None),
      Some(s) => parse_timestamp(s).map(Some).map_err(de::Error::custom),
    }
  }
}

/// `#[serde(default, deserialize_with = "wire::opt_id")]` for referral ids.
///
/// Browsers send `referredBy` as a number, but older exports stored it as
/// text. Both are accepted; a non-numeric string is an error rather than a
/// silently dropped attribution.
pub fn opt_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Raw {
    Int(i64),
    Text(String),
  }

  match Option::<Raw>::deserialize(d)? {
    None => Ok(None),
    Some(Raw::Int(n)) => Ok(Some(n)),
    Some(Raw::Text(s)) if s.trim().is_empty() => Ok(None),
    Some(Raw::Text(s)) => s
      .trim()
      .parse()
      .map(Some)
      .map_err(|_| de::Error::custom(format!("invalid referral id: {s:?}"))),
  }
}

/// Treat `Some("")` and whitespace-only strings as absent.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
  value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn parses_browser_iso_string() {
    let dt = parse_timestamp("2025-11-24T10:15:30.250Z").unwrap();
    assert_eq!(dt, Utc.with_ymd_and_hms(2025, 11, 24, 10, 15, 30).unwrap() + chrono::Duration::milliseconds(250));
  }

  #[test]
  fn nanoseconds_are_truncated_to_micros() {
    let fine = parse_timestamp("2025-11-24T10:15:30.123456789Z").unwrap();
    let stored = parse_timestamp("2025-11-24T10:15:30.123456Z").unwrap();
    assert_eq!(fine, stored);
    assert_eq!(parse_timestamp("2025-11-24T10:15:30.123456999").unwrap(), stored);
  }

  #[test]
  fn parses_naive_python_isoformat_as_utc() {
    let dt = parse_timestamp("2025-11-24T10:15:30.123456").unwrap();
    assert_eq!(dt.timestamp(), Utc.with_ymd_and_hms(2025, 11, 24, 10, 15, 30).unwrap().timestamp());
  }

  #[test]
  fn parses_sqlite_current_timestamp() {
    let dt = parse_timestamp("2025-11-24 10:15:30").unwrap();
    assert_eq!(dt, Utc.with_ymd_and_hms(2025, 11, 24, 10, 15, 30).unwrap());
  }

  #[test]
  fn rejects_garbage() {
    assert!(matches!(
      parse_timestamp("yesterday"),
      Err(Error::InvalidTimestamp { .. })
    ));
  }

  #[test]
  fn canonical_form_is_fixed_width() {
    let a = format_timestamp(Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap());
    assert_eq!(a, "2025-01-02T03:04:05.000Z");
  }

  #[test]
  fn referral_id_accepts_number_and_text() {
    #[derive(Deserialize)]
    struct Probe {
      #[serde(default, deserialize_with = "opt_id")]
      id: Option<i64>,
    }

    let n: Probe = serde_json::from_str(r#"{"id": 7}"#).unwrap();
    let s: Probe = serde_json::from_str(r#"{"id": "7"}"#).unwrap();
    let blank: Probe = serde_json::from_str(r#"{"id": ""}"#).unwrap();
    let absent: Probe = serde_json::from_str("{}").unwrap();
    assert_eq!(n.id, Some(7));
    assert_eq!(s.id, Some(7));
    assert_eq!(blank.id, None);
    assert_eq!(absent.id, None);
    assert!(serde_json::from_str::<Probe>(r#"{"id": "abc"}"#).is_err());
  }
}
