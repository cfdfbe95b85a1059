//! Query-string parsing shared by the list and report handlers.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use funnel_core::wire;

use crate::error::ApiError;

/// Which end of a date range a bare `YYYY-MM-DD` stands for.
#[derive(Debug, Clone, Copy)]
pub enum Bound {
  Start,
  End,
}

/// Parse a range bound given either as a full timestamp or as a date. A date
/// covers the whole UTC day, so `end_date=2025-11-24` includes that day.
pub fn parse_bound(value: &str, bound: Bound) -> Result<DateTime<Utc>, ApiError> {
  let value = value.trim();
  if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
    let time = match bound {
      Bound::Start => NaiveTime::MIN,
      Bound::End => NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap_or(NaiveTime::MIN),
    };
    return Ok(date.and_time(time).and_utc());
  }
  wire::parse_timestamp(value).map_err(|e| ApiError::BadRequest(e.to_string()))
}
