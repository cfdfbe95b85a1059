//! Daily registration report.

use std::collections::{BTreeMap, HashSet};

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{event::Event, referral::ReferralEntry, registration::Registration};

const TOP_COUNTRIES: usize = 5;
const WEEK_DAYS: u64 = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodaySummary {
  pub date:          NaiveDate,
  pub count:         u64,
  /// Newest first.
  pub registrations: Vec<TodayRegistration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayRegistration {
  #[serde(flatten)]
  pub entry:   ReferralEntry,
  pub country: Option<String>,
  pub city:    Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCount {
  pub date:  NaiveDate,
  pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryCount {
  pub country: String,
  pub count:   u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCount {
  pub event: String,
  pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReport {
  pub today:               TodaySummary,
  pub yesterday:           DayCount,
  /// Days from `today - 7` onward that had registrations, newest first.
  pub last_seven_days:     Vec<DayCount>,
  pub week_total:          u64,
  pub total_registrations: u64,
  /// Distinct visitor ids among registrations.
  pub unique_visitors:     u64,
  pub top_countries:       Vec<CountryCount>,
  pub today_events:        Vec<EventCount>,
}

/// Builds the report for the UTC calendar day `today`.
pub fn daily_report(registrations: &[Registration], events: &[Event], today: NaiveDate) -> DailyReport {
  let yesterday = today.pred_opt().unwrap_or(today);
  let week_start = today.checked_sub_days(Days::new(WEEK_DAYS)).unwrap_or(today);

  let mut todays: Vec<&Registration> = Vec::new();
  let mut per_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
  let mut countries: BTreeMap<&str, u64> = BTreeMap::new();
  let mut visitors: HashSet<&str> = HashSet::new();

  for r in registrations {
    let day = r.timestamp.date_naive();
    if day == today {
      todays.push(r);
    }
    *per_day.entry(day).or_default() += 1;
    if let Some(country) = r.details.context.country.as_deref().filter(|c| !c.is_empty()) {
      *countries.entry(country).or_default() += 1;
    }
    if let Some(visitor) = r.details.visitor_id.as_deref() {
      visitors.insert(visitor);
    }
  }
  todays.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

  let count_on = |date: NaiveDate| per_day.get(&date).copied().unwrap_or(0);

  let last_seven_days: Vec<DayCount> = per_day
    .range(week_start..)
    .rev()
    .map(|(&date, &count)| DayCount { date, count })
    .collect();
  let week_total = last_seven_days.iter().map(|d| d.count).sum();

  let mut top_countries: Vec<CountryCount> = countries
    .into_iter()
    .map(|(country, count)| CountryCount { country: country.to_owned(), count })
    .collect();
  // Stable: ties stay alphabetical.
  top_countries.sort_by(|a, b| b.count.cmp(&a.count));
  top_countries.truncate(TOP_COUNTRIES);

  let mut by_kind: BTreeMap<&str, u64> = BTreeMap::new();
  for e in events.iter().filter(|e| e.timestamp.date_naive() == today) {
    *by_kind.entry(e.kind.as_str()).or_default() += 1;
  }
  let mut today_events: Vec<EventCount> = by_kind
    .into_iter()
    .map(|(event, count)| EventCount { event: event.to_owned(), count })
    .collect();
  today_events.sort_by(|a, b| b.count.cmp(&a.count));

  DailyReport {
    today: TodaySummary {
      date:          today,
      count:         todays.len() as u64,
      registrations: todays
        .into_iter()
        .map(|r| TodayRegistration {
          entry:   ReferralEntry::from(r),
          country: r.details.context.country.clone(),
          city:    r.details.context.city.clone(),
        })
        .collect(),
    },
    yesterday: DayCount { date: yesterday, count: count_on(yesterday) },
    last_seven_days,
    week_total,
    total_registrations: registrations.len() as u64,
    unique_visitors: visitors.len() as u64,
    top_countries,
    today_events,
  }
}
