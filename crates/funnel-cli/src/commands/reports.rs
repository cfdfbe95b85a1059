//! Read-only reports: `ab-test`, `referrals`, `registrations` and `today`.

use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;
use funnel_backup::{
  DAILY_PREFIX, Loaded, SkippedFile, VISITS_PREFIX, date_of, files_with_prefix, load_files,
};
use funnel_core::{
  event::{Event, EventKind, NewEvent},
  referral::{self, GlobalReferralStats, ReferralStats},
  registration::{NewRegistration, Registration},
  report::{DailyReport, daily_report},
  store::{EventQuery, FunnelStore},
  variant::{AggregateOptions, VariantReport, aggregate},
};
use serde::Serialize;
use tracing::warn;

// ─── A/B test ─────────────────────────────────────────────────────────────────

/// Events from the store, optionally with one synthetic `registration` event
/// per stored registration.
pub async fn store_events<S: FunnelStore>(store: &S, include_registrations: bool) -> Result<Vec<Event>> {
  let mut events = store.list_events(EventQuery::default()).await?;
  if include_registrations {
    let registrations = store.list_registrations(None).await?;
    events.extend(registrations.iter().map(Registration::to_event));
  }
  Ok(events)
}

/// Events from the `visits-YYYY-MM-DD.json` files in `dir`.
///
/// Records without an `event` are page visits; records without a timestamp
/// take midnight of the file's date.
pub fn visit_files(dir: &Path) -> Result<Vec<Event>> {
  let files = files_with_prefix(dir, VISITS_PREFIX)?;
  let loaded: Loaded<NewEvent> = load_files(&files);

  let mut events = Vec::with_capacity(loaded.len());
  for (path, batch) in loaded.files.iter().zip(loaded.batches) {
    let midnight = date_of(path)
      .and_then(|d| d.and_hms_opt(0, 0, 0))
      .map(|dt| dt.and_utc());
    for mut record in batch {
      record.kind.get_or_insert(EventKind::PageVisit);
      if record.timestamp.is_none() {
        record.timestamp = midnight;
      }
      match record.into_event(events.len() as i64 + 1) {
        Ok(event) => events.push(event),
        Err(e) => warn!(error = %e, path = %path.display(), "skipping visit record"),
      }
    }
  }
  Ok(events)
}

pub fn ab_report(events: &[Event], strict: bool, min_sample: u64) -> VariantReport {
  let options = AggregateOptions { count_visit_with_email: !strict, min_sample };
  aggregate(events, &options)
}

pub fn render_ab_report(report: &VariantReport) -> String {
  let mut lines = vec![
    format!(
      "{:<10} {:>8} {:>14} {:>11} {:>16} {:>14}",
      "Variant", "Visits", "Registrations", "Conv. rate", "Unique visitors", "Visitor conv."
    ),
    "-".repeat(78),
  ];
  for s in &report.variants {
    lines.push(format!(
      "{:<10} {:>8} {:>14} {:>10.1}% {:>16} {:>13.1}%",
      format!("Variant {}", s.variant),
      s.total_visits,
      s.registrations,
      s.conversion_rate,
      s.unique_visitors,
      s.visitor_conversion_rate,
    ));
  }

  for s in &report.variants {
    lines.push(String::new());
    lines.push(format!("Variant {}: {} registrants", s.variant, s.registrant_names.len()));
    lines.extend(s.registrant_names.iter().map(|name| format!("  ✓ {name}")));
    let mut pages: Vec<_> = s.page_breakdown.iter().collect();
    pages.sort_by(|a, b| b.1.cmp(a.1));
    lines.extend(pages.into_iter().map(|(page, count)| format!("  {page}: {count} views")));
  }

  lines.push(String::new());
  if report.count_visit_with_email {
    lines.push(
      "Note: page visits carrying an email were counted as registrations (use --strict to disable)."
        .to_owned(),
    );
  }
  match &report.winner {
    Some(w) => {
      lines.push(format!(
        "Variant {} leads Variant {} by {:.1} percentage points.",
        w.variant, w.runner_up, w.margin_percentage_points
      ));
      if w.sample_size_adequate {
        lines.push(format!(
          "Sample size is adequate ({} registrations, minimum {}).",
          w.registrations, report.min_sample
        ));
      } else {
        lines.push(format!(
          "Sample size may be too small ({} of {} registrations); keep testing.",
          w.registrations, report.min_sample
        ));
      }
    }
    None => lines.push("No winner yet.".to_owned()),
  }
  lines.join("\n")
}

// ─── Referrals ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ReferralSummary {
  Referrer(ReferralStats),
  Global(GlobalReferralStats),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
  pub referrer_id:    i64,
  pub referrer_email: String,
  pub referred_id:    i64,
  pub referred_email: String,
}

#[derive(Debug, Serialize)]
pub struct ReferralReport {
  #[serde(flatten)]
  pub summary:       ReferralSummary,
  pub relationships: Vec<Relationship>,
}

/// Stats for `referrer` (or every referrer) plus the referral pairs.
pub async fn referrals<S: FunnelStore>(store: &S, referrer: Option<i64>) -> Result<ReferralReport> {
  let registrations = store.list_registrations(None).await?;
  let events = store.list_events(EventQuery::default()).await?;

  let summary = match referrer {
    Some(id) => ReferralSummary::Referrer(referral::stats_for(id, &registrations, &events)),
    None => ReferralSummary::Global(referral::global_stats(&registrations, &events)),
  };
  let relationships = referral::relationships(&registrations)
    .into_iter()
    .filter(|(from, _)| referrer.is_none_or(|id| from.id == id))
    .map(|(from, to)| Relationship {
      referrer_id:    from.id,
      referrer_email: from.email.clone(),
      referred_id:    to.id,
      referred_email: to.email.clone(),
    })
    .collect();

  Ok(ReferralReport { summary, relationships })
}

impl ReferralReport {
  pub fn render(&self) -> String {
    let mut lines = Vec::new();
    match &self.summary {
      ReferralSummary::Referrer(s) => {
        lines.push(format!("Referrer #{}", s.referrer_id));
        lines.push(format!("  Referrals: {}", s.total_referrals));
        lines.push(format!("  Visits:    {}", s.total_visits));
        for r in &s.referrals {
          lines.push(format!(
            "  #{:<5} {:<30} {}",
            r.id,
            r.email,
            r.timestamp.format("%Y-%m-%d %H:%M")
          ));
        }
      }
      ReferralSummary::Global(g) => {
        lines.push(format!("Total referrals: {}", g.total_referrals));
        lines.push(format!("Referred visits: {}", g.total_visits));
        lines.push("Top referrers:".to_owned());
        for t in &g.top_referrers {
          lines.push(format!("  #{:<5} {}", t.referrer_id, t.referral_count));
        }
      }
    }
    if !self.relationships.is_empty() {
      lines.push(String::new());
      lines.push("Relationships:".to_owned());
      for r in &self.relationships {
        lines.push(format!(
          "  #{} {} → #{} {}",
          r.referrer_id, r.referrer_email, r.referred_id, r.referred_email
        ));
      }
    }
    lines.join("\n")
  }
}

// ─── Registrations ────────────────────────────────────────────────────────────

fn registration_row(
  index: usize,
  name: Option<String>,
  email: &str,
  city: Option<&str>,
  country: Option<&str>,
  timestamp: String,
) -> String {
  let location = match (city, country) {
    (Some(city), Some(country)) => format!("{city}, {country}"),
    (None, Some(country)) => country.to_owned(),
    (Some(city), None) => city.to_owned(),
    (None, None) => "N/A".to_owned(),
  };
  format!(
    "{index:>3}. {:<25} | {email:<30} | {location:<25} | {timestamp}",
    name.unwrap_or_default()
  )
}

pub fn render_registrations(registrations: &[Registration]) -> String {
  let mut lines: Vec<String> = registrations
    .iter()
    .enumerate()
    .map(|(i, r)| {
      let c = &r.details.context;
      registration_row(
        i + 1,
        r.details.full_name(),
        &r.email,
        c.city.as_deref(),
        c.country.as_deref(),
        r.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
      )
    })
    .collect();
  lines.push(format!("Total registrations: {}", registrations.len()));
  lines.join("\n")
}

/// The contents of one `registrations-YYYY-MM-DD.json` file.
#[derive(Debug)]
pub struct DayGroup {
  pub date:          Option<NaiveDate>,
  pub registrations: Vec<NewRegistration>,
}

#[derive(Debug)]
pub struct BackupListing {
  pub days:    Vec<DayGroup>,
  pub skipped: Vec<SkippedFile>,
}

pub fn backup_registrations(dir: &Path) -> Result<BackupListing> {
  let files = files_with_prefix(dir, DAILY_PREFIX)?;
  let loaded: Loaded<NewRegistration> = load_files(&files);
  let days = loaded
    .files
    .iter()
    .zip(loaded.batches)
    .filter(|(_, batch)| !batch.is_empty())
    .map(|(path, registrations)| DayGroup { date: date_of(path), registrations })
    .collect();
  Ok(BackupListing { days, skipped: loaded.skipped_files })
}

impl BackupListing {
  pub fn render(&self) -> String {
    let mut lines = Vec::new();
    let mut total = 0;
    for day in &self.days {
      let date = day.date.map_or_else(|| "unknown date".to_owned(), |d| d.to_string());
      lines.push(format!("{date} - {} registrations", day.registrations.len()));
      for (i, r) in day.registrations.iter().enumerate() {
        let c = &r.details.context;
        lines.push(registration_row(
          i + 1,
          r.details.full_name(),
          r.email.as_deref().unwrap_or("N/A"),
          c.city.as_deref(),
          c.country.as_deref(),
          r.timestamp
            .map_or_else(|| "N/A".to_owned(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
        ));
      }
      total += day.registrations.len();
    }
    for skipped in &self.skipped {
      lines.push(format!("Skipped {}: {}", skipped.path.display(), skipped.reason));
    }
    lines.push(format!("Total registrations: {total}"));
    lines.join("\n")
  }
}

// ─── Today ────────────────────────────────────────────────────────────────────

pub async fn today<S: FunnelStore>(store: &S, today: NaiveDate) -> Result<DailyReport> {
  let registrations = store.list_registrations(None).await?;
  let events = store.list_events(EventQuery::default()).await?;
  Ok(daily_report(&registrations, &events, today))
}

pub fn render_daily(report: &DailyReport) -> String {
  let mut lines = vec![format!(
    "Today ({}): {} registrations",
    report.today.date, report.today.count
  )];
  for r in &report.today.registrations {
    let name = format!(
      "{} {}",
      r.entry.first_name.as_deref().unwrap_or_default(),
      r.entry.last_name.as_deref().unwrap_or_default()
    );
    lines.push(format!(
      "  {} {:<25} {:<30} {}",
      r.entry.timestamp.format("%H:%M"),
      name.trim(),
      r.entry.email,
      r.country.as_deref().unwrap_or("N/A"),
    ));
  }
  lines.push(format!(
    "Yesterday ({}): {} registrations",
    report.yesterday.date, report.yesterday.count
  ));

  lines.push(String::new());
  lines.push(format!("Last 7 days: {} registrations", report.week_total));
  for day in &report.last_seven_days {
    lines.push(format!("  {}: {}", day.date, day.count));
  }

  lines.push(String::new());
  lines.push(format!("All time: {} registrations", report.total_registrations));
  lines.push(format!("Unique visitors: {}", report.unique_visitors));

  if !report.top_countries.is_empty() {
    lines.push("Top countries:".to_owned());
    for c in &report.top_countries {
      lines.push(format!("  {}: {}", c.country, c.count));
    }
  }
  if !report.today_events.is_empty() {
    lines.push("Today's events:".to_owned());
    for e in &report.today_events {
      lines.push(format!("  {}: {}", e.event, e.count));
    }
  }
  lines.join("\n")
}
