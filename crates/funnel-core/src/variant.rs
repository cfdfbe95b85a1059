//! A/B hook-variant aggregation.
//!
//! Events are partitioned by their `hookVariant` tag. Only [`Variant::A`] and
//! [`Variant::B`] are recognised; any other tag, or none, is ignored.
//!
//! Conversion rates are percentages rounded to one decimal place. The leader
//! is chosen on the unrounded rates; rounding only applies to what is
//! reported.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::event::{Event, EventKind};

/// Registrations the leading variant needs before its lead is considered
/// more than provisional.
pub const DEFAULT_MIN_SAMPLE: u64 = 10;

const UNKNOWN_PAGE: &str = "unknown";

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
)]
pub enum Variant {
  A,
  B,
}

impl Variant {
  /// Parses a raw tag. Matching is exact: `"a"` or `" A"` are not variants.
  pub fn from_tag(tag: &str) -> Option<Self> { tag.parse().ok() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateOptions {
  /// Also count a `page_visit` event that carries an email as a conversion.
  ///
  /// Historical tracking code attached the email to a visit once a visitor
  /// had signed up, so older data has no explicit registration event. With a
  /// registration event present as well the same conversion is counted
  /// twice.
  pub count_visit_with_email: bool,
  /// See [`DEFAULT_MIN_SAMPLE`].
  pub min_sample:             u64,
}

impl Default for AggregateOptions {
  fn default() -> Self {
    Self { count_visit_with_email: true, min_sample: DEFAULT_MIN_SAMPLE }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantStats {
  pub variant:                 Variant,
  pub total_visits:            u64,
  pub registrations:           u64,
  pub unique_visitors:         u64,
  pub unique_registrants:      u64,
  pub conversion_rate:         f64,
  pub visitor_conversion_rate: f64,
  pub page_breakdown:          BTreeMap<String, u64>,
  /// Distinct names attached to conversions, sorted.
  pub registrant_names:        Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Winner {
  pub variant:                  Variant,
  pub runner_up:                Variant,
  pub margin_percentage_points: f64,
  /// False means the lead is provisional.
  pub sample_size_adequate:     bool,
  pub registrations:            u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantReport {
  /// One entry per recognised variant, in variant order. Variants without
  /// any data are present with zero counts.
  pub variants:               Vec<VariantStats>,
  /// `None` unless at least two variants have data and one leads strictly.
  pub winner:                 Option<Winner>,
  /// Whether visits carrying an email were counted as conversions. Reports
  /// built with and without it are not comparable.
  pub count_visit_with_email: bool,
  pub min_sample:             u64,
}

impl VariantReport {
  pub fn get(&self, variant: Variant) -> Option<&VariantStats> {
    self.variants.iter().find(|s| s.variant == variant)
  }
}

#[derive(Default)]
struct Tally<'a> {
  seen:          bool,
  visits:        u64,
  registrations: u64,
  visitors:      HashSet<&'a str>,
  registrants:   HashSet<&'a str>,
  pages:         BTreeMap<String, u64>,
  names:         BTreeSet<&'a str>,
}

impl Tally<'_> {
  /// Unrounded conversion rate, used for ranking.
  fn rate(&self) -> f64 { ratio(self.registrations, self.visits) }

  fn into_stats(self, variant: Variant) -> VariantStats {
    let unique_visitors = self.visitors.len() as u64;
    let unique_registrants = self.registrants.len() as u64;
    VariantStats {
      variant,
      total_visits: self.visits,
      registrations: self.registrations,
      unique_visitors,
      unique_registrants,
      conversion_rate: percentage(self.registrations, self.visits),
      visitor_conversion_rate: percentage(unique_registrants, unique_visitors),
      page_breakdown: self.pages,
      registrant_names: self.names.into_iter().map(str::to_owned).collect(),
    }
  }
}

/// `n / d` as a percentage rounded to one decimal; zero when `d` is zero.
pub fn percentage(n: u64, d: u64) -> f64 { round1(ratio(n, d)) }

fn ratio(n: u64, d: u64) -> f64 {
  if d == 0 {
    return 0.0;
  }
  n as f64 * 100.0 / d as f64
}

fn round1(value: f64) -> f64 { (value * 10.0).round() / 10.0 }

/// Folds `events` into per-variant conversion statistics.
pub fn aggregate<'a>(
  events: impl IntoIterator<Item = &'a Event>,
  options: &AggregateOptions,
) -> VariantReport {
  let mut tallies: BTreeMap<Variant, Tally<'a>> =
    Variant::iter().map(|v| (v, Tally::default())).collect();

  for event in events {
    let details = &event.details;
    let Some(variant) = details.variant.as_deref().and_then(Variant::from_tag) else {
      continue;
    };
    let Some(tally) = tallies.get_mut(&variant) else { continue };
    tally.seen = true;

    let visitor = details.visitor_id.as_deref().filter(|v| !v.is_empty());
    let is_visit = event.kind.is_visit();

    if is_visit {
      tally.visits += 1;
      if let Some(visitor) = visitor {
        tally.visitors.insert(visitor);
      }
      let page = details.page.as_deref().unwrap_or(UNKNOWN_PAGE);
      *tally.pages.entry(page.to_owned()).or_default() += 1;
    }

    let has_email = details.email.as_deref().is_some_and(|e| !e.is_empty());
    let converted = event.kind == EventKind::Registration
      || (options.count_visit_with_email && is_visit && has_email);
    if converted {
      tally.registrations += 1;
      if let Some(visitor) = visitor {
        tally.registrants.insert(visitor);
      }
      if let Some(name) = details.name.as_deref().filter(|n| !n.is_empty()) {
        tally.names.insert(name);
      }
    }
  }

  let observed = tallies.values().filter(|t| t.seen).count();
  let rates: Vec<(Variant, f64)> = tallies.iter().map(|(v, t)| (*v, t.rate())).collect();
  let variants: Vec<VariantStats> =
    tallies.into_iter().map(|(v, t)| t.into_stats(v)).collect();

  let winner = if observed >= 2 { pick_winner(rates, &variants, options) } else { None };

  VariantReport {
    variants,
    winner,
    count_visit_with_email: options.count_visit_with_email,
    min_sample: options.min_sample,
  }
}

fn pick_winner(
  mut rates: Vec<(Variant, f64)>,
  variants: &[VariantStats],
  options: &AggregateOptions,
) -> Option<Winner> {
  rates.sort_by(|a, b| b.1.total_cmp(&a.1));
  let (&(best, best_rate), &(second, second_rate)) = (rates.first()?, rates.get(1)?);

  if best_rate <= second_rate {
    return None;
  }
  let registrations = variants.iter().find(|s| s.variant == best)?.registrations;

  Some(Winner {
    variant:                  best,
    runner_up:                second,
    margin_percentage_points: round1(best_rate - second_rate),
    sample_size_adequate:     registrations >= options.min_sample,
    registrations,
  })
}
