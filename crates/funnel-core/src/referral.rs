//! Referral attribution.
//!
//! Everything here is a single-hop match on the `referred_by` attribute of
//! registrations and events. The referrer id is never checked for existence:
//! an unknown id simply yields zero counts.

use std::collections::{HashMap, hash_map::Entry};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{event::Event, registration::Registration, wire};

/// One sign-up credited to a referrer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralEntry {
  pub id:         i64,
  pub email:      String,
  pub first_name: Option<String>,
  pub last_name:  Option<String>,
  #[serde(with = "wire::timestamp")]
  pub timestamp:  DateTime<Utc>,
}

impl From<&Registration> for ReferralEntry {
  fn from(r: &Registration) -> Self {
    Self {
      id:         r.id,
      email:      r.email.clone(),
      first_name: r.details.first_name.clone(),
      last_name:  r.details.last_name.clone(),
      timestamp:  r.timestamp,
    }
  }
}

/// Statistics for a single referrer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralStats {
  pub referrer_id:     i64,
  pub total_referrals: u64,
  /// Events attributed to the referrer's link.
  pub total_visits:    u64,
  /// Newest first.
  pub referrals:       Vec<ReferralEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopReferrer {
  pub referrer_id:    i64,
  pub referral_count: u64,
}

/// Statistics across all referrers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalReferralStats {
  /// Registrations carrying any referral attribution.
  pub total_referrals: u64,
  /// Events carrying any referral attribution.
  pub total_visits:    u64,
  /// Every referrer with at least one referral, most referrals first. Ties
  /// keep the order in which the referrer was first seen.
  pub top_referrers:   Vec<TopReferrer>,
}

/// Statistics for the registration with id `referrer_id`.
pub fn stats_for(
  referrer_id: i64,
  registrations: &[Registration],
  events: &[Event],
) -> ReferralStats {
  let mut referrals: Vec<ReferralEntry> = registrations
    .iter()
    .filter(|r| r.details.referred_by == Some(referrer_id))
    .map(ReferralEntry::from)
    .collect();
  referrals.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

  let total_visits = events
    .iter()
    .filter(|e| e.details.referred_by == Some(referrer_id))
    .count() as u64;

  ReferralStats {
    referrer_id,
    total_referrals: referrals.len() as u64,
    total_visits,
    referrals,
  }
}

/// Totals and a ranking of every referrer.
pub fn global_stats(registrations: &[Registration], events: &[Event]) -> GlobalReferralStats {
  let mut top_referrers: Vec<TopReferrer> = Vec::new();
  let mut index: HashMap<i64, usize> = HashMap::new();

  for referrer_id in registrations.iter().filter_map(|r| r.details.referred_by) {
    match index.entry(referrer_id) {
      Entry::Occupied(slot) => top_referrers[*slot.get()].referral_count += 1,
      Entry::Vacant(slot) => {
        slot.insert(top_referrers.len());
        top_referrers.push(TopReferrer { referrer_id, referral_count: 1 });
      }
    }
  }

  let total_referrals = top_referrers.iter().map(|t| t.referral_count).sum();
  top_referrers.sort_by(|a, b| b.referral_count.cmp(&a.referral_count));

  let total_visits = events
    .iter()
    .filter(|e| e.details.referred_by.is_some())
    .count() as u64;

  GlobalReferralStats { total_referrals, total_visits, top_referrers }
}

/// `(referrer, referred)` pairs whose referrer still exists, ordered by
/// referrer id then referred id. Dangling attributions are skipped.
pub fn relationships(registrations: &[Registration]) -> Vec<(&Registration, &Registration)> {
  let by_id: HashMap<i64, &Registration> =
    registrations.iter().map(|r| (r.id, r)).collect();

  let mut pairs: Vec<(&Registration, &Registration)> = registrations
    .iter()
    .filter_map(|referred| {
      let referrer = by_id.get(&referred.details.referred_by?)?;
      Some((*referrer, referred))
    })
    .collect();
  pairs.sort_by_key(|(referrer, referred)| (referrer.id, referred.id));
  pairs
}
