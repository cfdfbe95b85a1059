//! Deduplicating merge of overlapping registration sources.
//!
//! Daily JSON snapshots, store exports and remote exports frequently contain
//! the same sign-ups. They are reconciled with the identity the store itself
//! enforces: `(email, timestamp)`. Records without an email are dropped.
//!
//! Which copy survives a collision is an explicit [`Precedence`]; the output
//! order is always newest first regardless of input order.

use std::collections::{HashMap, hash_map::Entry};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::wire;

/// The identity used for deduplication.
pub trait DedupKey {
  fn email(&self) -> Option<&str>;
  fn timestamp(&self) -> Option<DateTime<Utc>>;
}

/// Which record wins when two sources carry the same identity.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Precedence {
  /// Keep the record from the earliest batch; put the most trusted source
  /// first.
  #[default]
  First,
  /// Later batches overwrite earlier ones; put the most trusted source last.
  Last,
}

/// Result of [`merge`].
#[derive(Debug, Clone)]
pub struct Merged<T> {
  /// Unique records, newest first. Records without a timestamp sort last.
  pub records:       Vec<T>,
  /// Records dropped because they had no (or a blank) email.
  pub missing_email: usize,
  /// Records dropped (or overwritten) as duplicates.
  pub duplicates:    usize,
}

/// Flatten `batches` in order and keep one record per `(email, timestamp)`.
pub fn merge<T, I>(batches: I, precedence: Precedence) -> Merged<T>
where
  T: DedupKey,
  I: IntoIterator<Item = Vec<T>>,
{
  let mut records: Vec<T> = Vec::new();
  let mut seen: HashMap<(String, Option<DateTime<Utc>>), usize> = HashMap::new();
  let mut missing_email = 0;
  let mut duplicates = 0;

  for record in batches.into_iter().flatten() {
    let Some(email) = wire::non_blank(record.email()) else {
      missing_email += 1;
      continue;
    };
    let key = (email.to_owned(), record.timestamp().map(wire::truncate));

    match seen.entry(key) {
      Entry::Occupied(slot) => {
        duplicates += 1;
        if precedence == Precedence::Last {
          records[*slot.get()] = record;
        }
      }
      Entry::Vacant(slot) => {
        slot.insert(records.len());
        records.push(record);
      }
    }
  }

  // Stable, so equal timestamps keep their first-seen order.
  records.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));

  Merged { records, missing_email, duplicates }
}
