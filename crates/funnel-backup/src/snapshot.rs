//! Naming, writing and tolerant reading of backup files.

use std::{
  fs,
  io::{self, Write as _},
  path::{Path, PathBuf},
  sync::{Mutex, PoisonError},
};

use chrono::{DateTime, NaiveDate, Utc};
use funnel_core::{event::Event, registration::Registration};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::{Error, Result};

/// File name prefix of the per-day sign-up log.
pub const DAILY_PREFIX: &str = "registrations-";
/// File name prefix of per-day tracked-event logs.
pub const VISITS_PREFIX: &str = "visits-";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Held across the read-modify-write of a daily log.
static DAILY_LOG: Mutex<()> = Mutex::new(());
const EXPORT_STAMP: &str = "%Y-%m-%d_%H-%M-%S";

// ─── Naming ──────────────────────────────────────────────────────────────────

/// What a store export contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
  Events,
  Registrations,
}

impl SnapshotKind {
  /// Exports whose file name mentions `analytics` hold events; anything
  /// else is treated as registrations.
  pub fn of(path: &Path) -> Self {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if name.contains("analytics") { Self::Events } else { Self::Registrations }
  }

  fn prefix(self) -> &'static str {
    match self {
      Self::Events => "analytics",
      Self::Registrations => "registrations",
    }
  }

  pub fn latest_path(self, dir: &Path) -> PathBuf {
    dir.join(format!("{}_latest.json", self.prefix()))
  }

  fn stamped_path(self, dir: &Path, at: DateTime<Utc>) -> PathBuf {
    dir.join(format!("{}_{}.json", self.prefix(), at.format(EXPORT_STAMP)))
  }
}

pub fn daily_path(dir: &Path, date: NaiveDate) -> PathBuf {
  dir.join(format!("{DAILY_PREFIX}{}.json", date.format(DATE_FORMAT)))
}

/// The date in a `registrations-YYYY-MM-DD.json` or `visits-YYYY-MM-DD.json`
/// file name.
pub fn date_of(path: &Path) -> Option<NaiveDate> {
  let stem = path.file_stem()?.to_str()?;
  let date = stem
    .strip_prefix(DAILY_PREFIX)
    .or_else(|| stem.strip_prefix(VISITS_PREFIX))?;
  NaiveDate::parse_from_str(date, DATE_FORMAT).ok()
}

/// `*.json` files in `dir` whose name starts with `prefix`, sorted by name.
/// A missing directory has no files.
pub fn files_with_prefix(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
  let entries = match fs::read_dir(dir) {
    Ok(entries) => entries,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
    Err(e) => return Err(Error::io(dir, e)),
  };

  let mut files = Vec::new();
  for entry in entries {
    let path = entry.map_err(|e| Error::io(dir, e))?.path();
    let matches = path
      .file_name()
      .and_then(|n| n.to_str())
      .is_some_and(|n| n.starts_with(prefix) && n.ends_with(".json"));
    if matches && path.is_file() {
      files.push(path);
    }
  }
  files.sort();
  Ok(files)
}

// ─── Writing ─────────────────────────────────────────────────────────────────

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
  let parent = path.parent().unwrap_or_else(|| Path::new("."));
  fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;

  let mut tmp = NamedTempFile::new_in(parent).map_err(|e| Error::io(parent, e))?;
  serde_json::to_writer_pretty(&mut tmp, value).map_err(|e| Error::json(path, e))?;
  tmp.flush().map_err(|e| Error::io(path, e))?;
  tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
  Ok(())
}

/// Appends `record` to the sign-up log for `date` and returns the log's path.
///
/// A log that exists but does not hold a JSON array is moved aside to
/// `*.json.corrupt` and a new log is started.
///
/// Appends within one process are serialized, so concurrent callers never
/// overwrite each other's records.
pub fn append_daily(dir: &Path, date: NaiveDate, record: Value) -> Result<PathBuf> {
  let path = daily_path(dir, date);
  let _guard = DAILY_LOG.lock().unwrap_or_else(PoisonError::into_inner);

  let mut records: Vec<Value> = match fs::read(&path) {
    Ok(bytes) => match serde_json::from_slice(&bytes) {
      Ok(records) => records,
      Err(e) => {
        let aside = path.with_extension("json.corrupt");
        warn!(error = %e, path = %path.display(), aside = %aside.display(), "daily backup is malformed; starting a new one");
        fs::rename(&path, &aside).map_err(|e| Error::io(&path, e))?;
        Vec::new()
      }
    },
    Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
    Err(e) => return Err(Error::io(&path, e)),
  };

  records.push(record);
  write_json(&path, &records)?;
  debug!(path = %path.display(), records = records.len(), "appended daily backup");
  Ok(path)
}

/// Files written by [`write_export`].
#[derive(Debug, Clone)]
pub struct ExportPaths {
  pub events:        PathBuf,
  pub registrations: PathBuf,
}

/// Writes a full store export stamped with `at`, and refreshes the
/// `*_latest.json` copies.
pub fn write_export(
  dir: &Path,
  events: &[Event],
  registrations: &[Registration],
  at: DateTime<Utc>,
) -> Result<ExportPaths> {
  let paths = ExportPaths {
    events:        SnapshotKind::Events.stamped_path(dir, at),
    registrations: SnapshotKind::Registrations.stamped_path(dir, at),
  };

  write_json(&paths.events, events)?;
  write_json(&paths.registrations, registrations)?;
  write_json(&SnapshotKind::Events.latest_path(dir), events)?;
  write_json(&SnapshotKind::Registrations.latest_path(dir), registrations)?;

  Ok(paths)
}

// ─── Reading ─────────────────────────────────────────────────────────────────

/// Reads a whole snapshot. Any unparseable record fails the read.
pub fn read_snapshot<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
  let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
  serde_json::from_slice(&bytes).map_err(|e| Error::json(path, e))
}

#[derive(Debug, Clone)]
pub struct SkippedFile {
  pub path:   PathBuf,
  pub reason: String,
}

/// Records loaded by [`load_files`], one batch per readable file, in the
/// order the files were given.
#[derive(Debug)]
pub struct Loaded<T> {
  pub batches:         Vec<Vec<T>>,
  pub files:           Vec<PathBuf>,
  pub skipped_files:   Vec<SkippedFile>,
  pub skipped_records: usize,
}

impl<T> Default for Loaded<T> {
  fn default() -> Self {
    Self {
      batches:         Vec::new(),
      files:           Vec::new(),
      skipped_files:   Vec::new(),
      skipped_records: 0,
    }
  }
}

impl<T> Loaded<T> {
  pub fn len(&self) -> usize { self.batches.iter().map(Vec::len).sum() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  pub fn into_records(self) -> impl Iterator<Item = T> { self.batches.into_iter().flatten() }
}

/// Loads each file as one batch. Files that cannot be read or are not a
/// JSON array are skipped, as are individual records that do not decode.
pub fn load_files<T: DeserializeOwned>(paths: &[PathBuf]) -> Loaded<T> {
  let mut loaded = Loaded::default();

  for path in paths {
    let values: Vec<Value> = match read_snapshot(path) {
      Ok(values) => values,
      Err(e) => {
        warn!(error = %e, path = %path.display(), "skipping backup file");
        loaded.skipped_files.push(SkippedFile { path: path.clone(), reason: e.to_string() });
        continue;
      }
    };

    let mut batch = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
      match serde_json::from_value(value) {
        Ok(record) => batch.push(record),
        Err(e) => {
          warn!(error = %e, path = %path.display(), index, "skipping backup record");
          loaded.skipped_records += 1;
        }
      }
    }
    loaded.batches.push(batch);
    loaded.files.push(path.clone());
  }

  loaded
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use funnel_core::registration::NewRegistration;
  use serde_json::json;

  use super::*;

  fn day() -> NaiveDate { NaiveDate::from_ymd_opt(2025, 11, 24).unwrap() }

  #[test]
  fn daily_log_appends() {
    let dir = tempfile::tempdir().unwrap();
    append_daily(dir.path(), day(), json!({"email": "a@example.com"})).unwrap();
    let path = append_daily(dir.path(), day(), json!({"email": "b@example.com"})).unwrap();

    assert_eq!(path.file_name().unwrap(), "registrations-2025-11-24.json");
    let records: Vec<Value> = read_snapshot(&path).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1]["email"], "b@example.com");
  }

  #[test]
  fn concurrent_appends_keep_every_record() {
    let dir = tempfile::tempdir().unwrap();
    std::thread::scope(|s| {
      for i in 0..32 {
        let dir = dir.path();
        s.spawn(move || append_daily(dir, day(), json!({"email": format!("u{i}@x.com")})).unwrap());
      }
    });

    let records: Vec<Value> = read_snapshot(&daily_path(dir.path(), day())).unwrap();
    assert_eq!(records.len(), 32);
    let emails: std::collections::HashSet<_> =
      records.iter().filter_map(|r| r["email"].as_str()).collect();
    assert_eq!(emails.len(), 32);
  }

  #[test]
  fn corrupt_daily_log_is_moved_aside() {
    let dir = tempfile::tempdir().unwrap();
    let path = daily_path(dir.path(), day());
    fs::write(&path, "{not json").unwrap();

    append_daily(dir.path(), day(), json!({"email": "a@example.com"})).unwrap();
    assert_eq!(read_snapshot::<Value>(&path).unwrap().len(), 1);
    assert!(path.with_extension("json.corrupt").exists());
  }

  #[test]
  fn export_writes_stamped_and_latest_files() {
    let dir = tempfile::tempdir().unwrap();
    let at = Utc.with_ymd_and_hms(2025, 11, 24, 10, 5, 9).unwrap();
    let paths = write_export(dir.path(), &[], &[], at).unwrap();

    assert_eq!(paths.events.file_name().unwrap(), "analytics_2025-11-24_10-05-09.json");
    assert_eq!(paths.registrations.file_name().unwrap(), "registrations_2025-11-24_10-05-09.json");
    assert!(SnapshotKind::Events.latest_path(dir.path()).exists());
    assert!(SnapshotKind::Registrations.latest_path(dir.path()).exists());
  }

  #[test]
  fn kind_is_chosen_by_file_name() {
    assert_eq!(SnapshotKind::of(Path::new("b/analytics_latest.json")), SnapshotKind::Events);
    assert_eq!(SnapshotKind::of(Path::new("b/registrations_latest.json")), SnapshotKind::Registrations);
  }

  #[test]
  fn dates_come_from_file_names() {
    assert_eq!(date_of(Path::new("registrations-2025-11-24.json")), Some(day()));
    assert_eq!(date_of(Path::new("visits-2025-11-24.json")), Some(day()));
    assert_eq!(date_of(Path::new("registrations_latest.json")), None);
  }

  #[test]
  fn daily_files_exclude_exports() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["registrations-2025-11-24.json", "registrations-2025-11-23.json", "registrations_latest.json", "notes.txt"] {
      fs::write(dir.path().join(name), "[]").unwrap();
    }
    let files = files_with_prefix(dir.path(), DAILY_PREFIX).unwrap();
    let names: Vec<_> = files.iter().map(|p| p.file_name().unwrap().to_str().unwrap()).collect();
    assert_eq!(names, ["registrations-2025-11-23.json", "registrations-2025-11-24.json"]);
  }

  #[test]
  fn missing_directory_has_no_files() {
    let dir = tempfile::tempdir().unwrap();
    assert!(files_with_prefix(&dir.path().join("nope"), DAILY_PREFIX).unwrap().is_empty());
  }

  #[test]
  fn loading_skips_bad_files_and_records() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("registrations-2025-11-23.json");
    let bad = dir.path().join("registrations-2025-11-24.json");
    fs::write(&good, r#"[
      {"email": "a@example.com", "timestamp": "2025-11-23T10:00:00Z"},
      {"email": "b@example.com", "timestamp": "2025-11-23T11:00:00Z", "referredBy": "abc"}
    ]"#)
    .unwrap();
    fs::write(&bad, "not json").unwrap();
    let missing = dir.path().join("registrations-2025-11-25.json");

    let loaded: Loaded<NewRegistration> = load_files(&[good.clone(), bad.clone(), missing]);
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded.files, [good]);
    assert_eq!(loaded.skipped_files.len(), 2);
    assert_eq!(loaded.skipped_files[0].path, bad);
    assert_eq!(loaded.skipped_records, 1);
  }
}
