//! `funnel migrate`: fold backup files (and optionally a remote server) into
//! the store.
//!
//! Sources are merged in a fixed order: the daily `registrations-*.json`
//! files oldest first, then an explicit export file, then the remote server.
//! With [`Precedence::First`] the earliest source wins a collision.

use std::path::Path;

use anyhow::Result;
use funnel_backup::{DAILY_PREFIX, Loaded, SkippedFile, files_with_prefix, load_files};
use funnel_core::{
  merge::{Precedence, merge},
  registration::NewRegistration,
  store::{FunnelStore, Insertion},
};
use tracing::warn;

/// Load the daily backups in `dir` plus `export`, if given.
pub fn collect(dir: &Path, export: Option<&Path>) -> Result<Loaded<NewRegistration>> {
  let mut files = files_with_prefix(dir, DAILY_PREFIX)?;
  if let Some(export) = export {
    files.push(export.to_path_buf());
  }
  Ok(load_files(&files))
}

#[derive(Debug, Default)]
pub struct MigrateSummary {
  pub files:           usize,
  pub skipped_files:   Vec<SkippedFile>,
  pub skipped_records: usize,
  pub missing_email:   usize,
  /// Collisions between sources.
  pub duplicates:      usize,
  /// Records without a timestamp.
  pub invalid:         usize,
  pub created:         usize,
  /// Records the store already had.
  pub already_stored:  usize,
}

/// Deduplicate `loaded` and append every surviving record to `store`.
pub async fn import<S: FunnelStore>(
  store: &S,
  loaded: Loaded<NewRegistration>,
  precedence: Precedence,
) -> Result<MigrateSummary> {
  let mut summary = MigrateSummary {
    files: loaded.files.len(),
    skipped_records: loaded.skipped_records,
    ..Default::default()
  };
  summary.skipped_files = loaded.skipped_files;

  let merged = merge(loaded.batches, precedence);
  summary.missing_email = merged.missing_email;
  summary.duplicates = merged.duplicates;

  for record in merged.records {
    if let Err(e) = record.validate() {
      warn!(error = %e, email = record.email.as_deref().unwrap_or_default(), "skipping registration");
      summary.invalid += 1;
      continue;
    }
    match store.append_registration(record).await? {
      Insertion::Created(_) => summary.created += 1,
      Insertion::Duplicate => summary.already_stored += 1,
    }
  }

  Ok(summary)
}

impl MigrateSummary {
  pub fn render(&self) -> String {
    let mut out = format!(
      "Files read:          {}\n\
       Created:             {}\n\
       Already stored:      {}\n\
       Duplicates merged:   {}\n\
       Missing email:       {}\n\
       Missing timestamp:   {}\n\
       Undecodable records: {}\n\
       Skipped files:       {}",
      self.files,
      self.created,
      self.already_stored,
      self.duplicates,
      self.missing_email,
      self.invalid,
      self.skipped_records,
      self.skipped_files.len(),
    );
    for skipped in &self.skipped_files {
      out.push_str(&format!("\n  {}: {}", skipped.path.display(), skipped.reason));
    }
    out
  }
}

#[cfg(test)]
mod tests {
  use std::fs;

  use chrono::{TimeZone, Utc};
  use funnel_store_sqlite::SqliteStore;

  use super::*;

  fn write(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
  }

  #[tokio::test]
  async fn merges_daily_files_and_export() {
    let dir = tempfile::tempdir().unwrap();
    write(
      dir.path(),
      "registrations-2024-11-20.json",
      r#"[
        {"email":"a@x.com","firstName":"Ana","timestamp":"2024-11-20T10:00:00Z"},
        {"emailAddress":"b@x.com","first_name":"Bo","timestamp":"2024-11-20T11:00:00Z"},
        {"firstName":"NoEmail","timestamp":"2024-11-20T12:00:00Z"}
      ]"#,
    );
    write(dir.path(), "registrations-2024-11-21.json", "{not json");
    let export = write(
      dir.path(),
      "registrations_latest.json",
      r#"[
        {"id":7,"email":"a@x.com","firstName":"Ana Export","timestamp":"2024-11-20T10:00:00Z"},
        {"id":8,"email":"c@x.com","timestamp":"2024-11-22T09:00:00Z"},
        {"email":"d@x.com"}
      ]"#,
    );

    let loaded = collect(dir.path(), Some(&export)).unwrap();
    let store = SqliteStore::open_in_memory().await.unwrap();
    let summary = import(&store, loaded, Precedence::First).await.unwrap();

    assert_eq!(summary.files, 2);
    assert_eq!(summary.skipped_files.len(), 1);
    assert_eq!(summary.missing_email, 1);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.invalid, 1);
    assert_eq!(summary.created, 3);

    let stored = store.list_registrations(None).await.unwrap();
    let emails: Vec<_> = stored.iter().map(|r| r.email.as_str()).collect();
    assert_eq!(emails, ["c@x.com", "b@x.com", "a@x.com"]);
    let ana = stored.iter().find(|r| r.email == "a@x.com").unwrap();
    assert_eq!(ana.details.first_name.as_deref(), Some("Ana"));
    assert_eq!(ana.timestamp, Utc.with_ymd_and_hms(2024, 11, 20, 10, 0, 0).unwrap());
  }

  #[tokio::test]
  async fn last_precedence_prefers_later_source() {
    let dir = tempfile::tempdir().unwrap();
    write(
      dir.path(),
      "registrations-2024-11-20.json",
      r#"[{"email":"a@x.com","firstName":"Daily","timestamp":"2024-11-20T10:00:00Z"}]"#,
    );
    let export = write(
      dir.path(),
      "export.json",
      r#"[{"email":"a@x.com","firstName":"Export","timestamp":"2024-11-20T10:00:00Z"}]"#,
    );

    let loaded = collect(dir.path(), Some(&export)).unwrap();
    let store = SqliteStore::open_in_memory().await.unwrap();
    import(&store, loaded, Precedence::Last).await.unwrap();

    let stored = store.list_registrations(None).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].details.first_name.as_deref(), Some("Export"));
  }

  #[tokio::test]
  async fn second_run_only_reports_existing_rows() {
    let dir = tempfile::tempdir().unwrap();
    write(
      dir.path(),
      "registrations-2024-11-20.json",
      r#"[{"email":"a@x.com","timestamp":"2024-11-20T10:00:00Z"}]"#,
    );
    let store = SqliteStore::open_in_memory().await.unwrap();

    import(&store, collect(dir.path(), None).unwrap(), Precedence::First).await.unwrap();
    let again =
      import(&store, collect(dir.path(), None).unwrap(), Precedence::First).await.unwrap();

    assert_eq!(again.created, 0);
    assert_eq!(again.already_stored, 1);
  }

  #[test]
  fn missing_backup_dir_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let loaded = collect(&dir.path().join("nope"), None).unwrap();
    assert!(loaded.is_empty());
    assert!(loaded.skipped_files.is_empty());
  }
}
