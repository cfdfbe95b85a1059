//! `funnel backup` and `funnel restore`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use funnel_backup::{ExportPaths, SnapshotKind, read_snapshot, write_export};
use funnel_core::{
  event::Event,
  registration::Registration,
  store::{EventQuery, FunnelStore},
};

#[derive(Debug)]
pub struct BackupSummary {
  pub paths:         ExportPaths,
  pub events:        usize,
  pub registrations: usize,
}

/// Export the whole store to `dir`.
pub async fn backup<S: FunnelStore>(store: &S, dir: &Path) -> Result<BackupSummary> {
  let events = store.list_events(EventQuery::default()).await?;
  let registrations = store.list_registrations(None).await?;

  let paths = write_export(dir, &events, &registrations, Utc::now())
    .with_context(|| format!("writing export to {}", dir.display()))?;

  Ok(BackupSummary { paths, events: events.len(), registrations: registrations.len() })
}

impl BackupSummary {
  pub fn render(&self) -> String {
    format!(
      "Events:        {:>6} → {}\nRegistrations: {:>6} → {}",
      self.events,
      self.paths.events.display(),
      self.registrations,
      self.paths.registrations.display(),
    )
  }
}

#[derive(Debug)]
pub struct RestoreSummary {
  pub path:     PathBuf,
  pub kind:     SnapshotKind,
  pub read:     usize,
  pub inserted: u64,
}

/// Insert the records of an export, skipping those already stored.
///
/// Without `file`, the latest events export in `dir` is used. The file name
/// decides whether it holds events or registrations.
pub async fn restore<S: FunnelStore>(
  store: &S,
  dir: &Path,
  file: Option<PathBuf>,
) -> Result<RestoreSummary> {
  let path = file.unwrap_or_else(|| SnapshotKind::Events.latest_path(dir));
  let kind = SnapshotKind::of(&path);

  let (read, inserted) = match kind {
    SnapshotKind::Events => {
      let events: Vec<Event> =
        read_snapshot(&path).with_context(|| format!("reading {}", path.display()))?;
      (events.len(), store.restore_events(events).await?)
    }
    SnapshotKind::Registrations => {
      let registrations: Vec<Registration> =
        read_snapshot(&path).with_context(|| format!("reading {}", path.display()))?;
      (registrations.len(), store.restore_registrations(registrations).await?)
    }
  };

  Ok(RestoreSummary { path, kind, read, inserted })
}

impl RestoreSummary {
  pub fn render(&self) -> String {
    let what = match self.kind {
      SnapshotKind::Events => "events",
      SnapshotKind::Registrations => "registrations",
    };
    format!(
      "Restored {} of {} {what} from {} ({} already present)",
      self.inserted,
      self.read,
      self.path.display(),
      self.read as u64 - self.inserted,
    )
  }
}
