//! The client-side registration backup log and periodic store exports.

use std::{path::Path, sync::Arc, time::Duration};

use axum::{Json, extract::State};
use chrono::Utc;
use funnel_backup::ExportPaths;
use funnel_core::{
  store::{EventQuery, FunnelStore},
  wire,
};
use serde_json::{Value, json};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{
  Collaborators,
  error::{Error, Result},
};

/// `POST /api/backup/registration`
///
/// Appends the raw submission to today's `registrations-YYYY-MM-DD.json`,
/// stamping it with the server time if it has no `timestamp`.
pub async fn backup_registration(
  State(collaborators): State<Collaborators>,
  Json(mut record): Json<Value>,
) -> Result<Json<Value>> {
  let Value::Object(fields) = &mut record else {
    return Err(Error::BadRequest("backup record must be a JSON object"));
  };
  let now = Utc::now();
  fields
    .entry("timestamp")
    .or_insert_with(|| Value::String(wire::format_timestamp(now)));

  let dir = Arc::clone(&collaborators.backup_dir);
  let path =
    tokio::task::spawn_blocking(move || funnel_backup::append_daily(&dir, now.date_naive(), record))
      .await??;
  debug!(path = %path.display(), "registration backed up");

  Ok(Json(json!({ "success": true, "message": "Registration backed up" })))
}

/// Export every event and registration in `store` to `dir`.
pub async fn export<S: FunnelStore>(store: &S, dir: &Path) -> Result<ExportPaths> {
  let events = store.list_events(EventQuery::default()).await.map_err(Error::store)?;
  let registrations = store.list_registrations(None).await.map_err(Error::store)?;

  let dir = dir.to_path_buf();
  let paths = tokio::task::spawn_blocking(move || {
    funnel_backup::write_export(&dir, &events, &registrations, Utc::now())
  })
  .await??;
  Ok(paths)
}

/// Export `store` every `every`, starting one period from now.
pub fn spawn_auto_backup<S>(store: Arc<S>, dir: std::path::PathBuf, every: Duration) -> JoinHandle<()>
where
  S: FunnelStore + 'static,
{
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
      ticker.tick().await;
      match export(store.as_ref(), &dir).await {
        Ok(paths) => info!(
          events = %paths.events.display(),
          registrations = %paths.registrations.display(),
          "auto-backup written"
        ),
        Err(e) => warn!(error = %e, dir = %dir.display(), "auto-backup failed"),
      }
    }
  })
}
