//! Backup snapshot files.
//!
//! Two families of files live in a backup directory:
//!
//! - `registrations-YYYY-MM-DD.json`: a per-day log that the landing page
//!   appends every submitted sign-up to, whether or not it reached the store.
//! - `analytics_<stamp>.json` / `registrations_<stamp>.json`: full store
//!   exports, with `*_latest.json` always holding the most recent one.
//!
//! Every file is a single JSON array. Loading is tolerant: an unreadable
//! file or an unparseable record is logged, reported and skipped.

mod error;
mod snapshot;

pub use error::{Error, Result};
pub use snapshot::{
  DAILY_PREFIX, ExportPaths, Loaded, SkippedFile, SnapshotKind, VISITS_PREFIX, append_daily,
  daily_path, date_of, files_with_prefix, load_files, read_snapshot, write_export,
};
