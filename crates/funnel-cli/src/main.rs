//! `funnel`: operational commands for the landing-page funnel store.
//!
//! # Usage
//!
//! ```
//! funnel --db funnel.db backup
//! funnel migrate --export old/registrations_latest.json --precedence last
//! funnel ab-test --strict --include-registrations
//! funnel --config ~/.config/funnel/cli.toml today
//! ```

mod client;
mod commands;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use commands::{backup, migrate, reports};
use funnel_core::{merge::Precedence, store::FunnelStore as _, variant::DEFAULT_MIN_SAMPLE};
use funnel_store_sqlite::SqliteStore;
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "funnel", about = "Operational commands for the landing-page funnel")]
struct Args {
  /// Path to a TOML config file (db, backup_dir, remote_url, username, password).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// SQLite database (default: funnel.db).
  #[arg(long, env = "FUNNEL_DB", global = true)]
  db: Option<PathBuf>,

  /// Directory holding backup files (default: backups).
  #[arg(long, env = "FUNNEL_BACKUP_DIR", global = true)]
  backup_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Export events and registrations to timestamped and latest JSON files.
  Backup,

  /// Re-insert an export, skipping rows that already exist.
  Restore {
    /// Export to restore (default: analytics_latest.json in the backup dir).
    file: Option<PathBuf>,
  },

  /// Merge daily backups and other sources into the store.
  Migrate {
    /// An additional registrations export to merge.
    #[arg(long, value_name = "FILE")]
    export: Option<PathBuf>,

    /// Base URL of a running server whose registrations are merged too.
    #[arg(long, value_name = "URL")]
    remote: Option<String>,

    /// Which source wins when two carry the same registration.
    #[arg(long, default_value_t = Precedence::First)]
    precedence: Precedence,
  },

  /// Conversion rates per hook variant.
  AbTest {
    /// Read `visits-*.json` files from this directory instead of the store.
    #[arg(long, value_name = "DIR")]
    from_dir: Option<PathBuf>,

    /// Only explicit registration events count as conversions.
    #[arg(long)]
    strict: bool,

    /// Count stored registrations as conversions.
    #[arg(long)]
    include_registrations: bool,

    /// Registrations the leader needs before the result is trusted.
    #[arg(long, default_value_t = DEFAULT_MIN_SAMPLE)]
    min_sample: u64,

    #[arg(long)]
    json: bool,
  },

  /// Referral stats for one referrer, or for everyone.
  Referrals {
    id: Option<i64>,

    #[arg(long)]
    json: bool,
  },

  /// List registrations.
  Registrations {
    /// Read the daily backup files instead of the store.
    #[arg(long)]
    from_backups: bool,
  },

  /// Today's registrations with recent totals.
  Today {
    #[arg(long)]
    json: bool,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  db:         String,
  #[serde(default)]
  backup_dir: String,
  #[serde(default)]
  remote_url: String,
  #[serde(default)]
  username:   String,
  #[serde(default)]
  password:   String,
}

fn non_empty(s: &str) -> Option<String> { (!s.is_empty()).then(|| s.to_owned()) }

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let db = args
    .db
    .or_else(|| non_empty(&file_cfg.db).map(PathBuf::from))
    .unwrap_or_else(|| PathBuf::from("funnel.db"));
  let backup_dir = args
    .backup_dir
    .or_else(|| non_empty(&file_cfg.backup_dir).map(PathBuf::from))
    .unwrap_or_else(|| PathBuf::from("backups"));

  match args.command {
    Command::Backup => {
      let store = open(&db).await?;
      println!("{}", backup::backup(&store, &backup_dir).await?.render());
    }

    Command::Restore { file } => {
      let store = open(&db).await?;
      println!("{}", backup::restore(&store, &backup_dir, file).await?.render());
    }

    Command::Migrate { export, remote, precedence } => {
      let mut loaded = migrate::collect(&backup_dir, export.as_deref())?;

      if let Some(base_url) = remote.or_else(|| non_empty(&file_cfg.remote_url)) {
        let client = ApiClient::new(ApiConfig {
          base_url,
          username: file_cfg.username.clone(),
          password: file_cfg.password.clone(),
        })?;
        let remote = client.list_registrations().await?;
        println!("Fetched {} registrations from the remote server", remote.len());
        loaded.batches.push(remote);
      }

      let store = open(&db).await?;
      println!("{}", migrate::import(&store, loaded, precedence).await?.render());
    }

    Command::AbTest { from_dir, strict, include_registrations, min_sample, json } => {
      let events = match from_dir {
        Some(dir) => reports::visit_files(&dir)?,
        None => reports::store_events(&open(&db).await?, include_registrations).await?,
      };
      let report = reports::ab_report(&events, strict, min_sample);
      emit(&report, json, reports::render_ab_report)?;
    }

    Command::Referrals { id, json } => {
      let report = reports::referrals(&open(&db).await?, id).await?;
      emit(&report, json, reports::ReferralReport::render)?;
    }

    Command::Registrations { from_backups } => {
      if from_backups {
        println!("{}", reports::backup_registrations(&backup_dir)?.render());
      } else {
        let store = open(&db).await?;
        let registrations = store.list_registrations(None).await?;
        println!("{}", reports::render_registrations(&registrations));
      }
    }

    Command::Today { json } => {
      let report = reports::today(&open(&db).await?, Utc::now().date_naive()).await?;
      emit(&report, json, reports::render_daily)?;
    }
  }

  Ok(())
}

async fn open(db: &Path) -> Result<SqliteStore> {
  SqliteStore::open(db)
    .await
    .with_context(|| format!("failed to open store at {}", db.display()))
}

fn emit<T: Serialize>(value: &T, json: bool, render: impl Fn(&T) -> String) -> Result<()> {
  if json {
    println!("{}", serde_json::to_string_pretty(value)?);
  } else {
    println!("{}", render(value));
  }
  Ok(())
}
