//! `server`: the landing-page backend.
//!
//! Settings come from `--config` (default `config.toml`) layered under
//! `FUNNEL_*` environment variables. See `config.example.toml`.
//!
//! `admin_password_hash` takes an argon2 PHC string; print one with:
//!
//! ```
//! cargo run -p funnel-server --bin server -- --hash-password
//! ```

use std::{
  net::SocketAddr,
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use clap::Parser;
use funnel_api::{ApiState, auth::hash_password};
use funnel_server::{Collaborators, backup, crm, geo::GeoLocator};
use funnel_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Landing page funnel server")]
struct Cli {
  /// TOML settings file; missing is fine, env vars still apply.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Hash a password read from stdin for `admin_password_hash`, then exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_password {
    let password = read_password()?;
    let hash = hash_password(&password).map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?;
    println!("{hash}");
    return Ok(());
  }

  let server_cfg = funnel_server::load_config(&cli.config).context("failed to load configuration")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let backup_dir = expand_tilde(&server_cfg.backup_dir);

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  let mut api = ApiState::new(Arc::clone(&store));
  if let Some(auth) = server_cfg.auth() {
    api = api.with_auth(auth);
  }

  let crm = match server_cfg.crm.clone() {
    Some(crm_cfg) => {
      let client = Arc::new(crm::CrmClient::new(crm_cfg).context("failed to build CRM client")?);
      let (contacts, _worker) = crm::spawn_sync_worker(Arc::clone(&client));
      api = api.with_contacts(contacts);
      Some(client)
    }
    None => {
      tracing::warn!("no [crm] section configured; contacts will not be synced");
      None
    }
  };

  let geo = GeoLocator::new(server_cfg.geolocation_url.clone())
    .context("failed to build geolocation client")?;

  if server_cfg.auto_backup_secs > 0 {
    let every = Duration::from_secs(server_cfg.auto_backup_secs);
    backup::spawn_auto_backup(Arc::clone(&store), backup_dir.clone(), every);
    tracing::info!(dir = %backup_dir.display(), every = ?every, "auto-backup enabled");
  }

  let collaborators = Collaborators {
    crm,
    geo: Arc::new(geo),
    backup_dir: Arc::new(backup_dir),
  };

  let app = funnel_server::app(api, collaborators);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!(%address, "funnel server listening");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
    .await
    .context("server error")?;

  Ok(())
}

fn read_password() -> anyhow::Result<String> {
  use std::io::{BufRead as _, Write as _};
  eprint!("Admin password: ");
  std::io::stderr().flush()?;
  let line = std::io::stdin()
    .lock()
    .lines()
    .next()
    .transpose()?
    .unwrap_or_default();
  anyhow::ensure!(!line.is_empty(), "empty password");
  Ok(line)
}

/// `~/x` → `$HOME/x`; anything else is returned as is.
fn expand_tilde(path: &Path) -> PathBuf {
  match (path.strip_prefix("~"), std::env::var_os("HOME")) {
    (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
    _ => path.to_path_buf(),
  }
}
