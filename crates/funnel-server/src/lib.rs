//! Funnel HTTP server.
//!
//! Wraps the [`funnel_api`] router with the endpoints that talk to the outside
//! world: the CRM upsert proxy, the geolocation proxy and the client-side
//! registration backup log.

pub mod backup;
pub mod crm;
pub mod error;
pub mod geo;

pub use error::Error;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::{
  Router,
  routing::{get, post},
};
use funnel_api::{ApiState, AuthConfig, api_router};
use funnel_core::store::FunnelStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crm::{CrmClient, CrmConfig};
use geo::GeoLocator;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and the
/// `FUNNEL_*` environment.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                String,
  pub port:                u16,
  pub store_path:          PathBuf,
  pub backup_dir:          PathBuf,
  /// Seconds between automatic exports. `0` disables them.
  pub auto_backup_secs:    u64,
  pub admin_username:      Option<String>,
  pub admin_password_hash: Option<String>,
  pub crm:                 Option<CrmConfig>,
  pub geolocation_url:     String,
}

impl ServerConfig {
  /// Admin credentials, if both halves are configured.
  pub fn auth(&self) -> Option<AuthConfig> {
    match (&self.admin_username, &self.admin_password_hash) {
      (Some(username), Some(password_hash)) => Some(AuthConfig {
        username:      username.clone(),
        password_hash: password_hash.clone(),
      }),
      (None, None) => None,
      _ => {
        warn!("admin_username and admin_password_hash must be set together; ignoring both");
        None
      }
    }
  }
}

/// Layer defaults, `path` (if it exists) and `FUNNEL_*` variables.
///
/// Nested keys use a double underscore, e.g. `FUNNEL_CRM__API_KEY`.
pub fn load_config(path: &Path) -> Result<ServerConfig, config::ConfigError> {
  config::Config::builder()
    .set_default("host", "127.0.0.1")?
    .set_default("port", 5001_i64)?
    .set_default("store_path", "funnel.db")?
    .set_default("backup_dir", "backups")?
    .set_default("auto_backup_secs", 0_i64)?
    .set_default("geolocation_url", geo::DEFAULT_URL)?
    .add_source(config::File::from(path).required(false))
    .add_source(
      config::Environment::with_prefix("FUNNEL")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("crm.registration_tag_ids")
        .with_list_parse_key("crm.waitlist_tag_ids"),
    )
    .build()?
    .try_deserialize()
}

// ─── Application state ────────────────────────────────────────────────────────

/// State for the collaborator endpoints.
#[derive(Clone)]
pub struct Collaborators {
  /// `None` makes the CRM proxy answer 503.
  pub crm:        Option<Arc<CrmClient>>,
  pub geo:        Arc<GeoLocator>,
  pub backup_dir: Arc<PathBuf>,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The public endpoints backed by external services or the backup directory.
pub fn collaborator_router(collaborators: Collaborators) -> Router<()> {
  Router::new()
    .route("/api/clickfunnels/contact", post(crm::proxy_contact))
    .route("/api/geolocation", get(geo::geolocation))
    .route("/api/backup/registration", post(backup::backup_registration))
    .with_state(collaborators)
}

/// The complete application: store API, collaborators and request tracing.
pub fn app<S>(api: ApiState<S>, collaborators: Collaborators) -> Router
where
  S: FunnelStore + 'static,
{
  Router::new()
    .merge(api_router(api))
    .merge(collaborator_router(collaborators))
    .layer(TraceLayer::new_for_http())
}
