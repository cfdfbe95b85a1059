//! JSON REST API for the funnel.
//!
//! Exposes an axum [`Router`] backed by any [`funnel_core::store::FunnelStore`].
//! Public routes accept tracking data from the landing page; admin routes
//! require the [`auth::Admin`] extractor. TLS and the CRM/geolocation
//! proxies are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = Router::new().merge(funnel_api::api_router(state));
//! ```

pub mod auth;
pub mod error;
pub mod events;
pub mod maintenance;
pub mod params;
pub mod registrations;
pub mod reports;
pub mod settings;
pub mod waitlist;

use std::sync::Arc;

use axum::{
  Json, Router,
  routing::{get, post},
};
use funnel_core::{contact::ContactUpsert, store::FunnelStore};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub use auth::{Admin, AuthConfig};
pub use error::ApiError;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all API handlers.
pub struct ApiState<S> {
  pub store:    Arc<S>,
  /// `None` leaves the admin routes open.
  pub auth:     Option<Arc<AuthConfig>>,
  /// Receives a contact for every new registration and waiting-list entry.
  pub contacts: Option<mpsc::UnboundedSender<ContactUpsert>>,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      auth:     self.auth.clone(),
      contacts: self.contacts.clone(),
    }
  }
}

impl<S> ApiState<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store, auth: None, contacts: None } }

  pub fn with_auth(mut self, auth: AuthConfig) -> Self {
    self.auth = Some(Arc::new(auth));
    self
  }

  pub fn with_contacts(mut self, contacts: mpsc::UnboundedSender<ContactUpsert>) -> Self {
    self.contacts = Some(contacts);
    self
  }

  /// Queue a CRM sync. Never fails the caller.
  pub(crate) fn sync_contact(&self, contact: ContactUpsert) {
    let Some(tx) = &self.contacts else {
      debug!(email = %contact.email, "contact sync disabled");
      return;
    };
    if tx.send(contact).is_err() {
      warn!("contact sync worker has stopped; contact dropped");
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be merged into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: FunnelStore + 'static,
{
  if state.auth.is_none() {
    warn!("no admin credentials configured; admin routes are open");
  }

  Router::new()
    .route("/health", get(health))
    // Events
    .route("/api/analytics/track", post(events::track::<S>))
    .route("/api/analytics/events", get(events::list::<S>))
    .route("/api/analytics/event/{id}", get(events::get_one::<S>).delete(events::delete_one::<S>))
    // Registrations
    .route("/api/analytics/registration", post(registrations::create::<S>))
    .route("/api/registrations", get(registrations::list::<S>))
    .route(
      "/api/registration/{id}",
      get(registrations::get_one::<S>).delete(registrations::delete_one::<S>),
    )
    // Reports
    .route("/api/analytics/stats", get(reports::stats::<S>))
    .route("/api/analytics/ab-test", get(reports::ab_test::<S>))
    .route("/api/referrals", get(reports::referrals::<S>))
    .route("/api/referrals/{id}", get(reports::referrals_for::<S>))
    .route("/api/reports/daily", get(reports::daily::<S>))
    // Settings
    .route("/api/settings", get(settings::list::<S>))
    .route(
      "/api/settings/{key}",
      get(settings::get_one::<S>).put(settings::update::<S>).post(settings::update::<S>),
    )
    // Waiting list
    .route("/api/waitinglist", get(waitlist::list::<S>).post(waitlist::join::<S>))
    // Maintenance
    .route("/api/database/reset", post(maintenance::reset::<S>))
    .with_state(state)
}

async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }
