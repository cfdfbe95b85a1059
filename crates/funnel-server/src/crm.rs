//! CRM contact upserts.
//!
//! Contacts reach the CRM two ways: the public proxy endpoint
//! (`POST /api/clickfunnels/contact`), which waits for the CRM and echoes its
//! answer, and the background worker fed by the API whenever a registration or
//! waiting-list entry is created.

use std::{sync::Arc, time::Duration};

use axum::{Json, extract::State};
use funnel_core::contact::{ContactKind, ContactRequest, ContactUpsert};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
  Collaborators,
  error::{Error, Result},
};

pub const DEFAULT_BASE_URL: &str = "https://api.myclickfunnels.com";

fn default_base_url() -> String { DEFAULT_BASE_URL.to_owned() }
fn default_source() -> String { "Landing Page".to_owned() }
fn default_waitlist_source() -> String { "Waiting List".to_owned() }

/// The `[crm]` config table. Absent means contacts are never synced.
#[derive(Debug, Clone, Deserialize)]
pub struct CrmConfig {
  #[serde(default = "default_base_url")]
  pub base_url:             String,
  pub api_key:              String,
  pub workspace_id:         String,
  #[serde(default)]
  pub registration_tag_ids: Vec<i64>,
  #[serde(default)]
  pub waitlist_tag_ids:     Vec<i64>,
  #[serde(default = "default_source")]
  pub source:               String,
  #[serde(default = "default_waitlist_source")]
  pub waitlist_source:      String,
}

// ─── Client ───────────────────────────────────────────────────────────────────

pub struct CrmClient {
  http:   reqwest::Client,
  config: CrmConfig,
}

impl CrmClient {
  pub fn new(config: CrmConfig) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(30))
      .user_agent(concat!("funnel-server/", env!("CARGO_PKG_VERSION")))
      .build()?;
    Ok(Self { http, config })
  }

  pub fn upsert_url(&self) -> String {
    format!(
      "{}/api/v2/workspaces/{}/contacts/upsert",
      self.config.base_url.trim_end_matches('/'),
      self.config.workspace_id,
    )
  }

  /// Fills in the configured tags and source for the contact's list.
  pub fn prepare(&self, contact: ContactUpsert) -> ContactUpsert {
    let c = &self.config;
    match contact.kind {
      ContactKind::Registrant => contact.with_defaults(&c.registration_tag_ids, &c.source),
      ContactKind::Waitlist => contact.with_defaults(&c.waitlist_tag_ids, &c.waitlist_source),
    }
  }

  /// Upsert `contact`, returning the CRM's response body.
  pub async fn upsert(&self, contact: ContactUpsert) -> Result<Value> {
    let contact = self.prepare(contact);
    let resp = self
      .http
      .post(self.upsert_url())
      .bearer_auth(&self.config.api_key)
      .header(ACCEPT, "application/json")
      .json(&contact.payload())
      .send()
      .await?;

    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(Error::Rejected { status: status.as_u16(), body });
    }

    let body = resp.bytes().await?;
    if body.is_empty() {
      return Ok(Value::Null);
    }
    Ok(
      serde_json::from_slice(&body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned())),
    )
  }
}

// ─── Background sync ──────────────────────────────────────────────────────────

/// Spawn the worker that pushes queued contacts to the CRM one at a time.
///
/// The worker exits once every sender has been dropped. Failures are logged.
pub fn spawn_sync_worker(
  client: Arc<CrmClient>,
) -> (mpsc::UnboundedSender<ContactUpsert>, JoinHandle<()>) {
  let (tx, mut rx) = mpsc::unbounded_channel::<ContactUpsert>();
  let handle = tokio::spawn(async move {
    while let Some(contact) = rx.recv().await {
      let email = contact.email.clone();
      match client.upsert(contact).await {
        Ok(_) => info!(%email, "contact synced to CRM"),
        Err(e) => warn!(%email, error = %e, "CRM sync failed"),
      }
    }
    debug!("contact sync worker stopped");
  });
  (tx, handle)
}

// ─── Proxy endpoint ───────────────────────────────────────────────────────────

/// `POST /api/clickfunnels/contact`
pub async fn proxy_contact(
  State(collaborators): State<Collaborators>,
  Json(request): Json<ContactRequest>,
) -> Result<Json<Value>> {
  let crm = collaborators.crm.as_ref().ok_or(Error::CrmDisabled)?;
  let contact = request.into_upsert(ContactKind::Registrant)?;
  let data = crm.upsert(contact).await?;
  Ok(Json(json!({ "success": true, "data": data })))
}

#[cfg(test)]
mod tests {
  use std::{path::PathBuf, sync::Mutex};

  use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header::AUTHORIZATION},
    routing::post,
  };
  use tokio::net::TcpListener;
  use tower::ServiceExt as _;

  use super::*;
  use crate::{collaborator_router, geo::GeoLocator};

  type Seen = Arc<Mutex<Vec<(String, Value)>>>;

  /// A local stand-in for the CRM that records every upsert it receives.
  async fn fake_crm(status: StatusCode) -> (String, Seen) {
    let seen: Seen = Arc::default();
    let record = Arc::clone(&seen);
    let app = Router::new().route(
      "/api/v2/workspaces/{workspace}/contacts/upsert",
      post(move |headers: HeaderMap, Json(body): Json<Value>| {
        let record = Arc::clone(&record);
        async move {
          let auth = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();
          record.lock().unwrap().push((auth, body));
          (status, Json(json!({ "id": 42 })))
        }
      }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    (format!("http://{addr}"), seen)
  }

  fn config(base_url: &str) -> CrmConfig {
    CrmConfig {
      base_url:             base_url.to_owned(),
      api_key:              "secret".into(),
      workspace_id:         "ws1".into(),
      registration_tag_ids: vec![367566],
      waitlist_tag_ids:     vec![99],
      source:               default_source(),
      waitlist_source:      default_waitlist_source(),
    }
  }

  fn contact(kind: ContactKind) -> ContactUpsert {
    ContactRequest { email: Some("ana@x.com".into()), ..Default::default() }
      .into_upsert(kind)
      .unwrap()
  }

  fn collaborators(crm: Option<CrmClient>) -> Collaborators {
    Collaborators {
      crm:        crm.map(Arc::new),
      geo:        Arc::new(GeoLocator::new("http://127.0.0.1:9/{ip}").unwrap()),
      backup_dir: Arc::new(PathBuf::from("unused")),
    }
  }

  #[test]
  fn upsert_url_includes_workspace() {
    let client = CrmClient::new(config("https://crm.example/")).unwrap();
    assert_eq!(client.upsert_url(), "https://crm.example/api/v2/workspaces/ws1/contacts/upsert");
  }

  #[test]
  fn prepare_applies_defaults_per_list() {
    let client = CrmClient::new(config(DEFAULT_BASE_URL)).unwrap();

    let registrant = client.prepare(contact(ContactKind::Registrant));
    assert_eq!(registrant.tag_ids, vec![367566]);
    assert_eq!(registrant.source.as_deref(), Some("Landing Page"));

    let waitlist = client.prepare(contact(ContactKind::Waitlist));
    assert_eq!(waitlist.tag_ids, vec![99]);
    assert_eq!(waitlist.source.as_deref(), Some("Waiting List"));

    let mut own_tags = contact(ContactKind::Registrant);
    own_tags.tag_ids = vec![7];
    assert_eq!(client.prepare(own_tags).tag_ids, vec![7]);
  }

  #[tokio::test]
  async fn upsert_posts_payload_with_bearer_key() {
    let (url, seen) = fake_crm(StatusCode::CREATED).await;
    let client = CrmClient::new(config(&url)).unwrap();

    let data = client.upsert(contact(ContactKind::Registrant)).await.unwrap();
    assert_eq!(data["id"], 42);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let (auth, body) = &seen[0];
    assert_eq!(auth, "Bearer secret");
    assert_eq!(body["contact"]["email_address"], "ana@x.com");
    assert_eq!(body["contact"]["tag_ids"], json!([367566]));
    assert_eq!(body["contact"]["fields"]["source"], "Landing Page");
    assert_eq!(body["contact"]["fields"]["utm_source"], "");
  }

  #[tokio::test]
  async fn rejected_upsert_reports_upstream_status() {
    let (url, _) = fake_crm(StatusCode::UNPROCESSABLE_ENTITY).await;
    let client = CrmClient::new(config(&url)).unwrap();

    let err = client.upsert(contact(ContactKind::Registrant)).await.unwrap_err();
    assert!(matches!(err, Error::Rejected { status: 422, .. }));
  }

  #[tokio::test]
  async fn worker_drains_queue_and_stops() {
    let (url, seen) = fake_crm(StatusCode::OK).await;
    let client = Arc::new(CrmClient::new(config(&url)).unwrap());

    let (tx, handle) = spawn_sync_worker(client);
    tx.send(contact(ContactKind::Registrant)).unwrap();
    tx.send(contact(ContactKind::Waitlist)).unwrap();
    drop(tx);
    handle.await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].1["contact"]["tag_ids"], json!([99]));
  }

  #[tokio::test]
  async fn worker_survives_unreachable_crm() {
    let client = Arc::new(CrmClient::new(config("http://127.0.0.1:9")).unwrap());
    let (tx, handle) = spawn_sync_worker(client);
    tx.send(contact(ContactKind::Registrant)).unwrap();
    drop(tx);
    handle.await.unwrap();
  }

  async fn post_contact(c: Collaborators, body: &str) -> (StatusCode, Value) {
    let resp = collaborator_router(c)
      .oneshot(
        Request::post("/api/clickfunnels/contact")
          .header("content-type", "application/json")
          .body(Body::from(body.to_owned()))
          .unwrap(),
      )
      .await
      .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
  }

  #[tokio::test]
  async fn proxy_echoes_crm_response() {
    let (url, seen) = fake_crm(StatusCode::OK).await;
    let client = CrmClient::new(config(&url)).unwrap();

    let (status, body) = post_contact(
      collaborators(Some(client)),
      r#"{"email":"ana@x.com","firstName":"Ana","utm_source":"ig","tagIds":[5]}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["id"], 42);

    let seen = seen.lock().unwrap();
    let sent = &seen[0].1["contact"];
    assert_eq!(sent["first_name"], "Ana");
    assert_eq!(sent["tag_ids"], json!([5]));
    assert_eq!(sent["fields"]["utm_source"], "ig");
  }

  #[tokio::test]
  async fn proxy_passes_through_rejection_status() {
    let (url, _) = fake_crm(StatusCode::UNPROCESSABLE_ENTITY).await;
    let client = CrmClient::new(config(&url)).unwrap();

    let (status, body) =
      post_contact(collaborators(Some(client)), r#"{"email":"ana@x.com"}"#).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["status"], 422);
  }

  #[tokio::test]
  async fn proxy_rejects_missing_email() {
    let client = CrmClient::new(config("http://127.0.0.1:9")).unwrap();
    let (status, body) = post_contact(collaborators(Some(client)), r#"{"firstName":"Ana"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
  }

  #[tokio::test]
  async fn proxy_without_crm_is_unavailable() {
    let (status, _) = post_contact(collaborators(None), r#"{"email":"ana@x.com"}"#).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
  }

  #[tokio::test]
  async fn proxy_reports_unreachable_crm_as_bad_gateway() {
    let client = CrmClient::new(config("http://127.0.0.1:9")).unwrap();
    let (status, _) = post_contact(collaborators(Some(client)), r#"{"email":"ana@x.com"}"#).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
  }
}
