//! Geolocation proxy with a per-IP in-memory cache.

use std::{collections::HashMap, net::SocketAddr, time::Duration};

use axum::{
  Json,
  extract::{ConnectInfo, Request, State},
  http::HeaderMap,
};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
  Collaborators,
  error::{Error, Result},
};

/// `{ip}` is replaced with the client address.
pub const DEFAULT_URL: &str = "https://ipapi.co/{ip}/json/";

pub struct GeoLocator {
  http:         reqwest::Client,
  url_template: String,
  cache:        Mutex<HashMap<String, Value>>,
}

impl GeoLocator {
  pub fn new(url_template: impl Into<String>) -> Result<Self> {
    let http = reqwest::Client::builder().timeout(Duration::from_secs(5)).build()?;
    Ok(Self { http, url_template: url_template.into(), cache: Mutex::default() })
  }

  /// Without an address the placeholder is dropped, which asks the service
  /// to locate the caller.
  pub fn url_for(&self, ip: Option<&str>) -> String {
    match ip {
      Some(ip) => self.url_template.replace("{ip}", ip),
      None => self.url_template.replace("{ip}/", "").replace("{ip}", ""),
    }
  }

  /// Look up `ip`, consulting the cache first. Only successes are cached.
  pub async fn lookup(&self, ip: Option<&str>) -> Result<Value> {
    let key = ip.unwrap_or("unknown");
    if let Some(hit) = self.cache.lock().await.get(key) {
      debug!(ip = key, "geolocation cache hit");
      return Ok(hit.clone());
    }

    let data: Value = self
      .http
      .get(self.url_for(ip))
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    // Rate limits come back as 200 with `"error": true`.
    if data.get("error").and_then(Value::as_bool) == Some(true) {
      let reason = data
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or("lookup refused")
        .to_owned();
      return Err(Error::Geolocation(reason));
    }

    self.cache.lock().await.insert(key.to_owned(), data.clone());
    Ok(data)
  }
}

/// The first `X-Forwarded-For` entry, else the peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
  let forwarded = headers
    .get("x-forwarded-for")
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.split(',').next())
    .map(str::trim)
    .filter(|ip| !ip.is_empty());

  match forwarded {
    Some(ip) => Some(ip.to_owned()),
    None => peer.map(|addr| addr.ip().to_string()),
  }
}

/// `GET /api/geolocation`
///
/// Always 200; a failed lookup yields an `Unknown` location and the reason.
pub async fn geolocation(State(collaborators): State<Collaborators>, request: Request) -> Json<Value> {
  let peer = request.extensions().get::<ConnectInfo<SocketAddr>>().map(|ci| ci.0);
  let ip = client_ip(request.headers(), peer);

  match collaborators.geo.lookup(ip.as_deref()).await {
    Ok(data) => Json(data),
    Err(e) => {
      warn!(ip = ip.as_deref().unwrap_or("unknown"), error = %e, "geolocation lookup failed");
      Json(json!({ "city": "Unknown", "country": "Unknown", "error": e.to_string() }))
    }
  }
}
