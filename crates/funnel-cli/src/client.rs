//! Pulls registrations from a running funnel server for `funnel migrate`.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use funnel_core::registration::NewRegistration;
use reqwest::Client;
use serde_json::Value;
use tracing::warn;

/// Where the remote server lives and how to log in to its admin routes.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  /// Empty means no `Authorization` header is sent.
  pub username: String,
  pub password: String,
}

pub struct ApiClient {
  http:   Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let http = Client::builder()
      .timeout(Duration::from_secs(60))
      .build()
      .context("building HTTP client")?;
    Ok(Self { http, config })
  }

  /// `GET /api/registrations`. Records that do not decode are logged and
  /// dropped.
  pub async fn list_registrations(&self) -> Result<Vec<NewRegistration>> {
    let url = format!("{}/api/registrations", self.config.base_url.trim_end_matches('/'));
    let mut req = self.http.get(&url);
    if !self.config.username.is_empty() {
      req = req.basic_auth(&self.config.username, Some(&self.config.password));
    }

    let resp = req.send().await.with_context(|| format!("GET {url}"))?;
    let status = resp.status();
    if !status.is_success() {
      bail!("GET {url} returned {status}");
    }
    let values: Vec<Value> = resp.json().await.with_context(|| format!("decoding {url}"))?;

    let mut out = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
      match serde_json::from_value(value) {
        Ok(record) => out.push(record),
        Err(e) => warn!(error = %e, index, "skipping remote registration"),
      }
    }
    Ok(out)
  }
}
