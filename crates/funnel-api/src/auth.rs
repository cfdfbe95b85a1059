//! HTTP Basic auth for the admin routes.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::{self, SaltString},
};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use rand_core::OsRng;

use crate::{ApiState, error::ApiError};

/// Credentials accepted for the admin routes.
#[derive(Clone)]
pub struct AuthConfig {
  pub username:      String,
  /// argon2 PHC string, see [`hash_password`].
  pub password_hash: String,
}

/// Hash `password` into a PHC string suitable for [`AuthConfig::password_hash`].
pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(Argon2::default().hash_password(password.as_bytes(), &salt)?.to_string())
}

/// Decode an `Authorization: Basic` header into `(user, password)`.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
  let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
  let decoded = B64.decode(value.strip_prefix("Basic ")?).ok()?;
  let creds = String::from_utf8(decoded).ok()?;
  let (user, password) = creds.split_once(':')?;
  Some((user.to_owned(), password.to_owned()))
}

/// Check the Basic credentials in `headers` against `config`.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<(), ApiError> {
  let (user, password) = basic_credentials(headers).ok_or(ApiError::Unauthorized)?;
  let hash = PasswordHash::new(&config.password_hash).map_err(|e| {
    tracing::error!(error = %e, "admin_password_hash is not a valid PHC string");
    ApiError::Unauthorized
  })?;

  let accepted = user == config.username
    && Argon2::default().verify_password(password.as_bytes(), &hash).is_ok();
  if accepted { Ok(()) } else { Err(ApiError::Unauthorized) }
}

/// Zero-size marker: present in the handler means the caller may use admin
/// routes. Always granted when no credentials are configured.
pub struct Admin;

impl<S> FromRequestParts<ApiState<S>> for Admin
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &ApiState<S>,
  ) -> Result<Self, Self::Rejection> {
    if let Some(auth) = &state.auth {
      verify_auth(&parts.headers, auth)?;
    }
    Ok(Admin)
  }
}
