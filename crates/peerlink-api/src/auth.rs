//! Bearer-token guard for the routes that expose location data or remove
//! connections.
//!
//! The server stores only the argon2 PHC hash of the shared token. When no
//! hash is configured the guard lets every request through.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use peerlink_core::store::PeerStore;
use rand_core::OsRng;

use crate::{ApiState, error::ApiError};

/// Token configuration for this server instance.
#[derive(Clone, Debug, Default)]
pub struct TokenGuard {
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`.
  token_hash: Option<String>,
}

impl TokenGuard {
  /// A guard that admits every request.
  pub fn open() -> Self { Self::default() }

  pub fn with_hash(hash: impl Into<String>) -> Self {
    Self { token_hash: Some(hash.into()) }
  }

  pub fn is_enforced(&self) -> bool { self.token_hash.is_some() }

  /// Verify the `Authorization: Bearer <token>` header against the stored
  /// hash.
  pub fn verify(&self, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(hash) = &self.token_hash else {
      return Ok(());
    };

    let token = headers
      .get(header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .and_then(|v| v.strip_prefix("Bearer "))
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .ok_or(ApiError::Unauthorized)?;

    let parsed = PasswordHash::new(hash).map_err(|e| {
      tracing::error!(error = %e, "configured token hash is not a valid PHC string");
      ApiError::Unauthorized
    })?;

    Argon2::default()
      .verify_password(token.as_bytes(), &parsed)
      .map_err(|_| ApiError::Unauthorized)
  }
}

/// Produce the argon2 PHC hash to configure as `auth_token_hash`.
pub fn hash_token(token: &str) -> Result<String, argon2::password_hash::Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(
    Argon2::default()
      .hash_password(token.as_bytes(), &salt)?
      .to_string(),
  )
}

/// Zero-size marker: present in the handler means the request passed the
/// guard.
pub struct Authorized;

impl<S> FromRequestParts<ApiState<S>> for Authorized
where
  S: PeerStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &ApiState<S>,
  ) -> Result<Self, Self::Rejection> {
    state.guard.verify(&parts.headers)?;
    Ok(Authorized)
  }
}
