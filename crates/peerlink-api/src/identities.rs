//! Handlers for `/identities` endpoints.
//!
//! A thin stand-in for the account subsystem: enough to seed identities and
//! look one up by id.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/identities` | Body: [`CreateBody`]; returns 201 + identity |
//! | `GET`  | `/identities/:id` | 404 if not found |

use axum::{
  Json,
  extract::{Path, State, rejection::{JsonRejection, PathRejection}},
  http::StatusCode,
  response::IntoResponse,
};
use peerlink_core::{
  identity::{Identity, NewIdentity},
  store::PeerStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateBody {
  pub name:        String,
  pub email:       Option<String>,
  pub city:        Option<String>,
  #[serde(alias = "university")]
  pub institution: Option<String>,
}

impl CreateBody {
  /// Trim every field; blank optionals become `None`.
  fn validate(self) -> Result<NewIdentity, ApiError> {
    fn clean(v: Option<String>) -> Option<String> {
      v.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
    }

    let name = self.name.trim();
    if name.is_empty() {
      return Err(ApiError::BadRequest("name must not be empty".into()));
    }
    Ok(NewIdentity {
      name:        name.to_owned(),
      email:       clean(self.email),
      city:        clean(self.city),
      institution: clean(self.institution),
    })
  }
}

/// `POST /identities`
pub async fn create<S>(
  State(state): State<ApiState<S>>,
  body: Result<Json<CreateBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PeerStore + 'static,
{
  let Json(body) = body?;
  let identity = state
    .store
    .add_identity(body.validate()?)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(identity)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /identities/:id`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Identity>, ApiError>
where
  S: PeerStore + 'static,
{
  let Path(id) = id?;
  let identity = state
    .store
    .get_identity(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("identity {id} not found")))?;
  Ok(Json(identity))
}
