//! Directory lookup handlers: free-text search and same-city /
//! same-institution peers.

use axum::{
  Json,
  extract::{Path, Query, State, rejection::{PathRejection, QueryRejection}},
};
use peerlink_core::{
  identity::Identity,
  store::{DirectoryQuery, PeerStore},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, auth::Authorized, error::ApiError};

#[derive(Debug, Deserialize, Default)]
pub struct SearchParams {
  /// Substring matched against name and institution. Omitted or empty
  /// matches everyone.
  pub query:  Option<String>,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

/// `GET /peer[?query=...][&limit=...][&offset=...]`
pub async fn search<S>(
  State(state): State<ApiState<S>>,
  params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<Identity>>, ApiError>
where
  S: PeerStore + 'static,
{
  let Query(params) = params?;
  let query = DirectoryQuery {
    text:   params.query,
    limit:  params.limit,
    offset: params.offset,
  };

  let identities = state.store.search(&query).await.map_err(ApiError::store)?;
  Ok(Json(identities))
}

/// Resolve the caller's own identity, or 404.
async fn resolve<S>(state: &ApiState<S>, id: Uuid) -> Result<Identity, ApiError>
where
  S: PeerStore + 'static,
{
  state
    .store
    .get_identity(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("identity {id} not found")))
}

/// `GET /peer/city/:id`: everyone else in the caller's city.
pub async fn by_city<S>(
  _auth: Authorized,
  State(state): State<ApiState<S>>,
  id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<Identity>>, ApiError>
where
  S: PeerStore + 'static,
{
  let Path(id) = id?;
  let me = resolve(&state, id).await?;
  let Some(city) = me.city else {
    return Ok(Json(Vec::new()));
  };

  let peers = state
    .store
    .peers_in_city(&city, id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(peers))
}

/// `GET /peer/university/:id`: everyone else at the caller's institution.
pub async fn by_university<S>(
  _auth: Authorized,
  State(state): State<ApiState<S>>,
  id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<Identity>>, ApiError>
where
  S: PeerStore + 'static,
{
  let Path(id) = id?;
  let me = resolve(&state, id).await?;
  let Some(institution) = me.institution else {
    return Ok(Json(Vec::new()));
  };

  let peers = state
    .store
    .peers_in_institution(&institution, id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(peers))
}
