//! Handlers for connection requests, responses and listings.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST`   | `/peer/connect` | Body: `{"requesterId","receiverId"}`; 201 |
//! | `POST`   | `/peer/respond` | Body: `{"connectionId","action"}` |
//! | `GET`    | `/peer/requests/received/:userId` | Pending first, then newest |
//! | `GET`    | `/peer/requests/sent/:userId` | Pending first, then newest |
//! | `GET`    | `/peer/connections/:userId` | Accepted connections |
//! | `GET`    | `/peer/connections/:userId/count` | `{"count": n}` |
//! | `DELETE` | `/peer/connections/by-id/:connectionId` | Guarded; 204 or 404 |

use axum::{
  Json,
  extract::{Path, State, rejection::{JsonRejection, PathRejection}},
  http::StatusCode,
  response::IntoResponse,
};
use peerlink_core::{
  connection::{Connection, PeerConnection, RespondAction},
  store::PeerStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ApiState, auth::Authorized, error::ApiError};

// ─── Connect ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConnectBody {
  pub requester_id: Uuid,
  pub receiver_id:  Uuid,
}

#[derive(Debug, Serialize)]
pub struct ConnectionEnvelope {
  pub connection: Connection,
}

/// `POST /peer/connect`
pub async fn connect<S>(
  State(state): State<ApiState<S>>,
  body: Result<Json<ConnectBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PeerStore + 'static,
{
  let Json(body) = body?;
  let connection = state
    .store
    .request_connection(body.requester_id, body.receiver_id)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(ConnectionEnvelope { connection })))
}

// ─── Respond ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RespondBody {
  pub connection_id: Uuid,
  /// `"accept"` or `"reject"`; parsed after deserialisation so an unknown
  /// action is reported as an invalid-state error rather than a bad body.
  pub action:        String,
}

#[derive(Debug, Serialize)]
pub struct RespondResponse {
  pub message:    String,
  pub connection: Connection,
}

/// `POST /peer/respond`
pub async fn respond<S>(
  State(state): State<ApiState<S>>,
  body: Result<Json<RespondBody>, JsonRejection>,
) -> Result<Json<RespondResponse>, ApiError>
where
  S: PeerStore + 'static,
{
  let Json(body) = body?;
  let action: RespondAction = body.action.parse().map_err(ApiError::store)?;

  let connection = state
    .store
    .respond(body.connection_id, action)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(RespondResponse {
    message: format!("Request {}", connection.status),
    connection,
  }))
}

// ─── Listings ─────────────────────────────────────────────────────────────────

/// `GET /peer/requests/received/:userId`
pub async fn received<S>(
  State(state): State<ApiState<S>>,
  user_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<PeerConnection>>, ApiError>
where
  S: PeerStore + 'static,
{
  let Path(user_id) = user_id?;
  let rows = state
    .store
    .list_received(user_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(rows))
}

/// `GET /peer/requests/sent/:userId`
pub async fn sent<S>(
  State(state): State<ApiState<S>>,
  user_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<PeerConnection>>, ApiError>
where
  S: PeerStore + 'static,
{
  let Path(user_id) = user_id?;
  let rows = state
    .store
    .list_sent(user_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(rows))
}

/// `GET /peer/connections/:userId`
pub async fn accepted<S>(
  State(state): State<ApiState<S>>,
  user_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<PeerConnection>>, ApiError>
where
  S: PeerStore + 'static,
{
  let Path(user_id) = user_id?;
  let rows = state
    .store
    .list_accepted(user_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(rows))
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
  pub count: u64,
}

/// `GET /peer/connections/:userId/count`
pub async fn count<S>(
  State(state): State<ApiState<S>>,
  user_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<CountResponse>, ApiError>
where
  S: PeerStore + 'static,
{
  let Path(user_id) = user_id?;
  let count = state
    .store
    .count_accepted(user_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(CountResponse { count }))
}

// ─── Disconnect ───────────────────────────────────────────────────────────────

/// `DELETE /peer/connections/by-id/:connectionId`
pub async fn disconnect<S>(
  _auth: Authorized,
  State(state): State<ApiState<S>>,
  connection_id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError>
where
  S: PeerStore + 'static,
{
  let Path(connection_id) = connection_id?;
  let removed = state
    .store
    .disconnect(connection_id)
    .await
    .map_err(ApiError::store)?;

  if removed {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(ApiError::NotFound(format!("connection {connection_id} not found")))
  }
}
