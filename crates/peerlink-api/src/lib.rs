//! JSON REST API for Peerlink.
//!
//! Exposes an axum [`Router`] backed by any [`peerlink_core::store::PeerStore`].
//! TLS and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let state = ApiState::new(Arc::new(store), TokenGuard::open());
//! axum::serve(listener, peerlink_api::api_router(state)).await?;
//! ```

pub mod auth;
pub mod connections;
pub mod directory;
pub mod error;
pub mod identities;

use std::sync::Arc;

use axum::{
  Json, Router,
  routing::{delete, get, post},
};
use peerlink_core::store::PeerStore;
use serde_json::{Value, json};

pub use auth::TokenGuard;
pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers: the injected store and the
/// token guard.
pub struct ApiState<S> {
  pub store: Arc<S>,
  pub guard: Arc<TokenGuard>,
}

impl<S> ApiState<S> {
  pub fn new(store: Arc<S>, guard: TokenGuard) -> Self {
    Self { store, guard: Arc::new(guard) }
  }
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), guard: Arc::clone(&self.guard) }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: PeerStore + 'static,
{
  Router::new()
    .route("/health", get(health))
    // Identities
    .route("/identities", post(identities::create::<S>))
    .route("/identities/{id}", get(identities::get_one::<S>))
    // Directory lookup
    .route("/peer", get(directory::search::<S>))
    .route("/peer/city/{id}", get(directory::by_city::<S>))
    .route("/peer/university/{id}", get(directory::by_university::<S>))
    // Requests and responses
    .route("/peer/connect", post(connections::connect::<S>))
    .route("/peer/respond", post(connections::respond::<S>))
    // Views
    .route("/peer/requests/received/{id}", get(connections::received::<S>))
    .route("/peer/requests/sent/{id}", get(connections::sent::<S>))
    .route("/peer/connections/{id}", get(connections::accepted::<S>))
    .route("/peer/connections/{id}/count", get(connections::count::<S>))
    .route("/peer/connections/by-id/{id}", delete(connections::disconnect::<S>))
    .with_state(state)
}

async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
  };
  use peerlink_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;
  use uuid::Uuid;

  async fn make_state(guard: TokenGuard) -> ApiState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    ApiState::new(Arc::new(store), guard)
  }

  async fn send(
    state:   &ApiState<SqliteStore>,
    method:  &str,
    uri:     &str,
    headers: Vec<(header::HeaderName, &str)>,
    body:    Option<Value>,
  ) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
      builder = builder.header(k, v);
    }
    let body = match body {
      Some(json) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(json.to_string())
      }
      None => Body::empty(),
    };
    api_router(state.clone())
      .oneshot(builder.body(body).unwrap())
      .await
      .unwrap()
  }

  async fn json_body(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  async fn create_identity(
    state: &ApiState<SqliteStore>,
    name:  &str,
    city:  &str,
    uni:   &str,
  ) -> Uuid {
    let resp = send(
      state,
      "POST",
      "/identities",
      vec![],
      Some(json!({ "name": name, "city": city, "university": uni })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = json_body(resp).await;
    body["identity_id"].as_str().unwrap().parse().unwrap()
  }

  async fn connect(state: &ApiState<SqliteStore>, from: Uuid, to: Uuid) -> Response {
    send(
      state,
      "POST",
      "/peer/connect",
      vec![],
      Some(json!({ "requesterId": from, "receiverId": to })),
    )
    .await
  }

  async fn respond(state: &ApiState<SqliteStore>, id: &str, action: &str) -> Response {
    send(
      state,
      "POST",
      "/peer/respond",
      vec![],
      Some(json!({ "connectionId": id, "action": action })),
    )
    .await
  }

  // ── Health and identities ───────────────────────────────────────────────────

  #[tokio::test]
  async fn health_is_ok() {
    let state = make_state(TokenGuard::open()).await;
    let resp = send(&state, "GET", "/health", vec![], None).await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn blank_identity_name_is_bad_request() {
    let state = make_state(TokenGuard::open()).await;
    let resp = send(&state, "POST", "/identities", vec![], Some(json!({ "name": "  " }))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["error"]["kind"], "bad_request");
  }

  #[tokio::test]
  async fn unknown_identity_is_404() {
    let state = make_state(TokenGuard::open()).await;
    let uri = format!("/identities/{}", Uuid::new_v4());
    let resp = send(&state, "GET", &uri, vec![], None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  // ── Directory ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn search_by_query_string() {
    let state = make_state(TokenGuard::open()).await;
    create_identity(&state, "Ada", "London", "UCL").await;
    create_identity(&state, "Grace", "Oxford", "Oxford").await;

    let resp = send(&state, "GET", "/peer?query=ucl", vec![], None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    let hits = body.as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["name"], "Ada");

    let resp = send(&state, "GET", "/peer", vec![], None).await;
    assert_eq!(json_body(resp).await.as_array().unwrap().len(), 2);
  }

  #[tokio::test]
  async fn city_peers_exclude_the_caller() {
    let state = make_state(TokenGuard::open()).await;
    let me = create_identity(&state, "Me", "Leeds", "Leeds Uni").await;
    create_identity(&state, "Mate", "Leeds", "Elsewhere").await;
    create_identity(&state, "Far", "York", "Leeds Uni").await;

    let resp = send(&state, "GET", &format!("/peer/city/{me}"), vec![], None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    let names: Vec<_> = body
      .as_array()
      .unwrap()
      .iter()
      .map(|i| i["name"].as_str().unwrap().to_owned())
      .collect();
    assert_eq!(names, ["Mate"]);

    let resp = send(&state, "GET", &format!("/peer/university/{me}"), vec![], None).await;
    let body = json_body(resp).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["name"], "Far");
  }

  #[tokio::test]
  async fn city_lookup_for_unknown_identity_is_404() {
    let state = make_state(TokenGuard::open()).await;
    let uri = format!("/peer/city/{}", Uuid::new_v4());
    let resp = send(&state, "GET", &uri, vec![], None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn guarded_routes_require_the_token() {
    let hash = auth::hash_token("letmein").unwrap();
    let state = make_state(TokenGuard::with_hash(hash)).await;
    let me = create_identity(&state, "Me", "Leeds", "Leeds Uni").await;
    let uri = format!("/peer/city/{me}");

    let resp = send(&state, "GET", &uri, vec![], None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));

    let resp = send(
      &state,
      "GET",
      &uri,
      vec![(header::AUTHORIZATION, "Bearer letmein")],
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    // Unguarded routes stay open.
    let resp = send(&state, "GET", "/peer", vec![], None).await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  // ── Connections ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn request_accept_list_and_duplicate() {
    let state = make_state(TokenGuard::open()).await;
    let u1 = create_identity(&state, "U1", "Leeds", "Leeds Uni").await;
    let u2 = create_identity(&state, "U2", "York", "York Uni").await;

    let resp = connect(&state, u1, u2).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = json_body(resp).await;
    assert_eq!(body["connection"]["status"], "pending");
    let c1 = body["connection"]["connection_id"].as_str().unwrap().to_owned();

    let resp = send(&state, "GET", &format!("/peer/requests/sent/{u1}"), vec![], None).await;
    let sent = json_body(resp).await;
    assert_eq!(sent[0]["connection_id"], c1.as_str());
    assert_eq!(sent[0]["peer"]["identity_id"], u2.to_string());

    let resp = send(&state, "GET", &format!("/peer/requests/received/{u2}"), vec![], None).await;
    let received = json_body(resp).await;
    assert_eq!(received[0]["connection_id"], c1.as_str());
    assert_eq!(received[0]["peer"]["identity_id"], u1.to_string());

    let resp = respond(&state, &c1, "accept").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["message"], "Request accepted");
    assert_eq!(body["connection"]["status"], "accepted");

    for (me, other) in [(u1, u2), (u2, u1)] {
      let resp = send(&state, "GET", &format!("/peer/connections/{me}"), vec![], None).await;
      let friends = json_body(resp).await;
      assert_eq!(friends.as_array().unwrap().len(), 1);
      assert_eq!(friends[0]["peer"]["identity_id"], other.to_string());

      let resp = send(&state, "GET", &format!("/peer/connections/{me}/count"), vec![], None).await;
      assert_eq!(json_body(resp).await["count"], 1);
    }

    let resp = connect(&state, u1, u2).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(resp).await["error"]["kind"], "conflict");
  }

  #[tokio::test]
  async fn self_connection_is_unprocessable() {
    let state = make_state(TokenGuard::open()).await;
    let me = create_identity(&state, "Me", "Leeds", "Leeds Uni").await;

    let resp = connect(&state, me, me).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(resp).await["error"]["kind"], "invalid_state");
  }

  #[tokio::test]
  async fn connect_to_unknown_identity_is_404() {
    let state = make_state(TokenGuard::open()).await;
    let me = create_identity(&state, "Me", "Leeds", "Leeds Uni").await;

    let resp = connect(&state, me, Uuid::new_v4()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(resp).await["error"]["kind"], "not_found");
  }

  #[tokio::test]
  async fn malformed_connect_body_is_bad_request() {
    let state = make_state(TokenGuard::open()).await;
    let resp = send(
      &state,
      "POST",
      "/peer/connect",
      vec![],
      Some(json!({ "requesterId": "not-a-uuid", "receiverId": 7 })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["error"]["kind"], "bad_request");
  }

  #[tokio::test]
  async fn respond_twice_is_unprocessable() {
    let state = make_state(TokenGuard::open()).await;
    let a = create_identity(&state, "A", "Leeds", "Leeds Uni").await;
    let b = create_identity(&state, "B", "Leeds", "Leeds Uni").await;
    let body = json_body(connect(&state, a, b).await).await;
    let id = body["connection"]["connection_id"].as_str().unwrap().to_owned();

    assert_eq!(respond(&state, &id, "reject").await.status(), StatusCode::OK);
    let resp = respond(&state, &id, "accept").await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
  }

  #[tokio::test]
  async fn respond_with_unknown_action_or_id() {
    let state = make_state(TokenGuard::open()).await;
    let a = create_identity(&state, "A", "Leeds", "Leeds Uni").await;
    let b = create_identity(&state, "B", "Leeds", "Leeds Uni").await;
    let body = json_body(connect(&state, a, b).await).await;
    let id = body["connection"]["connection_id"].as_str().unwrap().to_owned();

    let resp = respond(&state, &id, "maybe").await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resp = respond(&state, &Uuid::new_v4().to_string(), "accept").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // The failed attempts left the request pending.
    let resp = send(&state, "GET", &format!("/peer/requests/received/{b}"), vec![], None).await;
    assert_eq!(json_body(resp).await[0]["status"], "pending");
  }

  #[tokio::test]
  async fn disconnect_then_404() {
    let state = make_state(TokenGuard::open()).await;
    let a = create_identity(&state, "A", "Leeds", "Leeds Uni").await;
    let b = create_identity(&state, "B", "Leeds", "Leeds Uni").await;
    let body = json_body(connect(&state, a, b).await).await;
    let id = body["connection"]["connection_id"].as_str().unwrap().to_owned();

    // The user-keyed path does not accept a connection id for deletion.
    let resp = send(&state, "DELETE", &format!("/peer/connections/{id}"), vec![], None).await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

    let uri = format!("/peer/connections/by-id/{id}");
    let resp = send(&state, "DELETE", &uri, vec![], None).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = send(&state, "DELETE", &uri, vec![], None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn bad_path_id_is_bad_request() {
    let state = make_state(TokenGuard::open()).await;
    let resp = send(&state, "GET", "/peer/requests/sent/42", vec![], None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }
}
