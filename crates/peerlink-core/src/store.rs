//! The `PeerStore` trait and supporting query types.
//!
//! The trait is the storage capability every component of the connection
//! graph is built on. It is implemented by storage backends (e.g.
//! `peerlink-store-sqlite`) and injected into higher layers (`peerlink-api`)
//! as `Arc<S>`, never reached through a global.

use std::future::Future;

use uuid::Uuid;

use crate::{
  Classify,
  connection::{Connection, PeerConnection, RespondAction},
  identity::{Identity, NewIdentity},
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`PeerStore::search`].
#[derive(Debug, Clone, Default)]
pub struct DirectoryQuery {
  /// Case-insensitive substring matched against name and institution.
  /// `None` or an empty string matches every identity.
  pub text:   Option<String>,
  /// Page size. `None` returns every match.
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

impl DirectoryQuery {
  pub fn text(text: impl Into<String>) -> Self {
    Self { text: Some(text.into()), ..Self::default() }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Peerlink storage backend.
///
/// Every write is a single atomic unit: the duplicate check and insert of
/// [`request_connection`](Self::request_connection) and the conditional
/// update of [`respond`](Self::respond) must not interleave with concurrent
/// writers.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait PeerStore: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  // ── Identities ────────────────────────────────────────────────────────

  /// Create and persist a new identity.
  fn add_identity(
    &self,
    input: NewIdentity,
  ) -> impl Future<Output = Result<Identity, Self::Error>> + Send + '_;

  /// Retrieve an identity by UUID. Returns `None` if not found.
  fn get_identity(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + '_;

  // ── Directory lookup ──────────────────────────────────────────────────

  /// Identities whose name or institution contains the query text. An empty
  /// result is "no matches", never an error.
  fn search<'a>(
    &'a self,
    query: &'a DirectoryQuery,
  ) -> impl Future<Output = Result<Vec<Identity>, Self::Error>> + Send + 'a;

  /// Identities living in exactly `city`, excluding `exclude`.
  fn peers_in_city<'a>(
    &'a self,
    city: &'a str,
    exclude: Uuid,
  ) -> impl Future<Output = Result<Vec<Identity>, Self::Error>> + Send + 'a;

  /// Identities at exactly `institution`, excluding `exclude`.
  fn peers_in_institution<'a>(
    &'a self,
    institution: &'a str,
    exclude: Uuid,
  ) -> impl Future<Output = Result<Vec<Identity>, Self::Error>> + Send + 'a;

  // ── Requests and responses ────────────────────────────────────────────

  /// Create a `pending` connection from `requester_id` to `receiver_id`.
  ///
  /// Fails with an invalid-state error for a self-connection, not-found if
  /// either identity is missing, and conflict if a pending or accepted edge
  /// already joins the pair in either direction.
  fn request_connection(
    &self,
    requester_id: Uuid,
    receiver_id: Uuid,
  ) -> impl Future<Output = Result<Connection, Self::Error>> + Send + '_;

  /// Resolve a pending connection. Only `pending` rows are updated; a
  /// missing row is not-found and a resolved one is invalid-state.
  fn respond(
    &self,
    connection_id: Uuid,
    action: RespondAction,
  ) -> impl Future<Output = Result<Connection, Self::Error>> + Send + '_;

  /// Retrieve a connection by UUID. Returns `None` if not found.
  fn get_connection(
    &self,
    connection_id: Uuid,
  ) -> impl Future<Output = Result<Option<Connection>, Self::Error>> + Send + '_;

  /// Delete a connection outright. Returns whether a row was removed.
  fn disconnect(
    &self,
    connection_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Views ─────────────────────────────────────────────────────────────

  /// Requests addressed to `identity_id`, joined with the requester.
  /// Pending first, then newest first.
  fn list_received(
    &self,
    identity_id: Uuid,
  ) -> impl Future<Output = Result<Vec<PeerConnection>, Self::Error>> + Send + '_;

  /// Requests sent by `identity_id`, joined with the receiver.
  /// Pending first, then newest first.
  fn list_sent(
    &self,
    identity_id: Uuid,
  ) -> impl Future<Output = Result<Vec<PeerConnection>, Self::Error>> + Send + '_;

  /// Accepted connections touching `identity_id`, each joined with the other
  /// party. Newest first.
  fn list_accepted(
    &self,
    identity_id: Uuid,
  ) -> impl Future<Output = Result<Vec<PeerConnection>, Self::Error>> + Send + '_;

  /// Number of accepted connections touching `identity_id`.
  fn count_accepted(
    &self,
    identity_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}
