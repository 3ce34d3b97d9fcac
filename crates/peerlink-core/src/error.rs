//! Error types for `peerlink-core`.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::connection::ConnectionStatus;

#[derive(Debug, Error)]
pub enum Error {
  #[error("identity not found: {0}")]
  IdentityNotFound(Uuid),

  #[error("connection not found: {0}")]
  ConnectionNotFound(Uuid),

  #[error("an active connection already exists between {requester} and {receiver}")]
  DuplicateConnection { requester: Uuid, receiver: Uuid },

  #[error("identity {0} cannot connect to itself")]
  SelfConnection(Uuid),

  #[error("connection {connection_id} is already {status}")]
  AlreadyResolved {
    connection_id: Uuid,
    status:        ConnectionStatus,
  },

  #[error("unknown action: {0:?} (expected \"accept\" or \"reject\")")]
  UnknownAction(String),

  #[error("unknown connection status: {0:?}")]
  UnknownStatus(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Classification ──────────────────────────────────────────────────────────

/// The machine-readable category of a failure, independent of the backend
/// that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  /// A referenced identity or connection does not exist.
  NotFound,
  /// An active connection between the pair already exists.
  Conflict,
  /// The operation is not valid for the current state (self-connection,
  /// responding to a resolved connection, unknown action).
  InvalidState,
  /// Any underlying I/O or decoding failure.
  StorageFailure,
}

impl ErrorKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::NotFound => "not_found",
      Self::Conflict => "conflict",
      Self::InvalidState => "invalid_state",
      Self::StorageFailure => "storage_failure",
    }
  }
}

impl std::fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Implemented by every error a [`crate::store::PeerStore`] can return, so
/// transport layers can map failures without knowing the backend.
pub trait Classify {
  fn kind(&self) -> ErrorKind;
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::IdentityNotFound(_) | Self::ConnectionNotFound(_) => ErrorKind::NotFound,
      Self::DuplicateConnection { .. } => ErrorKind::Conflict,
      Self::SelfConnection(_)
      | Self::AlreadyResolved { .. }
      | Self::UnknownAction(_) => ErrorKind::InvalidState,
      Self::UnknownStatus(_) => ErrorKind::StorageFailure,
    }
  }
}
