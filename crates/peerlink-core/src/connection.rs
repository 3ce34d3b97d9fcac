//! Connection types: directed requests between two identities.
//!
//! A connection is created `pending` and resolves exactly once, to either
//! `accepted` or `rejected`. Both resolved states are terminal.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, identity::Identity};

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
  Pending,
  Accepted,
  Rejected,
}

impl ConnectionStatus {
  /// The string stored in the `status` column.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Accepted => "accepted",
      Self::Rejected => "rejected",
    }
  }

  /// The status reached by applying `action`, or `None` when no transition
  /// is defined from `self`.
  pub fn transition(self, action: RespondAction) -> Option<Self> {
    match self {
      Self::Pending => Some(action.target()),
      Self::Accepted | Self::Rejected => None,
    }
  }
}

impl fmt::Display for ConnectionStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ConnectionStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "pending" => Ok(Self::Pending),
      "accepted" => Ok(Self::Accepted),
      "rejected" => Ok(Self::Rejected),
      other => Err(Error::UnknownStatus(other.to_owned())),
    }
  }
}

// ─── Action ──────────────────────────────────────────────────────────────────

/// A receiver's answer to a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RespondAction {
  Accept,
  Reject,
}

impl RespondAction {
  pub fn target(self) -> ConnectionStatus {
    match self {
      Self::Accept => ConnectionStatus::Accepted,
      Self::Reject => ConnectionStatus::Rejected,
    }
  }
}

impl FromStr for RespondAction {
  type Err = Error;

  /// Case-insensitive; anything other than `accept`/`reject` is refused
  /// rather than treated as a rejection.
  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "accept" => Ok(Self::Accept),
      "reject" => Ok(Self::Reject),
      _ => Err(Error::UnknownAction(s.to_owned())),
    }
  }
}

// ─── Connection ──────────────────────────────────────────────────────────────

/// A stored connection edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
  pub connection_id: Uuid,
  pub requester_id:  Uuid,
  pub receiver_id:   Uuid,
  pub status:        ConnectionStatus,
  /// Server-assigned; never changes after creation.
  pub created_at:    DateTime<Utc>,
  /// Set once, when the connection leaves `pending`.
  pub responded_at:  Option<DateTime<Utc>>,
}

impl Connection {
  /// Validate and compute the status `action` moves this connection to.
  pub fn respond(&self, action: RespondAction) -> Result<ConnectionStatus> {
    self.status.transition(action).ok_or(Error::AlreadyResolved {
      connection_id: self.connection_id,
      status:        self.status,
    })
  }
}

/// Reject a request from an identity to itself.
pub fn ensure_distinct(requester_id: Uuid, receiver_id: Uuid) -> Result<()> {
  if requester_id == receiver_id {
    return Err(Error::SelfConnection(requester_id));
  }
  Ok(())
}

// ─── Views ───────────────────────────────────────────────────────────────────

/// One row of a connection listing: the edge plus the identity on the other
/// side of it, relative to the user the list was built for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConnection {
  pub connection_id: Uuid,
  pub status:        ConnectionStatus,
  pub created_at:    DateTime<Utc>,
  pub peer:          Identity,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn pending() -> Connection {
    Connection {
      connection_id: Uuid::new_v4(),
      requester_id:  Uuid::new_v4(),
      receiver_id:   Uuid::new_v4(),
      status:        ConnectionStatus::Pending,
      created_at:    Utc::now(),
      responded_at:  None,
    }
  }

  #[test]
  fn pending_transitions_to_either_terminal_state() {
    let c = pending();
    assert_eq!(c.respond(RespondAction::Accept).unwrap(), ConnectionStatus::Accepted);
    assert_eq!(c.respond(RespondAction::Reject).unwrap(), ConnectionStatus::Rejected);
  }

  #[test]
  fn terminal_states_have_no_transitions() {
    for status in [ConnectionStatus::Accepted, ConnectionStatus::Rejected] {
      let c = Connection { status, ..pending() };
      for action in [RespondAction::Accept, RespondAction::Reject] {
        let err = c.respond(action).unwrap_err();
        assert!(matches!(err, Error::AlreadyResolved { status: s, .. } if s == status));
      }
    }
  }

  #[test]
  fn action_parsing_is_strict() {
    assert_eq!("accept".parse::<RespondAction>().unwrap(), RespondAction::Accept);
    assert_eq!(" Reject ".parse::<RespondAction>().unwrap(), RespondAction::Reject);
    assert!(matches!(
      "ignore".parse::<RespondAction>(),
      Err(Error::UnknownAction(a)) if a == "ignore"
    ));
  }

  #[test]
  fn status_roundtrips_through_column_text() {
    for status in [
      ConnectionStatus::Pending,
      ConnectionStatus::Accepted,
      ConnectionStatus::Rejected,
    ] {
      assert_eq!(status.as_str().parse::<ConnectionStatus>().unwrap(), status);
    }
    assert!("blocked".parse::<ConnectionStatus>().is_err());
  }

  #[test]
  fn self_connection_is_refused() {
    let id = Uuid::new_v4();
    assert!(matches!(ensure_distinct(id, id), Err(Error::SelfConnection(x)) if x == id));
    assert!(ensure_distinct(id, Uuid::new_v4()).is_ok());
  }
}
