//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that lexical order equals chronological order.
//! UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use peerlink_core::{
  connection::{Connection, ConnectionStatus, PeerConnection},
  identity::Identity,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

/// The current time at the precision the store keeps, so values handed back
/// to callers compare equal to what a later read returns.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── LIKE patterns ───────────────────────────────────────────────────────────

/// Case-fold text for the `*_folded` search columns.
pub fn fold(text: &str) -> String { text.to_lowercase() }

/// Wrap folded user text in `%…%` for a substring `LIKE … ESCAPE '\'`,
/// escaping the wildcard characters it contains. Blank text yields `None`
/// (no filter).
pub fn like_pattern(text: Option<&str>) -> Option<String> {
  let text = fold(text.map(str::trim).filter(|t| !t.is_empty())?);
  let mut pattern = String::with_capacity(text.len() + 2);
  pattern.push('%');
  for ch in text.chars() {
    if matches!(ch, '\\' | '%' | '_') {
      pattern.push('\\');
    }
    pattern.push(ch);
  }
  pattern.push('%');
  Some(pattern)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawIdentity::from_row`].
pub const IDENTITY_COLUMNS: &str =
  "identity_id, name, email, city, institution, created_at";

/// Raw strings read directly from an `identities` row.
pub struct RawIdentity {
  pub identity_id: String,
  pub name:        String,
  pub email:       Option<String>,
  pub city:        Option<String>,
  pub institution: Option<String>,
  pub created_at:  String,
}

impl RawIdentity {
  /// Read six identity columns starting at column `base`.
  pub fn from_row(row: &rusqlite::Row<'_>, base: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      identity_id: row.get(base)?,
      name:        row.get(base + 1)?,
      email:       row.get(base + 2)?,
      city:        row.get(base + 3)?,
      institution: row.get(base + 4)?,
      created_at:  row.get(base + 5)?,
    })
  }

  pub fn into_identity(self) -> Result<Identity> {
    Ok(Identity {
      identity_id: decode_uuid(&self.identity_id)?,
      name:        self.name,
      email:       self.email,
      city:        self.city,
      institution: self.institution,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Column list matching [`RawConnection::from_row`].
pub const CONNECTION_COLUMNS: &str =
  "connection_id, requester_id, receiver_id, status, created_at, responded_at";

/// Raw strings read directly from a `connections` row.
pub struct RawConnection {
  pub connection_id: String,
  pub requester_id:  String,
  pub receiver_id:   String,
  pub status:        String,
  pub created_at:    String,
  pub responded_at:  Option<String>,
}

impl RawConnection {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      connection_id: row.get(0)?,
      requester_id:  row.get(1)?,
      receiver_id:   row.get(2)?,
      status:        row.get(3)?,
      created_at:    row.get(4)?,
      responded_at:  row.get(5)?,
    })
  }

  pub fn into_connection(self) -> Result<Connection> {
    Ok(Connection {
      connection_id: decode_uuid(&self.connection_id)?,
      requester_id:  decode_uuid(&self.requester_id)?,
      receiver_id:   decode_uuid(&self.receiver_id)?,
      status:        self.status.parse::<ConnectionStatus>()?,
      created_at:    decode_dt(&self.created_at)?,
      responded_at:  self.responded_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

/// A connection row joined with the identity on the other side.
pub struct RawPeerConnection {
  pub connection_id: String,
  pub status:        String,
  pub created_at:    String,
  pub peer:          RawIdentity,
}

impl RawPeerConnection {
  /// Expects `connection_id, status, created_at` followed by the identity
  /// columns.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      connection_id: row.get(0)?,
      status:        row.get(1)?,
      created_at:    row.get(2)?,
      peer:          RawIdentity::from_row(row, 3)?,
    })
  }

  pub fn into_peer_connection(self) -> Result<PeerConnection> {
    Ok(PeerConnection {
      connection_id: decode_uuid(&self.connection_id)?,
      status:        self.status.parse::<ConnectionStatus>()?,
      created_at:    decode_dt(&self.created_at)?,
      peer:          self.peer.into_identity()?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timestamps_sort_lexically() {
    let a = "2025-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
    let b = a + chrono::Duration::milliseconds(1500);
    assert_eq!(encode_dt(a), "2025-01-01T00:00:00.000000Z");
    assert!(encode_dt(a) < encode_dt(b));
    assert_eq!(decode_dt(&encode_dt(b)).unwrap(), b);
  }

  #[test]
  fn like_pattern_escapes_wildcards() {
    assert_eq!(like_pattern(Some("ox")).as_deref(), Some("%ox%"));
    assert_eq!(like_pattern(Some("50%_a\\b")).as_deref(), Some("%50\\%\\_a\\\\b%"));
    assert_eq!(like_pattern(Some("   ")), None);
    assert_eq!(like_pattern(None), None);
  }

  #[test]
  fn like_pattern_folds_non_ascii_case() {
    assert_eq!(like_pattern(Some(" ÉCOLE ")).as_deref(), Some("%école%"));
    assert_eq!(fold("Émile Zola"), "émile zola");
    assert_eq!(fold("ÅNGSTRÖM"), "ångström");
  }
}
