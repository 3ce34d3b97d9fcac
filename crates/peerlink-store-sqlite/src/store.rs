//! [`SqliteStore`], the SQLite implementation of [`PeerStore`].

use std::path::Path;

use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use peerlink_core::{
  connection::{Connection, ConnectionStatus, PeerConnection, RespondAction, ensure_distinct},
  identity::{Identity, NewIdentity},
  store::{DirectoryQuery, PeerStore},
};

use crate::{
  Error, Result,
  encode::{
    CONNECTION_COLUMNS, IDENTITY_COLUMNS, RawConnection, RawIdentity, RawPeerConnection,
    decode_uuid, encode_dt, encode_uuid, fold, like_pattern, now,
  },
  schema::SCHEMA,
};

// ─── Transaction outcomes ────────────────────────────────────────────────────

/// What happened inside the `request_connection` transaction. Domain failures
/// are reported as values so the closure only returns database errors.
#[derive(Debug, PartialEq, Eq)]
enum RequestOutcome {
  Created,
  MissingIdentity(String),
  Duplicate,
}

impl RequestOutcome {
  /// Turn the outcome into the caller-facing result for `connection`.
  fn into_result(self, connection: Connection) -> Result<Connection> {
    let requester_id = connection.requester_id;
    let receiver_id = connection.receiver_id;
    match self {
      RequestOutcome::Created => {
        tracing::info!(
          connection_id = %connection.connection_id,
          %requester_id,
          %receiver_id,
          "connection requested"
        );
        Ok(connection)
      }
      RequestOutcome::MissingIdentity(id) => {
        Err(peerlink_core::Error::IdentityNotFound(decode_uuid(&id)?).into())
      }
      RequestOutcome::Duplicate => {
        tracing::warn!(%requester_id, %receiver_id, "duplicate connection request");
        Err(peerlink_core::Error::DuplicateConnection {
          requester: requester_id,
          receiver:  receiver_id,
        }
        .into())
      }
    }
  }
}

/// What happened inside the `respond` transaction. `Refused` carries the
/// error from [`Connection::respond`] (or from decoding the row).
enum RespondOutcome {
  Updated(Connection),
  Missing,
  Refused(Error),
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Peerlink store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. Every
/// `call` runs on the same background thread, so writes are serialised.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run an identity query whose single parameter list is `params`.
  async fn query_identities(
    &self,
    sql: String,
    params: Vec<rusqlite::types::Value>,
  ) -> Result<Vec<Identity>> {
    let raws: Vec<RawIdentity> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), |row| {
            RawIdentity::from_row(row, 0)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawIdentity::into_identity).collect()
  }

  /// Run a connection listing for `identity_id`. The SQL must select
  /// `connection_id, status, created_at` and then the peer's identity
  /// columns, and bind the user as `?1`.
  async fn query_peer_connections(
    &self,
    sql: &'static str,
    identity_id: Uuid,
  ) -> Result<Vec<PeerConnection>> {
    let id_str = encode_uuid(identity_id);

    let raws: Vec<RawPeerConnection> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawPeerConnection::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawPeerConnection::into_peer_connection)
      .collect()
  }
}

/// Whether `err` is a violation of a UNIQUE index (as opposed to a foreign
/// key or CHECK failure).
fn is_unique_violation(err: &rusqlite::Error) -> bool {
  matches!(
    err,
    rusqlite::Error::SqliteFailure(e, _)
      if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}

/// Insert a pending connection row. A hit on `connections_active_pair_idx`
/// is reported as [`RequestOutcome::Duplicate`].
fn insert_pending(
  conn: &rusqlite::Connection,
  connection_id: &str,
  requester_id: &str,
  receiver_id: &str,
  created_at: &str,
) -> rusqlite::Result<RequestOutcome> {
  let inserted = conn.execute(
    "INSERT INTO connections (connection_id, requester_id, receiver_id, status, created_at)
     VALUES (?1, ?2, ?3, 'pending', ?4)",
    rusqlite::params![connection_id, requester_id, receiver_id, created_at],
  );
  match inserted {
    Ok(_) => Ok(RequestOutcome::Created),
    Err(e) if is_unique_violation(&e) => Ok(RequestOutcome::Duplicate),
    Err(e) => Err(e),
  }
}

// ─── Listing SQL ─────────────────────────────────────────────────────────────

const RECEIVED_SQL: &str = "
  SELECT c.connection_id, c.status, c.created_at,
         u.identity_id, u.name, u.email, u.city, u.institution, u.created_at
  FROM connections c
  JOIN identities u ON u.identity_id = c.requester_id
  WHERE c.receiver_id = ?1
  ORDER BY (c.status = 'pending') DESC, c.created_at DESC, c.rowid DESC";

const SENT_SQL: &str = "
  SELECT c.connection_id, c.status, c.created_at,
         u.identity_id, u.name, u.email, u.city, u.institution, u.created_at
  FROM connections c
  JOIN identities u ON u.identity_id = c.receiver_id
  WHERE c.requester_id = ?1
  ORDER BY (c.status = 'pending') DESC, c.created_at DESC, c.rowid DESC";

const ACCEPTED_SQL: &str = "
  SELECT c.connection_id, c.status, c.created_at,
         u.identity_id, u.name, u.email, u.city, u.institution, u.created_at
  FROM connections c
  JOIN identities u ON u.identity_id =
       CASE WHEN c.requester_id = ?1 THEN c.receiver_id ELSE c.requester_id END
  WHERE (c.requester_id = ?1 OR c.receiver_id = ?1)
    AND c.status = 'accepted'
  ORDER BY c.created_at DESC, c.rowid DESC";

// ─── PeerStore impl ──────────────────────────────────────────────────────────

impl PeerStore for SqliteStore {
  type Error = Error;

  // ── Identities ────────────────────────────────────────────────────────────

  async fn add_identity(&self, input: NewIdentity) -> Result<Identity> {
    let identity = Identity {
      identity_id: Uuid::new_v4(),
      name:        input.name,
      email:       input.email,
      city:        input.city,
      institution: input.institution,
      created_at:  now(),
    };

    let id_str      = encode_uuid(identity.identity_id);
    let at_str      = encode_dt(identity.created_at);
    let name        = identity.name.clone();
    let name_folded = fold(&identity.name);
    let email       = identity.email.clone();
    let city        = identity.city.clone();
    let institution = identity.institution.clone();
    let inst_folded = identity.institution.as_deref().map(fold);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO identities
             (identity_id, name, name_folded, email, city, institution, institution_folded, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            id_str, name, name_folded, email, city, institution, inst_folded, at_str
          ],
        )?;
        Ok(())
      })
      .await?;

    tracing::debug!(identity_id = %identity.identity_id, "identity added");
    Ok(identity)
  }

  async fn get_identity(&self, id: Uuid) -> Result<Option<Identity>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawIdentity> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE identity_id = ?1"),
            rusqlite::params![id_str],
            |row| RawIdentity::from_row(row, 0),
          )
          .optional()?)
      })
      .await?;

    raw.map(RawIdentity::into_identity).transpose()
  }

  // ── Directory lookup ──────────────────────────────────────────────────────

  async fn search(&self, query: &DirectoryQuery) -> Result<Vec<Identity>> {
    let pattern    = like_pattern(query.text.as_deref());
    // A negative LIMIT means no limit in SQLite.
    let limit_val  = query.limit.map_or(-1, |l| l as i64);
    let offset_val = query.offset.unwrap_or(0) as i64;

    let sql = format!(
      "SELECT {IDENTITY_COLUMNS}
       FROM identities
       WHERE ?1 IS NULL
          OR name_folded        LIKE ?1 ESCAPE '\\'
          OR institution_folded LIKE ?1 ESCAPE '\\'
       ORDER BY name COLLATE NOCASE, rowid
       LIMIT ?2 OFFSET ?3"
    );

    tracing::debug!(?pattern, limit = limit_val, offset = offset_val, "directory search");
    self
      .query_identities(sql, vec![
        pattern.map_or(rusqlite::types::Value::Null, rusqlite::types::Value::Text),
        rusqlite::types::Value::Integer(limit_val),
        rusqlite::types::Value::Integer(offset_val),
      ])
      .await
  }

  async fn peers_in_city(&self, city: &str, exclude: Uuid) -> Result<Vec<Identity>> {
    let sql = format!(
      "SELECT {IDENTITY_COLUMNS} FROM identities
       WHERE city = ?1 AND identity_id <> ?2
       ORDER BY name COLLATE NOCASE, rowid"
    );
    self
      .query_identities(sql, vec![
        rusqlite::types::Value::Text(city.to_owned()),
        rusqlite::types::Value::Text(encode_uuid(exclude)),
      ])
      .await
  }

  async fn peers_in_institution(
    &self,
    institution: &str,
    exclude:     Uuid,
  ) -> Result<Vec<Identity>> {
    let sql = format!(
      "SELECT {IDENTITY_COLUMNS} FROM identities
       WHERE institution = ?1 AND identity_id <> ?2
       ORDER BY name COLLATE NOCASE, rowid"
    );
    self
      .query_identities(sql, vec![
        rusqlite::types::Value::Text(institution.to_owned()),
        rusqlite::types::Value::Text(encode_uuid(exclude)),
      ])
      .await
  }

  // ── Requests and responses ────────────────────────────────────────────────

  async fn request_connection(
    &self,
    requester_id: Uuid,
    receiver_id:  Uuid,
  ) -> Result<Connection> {
    ensure_distinct(requester_id, receiver_id)?;

    let connection = Connection {
      connection_id: Uuid::new_v4(),
      requester_id,
      receiver_id,
      status:        ConnectionStatus::Pending,
      created_at:    now(),
      responded_at:  None,
    };

    let conn_id_str      = encode_uuid(connection.connection_id);
    let requester_id_str = encode_uuid(requester_id);
    let receiver_id_str  = encode_uuid(receiver_id);
    let at_str           = encode_dt(connection.created_at);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        for id in [&requester_id_str, &receiver_id_str] {
          let exists = tx
            .query_row(
              "SELECT 1 FROM identities WHERE identity_id = ?1",
              rusqlite::params![id],
              |_| Ok(()),
            )
            .optional()?
            .is_some();
          if !exists {
            return Ok(RequestOutcome::MissingIdentity(id.clone()));
          }
        }

        let active: bool = tx.query_row(
          "SELECT EXISTS (
             SELECT 1 FROM connections
             WHERE ((requester_id = ?1 AND receiver_id = ?2)
                 OR (requester_id = ?2 AND receiver_id = ?1))
               AND status <> 'rejected'
           )",
          rusqlite::params![requester_id_str, receiver_id_str],
          |row| row.get(0),
        )?;
        if active {
          return Ok(RequestOutcome::Duplicate);
        }

        let outcome =
          insert_pending(&tx, &conn_id_str, &requester_id_str, &receiver_id_str, &at_str)?;
        if outcome == RequestOutcome::Created {
          tx.commit()?;
        }
        Ok(outcome)
      })
      .await?;

    outcome.into_result(connection)
  }

  async fn respond(
    &self,
    connection_id: Uuid,
    action:        RespondAction,
  ) -> Result<Connection> {
    let id_str       = encode_uuid(connection_id);
    let responded_at = now();
    let at_str       = encode_dt(responded_at);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let raw = tx
          .query_row(
            &format!("SELECT {CONNECTION_COLUMNS} FROM connections WHERE connection_id = ?1"),
            rusqlite::params![id_str],
            RawConnection::from_row,
          )
          .optional()?;
        let Some(raw) = raw else {
          return Ok(RespondOutcome::Missing);
        };
        let mut connection = match raw.into_connection() {
          Ok(c) => c,
          Err(e) => return Ok(RespondOutcome::Refused(e)),
        };
        let next = match connection.respond(action) {
          Ok(next) => next,
          Err(e) => return Ok(RespondOutcome::Refused(e.into())),
        };

        let changed = tx.execute(
          "UPDATE connections SET status = ?1, responded_at = ?2
           WHERE connection_id = ?3 AND status = 'pending'",
          rusqlite::params![next.as_str(), at_str, id_str],
        )?;
        if changed == 0 {
          return Ok(RespondOutcome::Refused(
            peerlink_core::Error::AlreadyResolved {
              connection_id,
              status: connection.status,
            }
            .into(),
          ));
        }

        tx.commit()?;
        connection.status = next;
        connection.responded_at = Some(responded_at);
        Ok(RespondOutcome::Updated(connection))
      })
      .await?;

    match outcome {
      RespondOutcome::Updated(connection) => {
        tracing::info!(%connection_id, status = %connection.status, "connection resolved");
        Ok(connection)
      }
      RespondOutcome::Missing => {
        Err(peerlink_core::Error::ConnectionNotFound(connection_id).into())
      }
      RespondOutcome::Refused(e) => {
        tracing::warn!(%connection_id, error = %e, "response refused");
        Err(e)
      }
    }
  }

  async fn get_connection(&self, connection_id: Uuid) -> Result<Option<Connection>> {
    let id_str = encode_uuid(connection_id);

    let raw: Option<RawConnection> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {CONNECTION_COLUMNS} FROM connections WHERE connection_id = ?1"),
            rusqlite::params![id_str],
            RawConnection::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawConnection::into_connection).transpose()
  }

  async fn disconnect(&self, connection_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(connection_id);

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM connections WHERE connection_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    if removed > 0 {
      tracing::info!(%connection_id, "connection removed");
    }
    Ok(removed > 0)
  }

  // ── Views ─────────────────────────────────────────────────────────────────

  async fn list_received(&self, identity_id: Uuid) -> Result<Vec<PeerConnection>> {
    self.query_peer_connections(RECEIVED_SQL, identity_id).await
  }

  async fn list_sent(&self, identity_id: Uuid) -> Result<Vec<PeerConnection>> {
    self.query_peer_connections(SENT_SQL, identity_id).await
  }

  async fn list_accepted(&self, identity_id: Uuid) -> Result<Vec<PeerConnection>> {
    self.query_peer_connections(ACCEPTED_SQL, identity_id).await
  }

  async fn count_accepted(&self, identity_id: Uuid) -> Result<u64> {
    let id_str = encode_uuid(identity_id);

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM connections
           WHERE (requester_id = ?1 OR receiver_id = ?1)
             AND status = 'accepted'",
          rusqlite::params![id_str],
          |row| row.get(0),
        )?)
      })
      .await?;

    Ok(count.max(0) as u64)
  }
}
