//! SQL schema for the Peerlink SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- `*_folded` hold Unicode-lowercased copies for case-insensitive search;
-- SQLite's own LIKE only folds ASCII.
CREATE TABLE IF NOT EXISTS identities (
    identity_id        TEXT PRIMARY KEY,
    name               TEXT NOT NULL,
    name_folded        TEXT NOT NULL,
    email              TEXT,
    city               TEXT,
    institution        TEXT,
    institution_folded TEXT,
    created_at         TEXT NOT NULL
);

-- One row per connection request. Rows are created 'pending' and updated at
-- most once, to 'accepted' or 'rejected'.
CREATE TABLE IF NOT EXISTS connections (
    connection_id TEXT PRIMARY KEY,
    requester_id  TEXT NOT NULL REFERENCES identities(identity_id),
    receiver_id   TEXT NOT NULL REFERENCES identities(identity_id),
    status        TEXT NOT NULL DEFAULT 'pending'
                  CHECK (status IN ('pending', 'accepted', 'rejected')),
    created_at    TEXT NOT NULL,   -- RFC 3339 UTC, fixed width
    responded_at  TEXT,
    CHECK (requester_id <> receiver_id)
);

-- At most one pending or accepted edge per unordered pair.
CREATE UNIQUE INDEX IF NOT EXISTS connections_active_pair_idx
    ON connections (min(requester_id, receiver_id), max(requester_id, receiver_id))
    WHERE status <> 'rejected';

CREATE INDEX IF NOT EXISTS connections_requester_idx ON connections(requester_id);
CREATE INDEX IF NOT EXISTS connections_receiver_idx  ON connections(receiver_id);
CREATE INDEX IF NOT EXISTS identities_city_idx        ON identities(city);
CREATE INDEX IF NOT EXISTS identities_institution_idx ON identities(institution);

PRAGMA user_version = 1;
";
