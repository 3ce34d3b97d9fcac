//! Identity: the account record a connection points at.
//!
//! Identities are owned by the account subsystem. The connection graph only
//! reads them; [`NewIdentity`] exists so a store can be seeded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user as seen by the connection graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
  pub identity_id: Uuid,
  /// Display name.
  pub name:        String,
  pub email:       Option<String>,
  pub city:        Option<String>,
  /// University or other institution the user belongs to.
  pub institution: Option<String>,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::PeerStore::add_identity`].
/// `identity_id` and `created_at` are always assigned by the store.
#[derive(Debug, Clone, Default)]
pub struct NewIdentity {
  pub name:        String,
  pub email:       Option<String>,
  pub city:        Option<String>,
  pub institution: Option<String>,
}

impl NewIdentity {
  /// Convenience constructor with every optional field unset.
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into(), ..Self::default() }
  }

  pub fn with_city(mut self, city: impl Into<String>) -> Self {
    self.city = Some(city.into());
    self
  }

  pub fn with_institution(mut self, institution: impl Into<String>) -> Self {
    self.institution = Some(institution.into());
    self
  }
}
