use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A name as registered with a backend.
///
/// The serialized field names (`Name`, `Family`, `CreatedAt`, `UpdatedAt`,
/// `Free`) and the RFC 3339 timestamps are part of the server wire protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
    /// The name. Names are base-10 integer strings, unique within a family.
    #[serde(rename = "Name")]
    pub name: String,

    /// The family the name belongs to.
    #[serde(rename = "Family")]
    pub family: String,

    /// When the name was first minted.
    #[serde(rename = "CreatedAt")]
    pub created_at: DateTime<Utc>,

    /// When the name was last acquired or kept alive. Cleared to the zero
    /// instant in listings when the name is free.
    #[serde(rename = "UpdatedAt")]
    pub updated_at: DateTime<Utc>,

    /// Whether the name is currently free.
    #[serde(rename = "Free")]
    pub free: bool,
}

/// Metadata stored under `data/<family>/<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRecord {
    /// Set once, when the name is minted.
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    /// Refreshed on every successful acquire and keep-alive, never on
    /// release.
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Lease row stored under `lease/<family>/<name>` by lease-style drivers.
/// Its presence is what makes a name held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    #[serde(rename = "leaseCreatedAt")]
    pub lease_created_at: DateTime<Utc>,

    /// Governs expiry: a lease whose heartbeat is older than the
    /// auto-release threshold is reaped by the next sweep.
    #[serde(rename = "lastHeartbeatAt")]
    pub last_heartbeat_at: DateTime<Utc>,
}
