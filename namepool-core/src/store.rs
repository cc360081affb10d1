//! The transactional store contract consumed by the engine.
//!
//! Drivers expose a small key-value view: point reads and writes, ordered
//! prefix scans, and an insert-if-absent primitive whose duplicate-key
//! outcome is distinguishable from other failures. Everything the engine
//! does, it does through this contract, so marker-style and lease-style
//! drivers both satisfy it.

use crate::error::StoreError;

/// How a driver represents the "free" state of a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// A free-marker row under [`Keyspace::Free`] means the name is free;
    /// `updated_at` on the data record governs expiry.
    Marker,
    /// A lease row under [`Keyspace::Lease`] means the name is held;
    /// insert-if-absent on that row is the mutual-exclusion primitive and
    /// its heartbeat governs expiry.
    Lease,
}

/// Logical keyspaces of the store. Drivers may encode them however they
/// like (tables, collections, key prefixes), as long as scans within a
/// keyspace are key-ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyspace {
    /// `<family>:<name>` -> JSON [`crate::types::NameRecord`].
    Data,
    /// `<family>:<name>` -> placeholder; presence means the name is free.
    Free,
    /// `<family>:<name>` -> JSON [`crate::types::LeaseRecord`].
    Lease,
    /// `<family>` -> itoa-formatted count of names ever minted.
    Counter,
}

/// Placeholder value for free markers; only the key carries meaning.
pub(crate) const FREE_VALUE: &[u8] = b"free";

const FAMILY_NAME_SEP: char = ':';

pub(crate) fn family_name_key(family: &str, name: &str) -> String {
    format!("{family}{FAMILY_NAME_SEP}{name}")
}

pub(crate) fn family_prefix(family: &str) -> String {
    format!("{family}{FAMILY_NAME_SEP}")
}

pub(crate) fn split_key(key: &str) -> Result<(&str, &str), StoreError> {
    key.split_once(FAMILY_NAME_SEP)
        .ok_or_else(|| StoreError::Corrupt(format!("invalid key '{key}'")))
}

/// Operations available inside a single transaction.
pub trait StoreTx {
    fn get(&mut self, ks: Keyspace, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    fn put(&mut self, ks: Keyspace, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Deleting an absent key is not an error.
    fn delete(&mut self, ks: Keyspace, key: &str) -> Result<(), StoreError>;

    /// Returns `false` when the key already exists, leaving the stored
    /// value untouched.
    fn insert_if_absent(&mut self, ks: Keyspace, key: &str, value: &[u8])
        -> Result<bool, StoreError>;

    /// Key-ordered scan of every entry whose key starts with `prefix`.
    fn scan_prefix(&mut self, ks: Keyspace, prefix: &str)
        -> Result<Vec<(String, Vec<u8>)>, StoreError>;
}

/// Closure run inside one atomic unit. May be re-invoked after a
/// [`StoreError::Conflict`], so it must reset any captured output.
pub type TxFn<'a> = dyn FnMut(&mut dyn StoreTx) -> Result<(), StoreError> + 'a;

/// A transactional store. Implemented by the drivers; consumed by the
/// engine.
pub trait Store: Send + Sync {
    fn style(&self) -> Style;

    /// Runs `f` inside a single atomic unit: every read and write commits
    /// together, or none does. An `Err` from `f` aborts the transaction and
    /// is returned as-is; [`StoreError::Conflict`] signals that the caller
    /// may retry.
    fn transact(&self, f: &mut TxFn<'_>) -> Result<(), StoreError>;

    /// Deletes all state held by this store. Succeeds when the target
    /// storage is already absent.
    fn wipe(&self) -> Result<(), StoreError>;
}
