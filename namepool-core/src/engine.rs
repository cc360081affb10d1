//! The lease engine: family-name allocation, recycling, and expiry over the
//! store contract.
//!
//! The engine is stateless between calls aside from the store. Each
//! operation runs in one store transaction; retryable conflicts are retried
//! here, with a bounded number of attempts, and never surfaced to callers.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::error::{Error, Result, StoreError};
use crate::manager::NameManager;
use crate::store::{
    family_name_key, family_prefix, split_key, Keyspace, Store, StoreTx, Style, FREE_VALUE,
};
use crate::types::{LeaseRecord, Name, NameRecord};

const CONFLICT_RETRY_ATTEMPTS: usize = 10;
const CONFLICT_RETRY_DELAY: Duration = Duration::from_millis(50);

/// The transactional name allocator and releaser.
///
/// Generic over the store driver; marker-style and lease-style stores both
/// flow through the same allocation logic, with the representation of
/// "free" dispatched on [`Store::style`].
pub struct Engine<S: Store> {
    store: S,
    clock: Arc<dyn Clock>,
    auto_release_after: Option<Duration>,
}

impl<S: Store> Engine<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>, auto_release_after: Option<Duration>) -> Self {
        Self {
            store,
            clock,
            auto_release_after,
        }
    }

    /// Runs a transaction, retrying on conflicts. The closure is re-invoked
    /// from scratch on every attempt.
    fn transact(&self, f: &mut dyn FnMut(&mut dyn StoreTx) -> std::result::Result<(), StoreError>) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self.store.transact(f) {
                Err(StoreError::Conflict) if attempt < CONFLICT_RETRY_ATTEMPTS => {
                    attempt += 1;
                    thread::sleep(CONFLICT_RETRY_DELAY);
                }
                Err(err) => return Err(err.into()),
                Ok(()) => return Ok(()),
            }
        }
    }

    /// Whether a minted name is free. Callers must have checked that the
    /// data record exists: for lease-style stores an unminted name has no
    /// lease row either and would read as free.
    fn is_free(&self, tx: &mut dyn StoreTx, family: &str, name: &str) -> std::result::Result<bool, StoreError> {
        let key = family_name_key(family, name);
        match self.store.style() {
            Style::Marker => Ok(tx.get(Keyspace::Free, &key)?.is_some()),
            Style::Lease => Ok(tx.get(Keyspace::Lease, &key)?.is_none()),
        }
    }

    /// Flips a free name to held. Returns `false` when a lease-style store
    /// lost the race for the lease row.
    fn consume_free(
        &self,
        tx: &mut dyn StoreTx,
        family: &str,
        name: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<bool, StoreError> {
        let key = family_name_key(family, name);
        match self.store.style() {
            Style::Marker => {
                tx.delete(Keyspace::Free, &key)?;
                Ok(true)
            }
            Style::Lease => {
                let lease = LeaseRecord {
                    lease_created_at: now,
                    last_heartbeat_at: now,
                };
                tx.insert_if_absent(Keyspace::Lease, &key, &serde_json::to_vec(&lease)?)
            }
        }
    }

    /// Applies the same state change as `release`: the name stays minted,
    /// its `updated_at` untouched, and becomes reusable.
    fn mark_free(&self, tx: &mut dyn StoreTx, family: &str, name: &str) -> std::result::Result<(), StoreError> {
        let key = family_name_key(family, name);
        match self.store.style() {
            Style::Marker => tx.put(Keyspace::Free, &key, FREE_VALUE),
            Style::Lease => tx.delete(Keyspace::Lease, &key),
        }
    }

    /// Converts every zombie of the family back into a free slot, inside
    /// the caller's transaction so the reaped slot can be consumed
    /// atomically.
    fn release_zombies(
        &self,
        tx: &mut dyn StoreTx,
        family: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<(), StoreError> {
        let Some(auto_release_after) = self.auto_release_after else {
            return Ok(());
        };
        let threshold = chrono::Duration::from_std(auto_release_after)
            .map_err(|e| StoreError::Corrupt(format!("auto-release threshold out of range: {e}")))?;

        let mut reaped = 0usize;
        match self.store.style() {
            Style::Marker => {
                for (key, value) in tx.scan_prefix(Keyspace::Data, &family_prefix(family))? {
                    let record: NameRecord = serde_json::from_slice(&value)?;
                    if now.signed_duration_since(record.updated_at) > threshold
                        && tx.get(Keyspace::Free, &key)?.is_none()
                    {
                        tx.put(Keyspace::Free, &key, FREE_VALUE)?;
                        reaped += 1;
                    }
                }
            }
            Style::Lease => {
                for (key, value) in tx.scan_prefix(Keyspace::Lease, &family_prefix(family))? {
                    let lease: LeaseRecord = serde_json::from_slice(&value)?;
                    if now.signed_duration_since(lease.last_heartbeat_at) > threshold {
                        tx.delete(Keyspace::Lease, &key)?;
                        reaped += 1;
                    }
                }
            }
        }
        if reaped > 0 {
            tracing::debug!(family, reaped, "released zombie names");
        }
        Ok(())
    }

    /// First free name of the family in key order, if any.
    fn first_free(&self, tx: &mut dyn StoreTx, family: &str) -> std::result::Result<Option<String>, StoreError> {
        let prefix = family_prefix(family);
        match self.store.style() {
            Style::Marker => {
                for (key, _) in tx.scan_prefix(Keyspace::Free, &prefix)? {
                    let (_, name) = split_key(&key)?;
                    return Ok(Some(name.to_string()));
                }
                Ok(None)
            }
            Style::Lease => {
                for (key, _) in tx.scan_prefix(Keyspace::Data, &prefix)? {
                    if tx.get(Keyspace::Lease, &key)?.is_none() {
                        let (_, name) = split_key(&key)?;
                        return Ok(Some(name.to_string()));
                    }
                }
                Ok(None)
            }
        }
    }

    /// Returns the pre-increment mint counter of the family and bumps it.
    fn next_counter(&self, tx: &mut dyn StoreTx, family: &str) -> std::result::Result<u64, StoreError> {
        let counter = match tx.get(Keyspace::Counter, family)? {
            None => 0,
            Some(bytes) => std::str::from_utf8(&bytes)
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or_else(|| {
                    StoreError::Corrupt(format!("invalid counter for family '{family}'"))
                })?,
        };
        tx.put(Keyspace::Counter, family, (counter + 1).to_string().as_bytes())?;
        Ok(counter)
    }

    fn read_record(
        &self,
        tx: &mut dyn StoreTx,
        family: &str,
        name: &str,
    ) -> std::result::Result<Option<NameRecord>, StoreError> {
        let key = family_name_key(family, name);
        match tx.get(Keyspace::Data, &key)? {
            None => Ok(None),
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        }
    }

    fn write_record(
        &self,
        tx: &mut dyn StoreTx,
        family: &str,
        name: &str,
        record: &NameRecord,
    ) -> std::result::Result<(), StoreError> {
        let key = family_name_key(family, name);
        tx.put(Keyspace::Data, &key, &serde_json::to_vec(record)?)
    }

    fn refresh_heartbeat(
        &self,
        tx: &mut dyn StoreTx,
        family: &str,
        name: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<(), StoreError> {
        if self.store.style() == Style::Lease {
            let key = family_name_key(family, name);
            if let Some(bytes) = tx.get(Keyspace::Lease, &key)? {
                let mut lease: LeaseRecord = serde_json::from_slice(&bytes)?;
                lease.last_heartbeat_at = now;
                tx.put(Keyspace::Lease, &key, &serde_json::to_vec(&lease)?)?;
            }
        }
        Ok(())
    }
}

enum TryOutcome {
    Acquired,
    NotExist,
    InUse,
}

impl<S: Store> NameManager for Engine<S> {
    fn acquire(&self, family: &str) -> Result<String> {
        let mut acquired: Option<String> = None;
        self.transact(&mut |tx| {
            acquired = None;
            let now = self.clock.now();
            self.release_zombies(tx, family, now)?;

            if let Some(name) = self.first_free(tx, family)? {
                let Some(mut record) = self.read_record(tx, family, &name)? else {
                    return Err(StoreError::Corrupt(format!(
                        "free name {family}:{name} has no record"
                    )));
                };
                if !self.consume_free(tx, family, &name, now)? {
                    // The lease row appeared under us; rerun the allocation.
                    return Err(StoreError::Conflict);
                }
                record.updated_at = now;
                self.write_record(tx, family, &name, &record)?;
                acquired = Some(name);
                return Ok(());
            }

            let name = self.next_counter(tx, family)?.to_string();
            let record = NameRecord {
                created_at: now,
                updated_at: now,
            };
            self.write_record(tx, family, &name, &record)?;
            if self.store.style() == Style::Lease {
                let key = family_name_key(family, &name);
                let lease = LeaseRecord {
                    lease_created_at: now,
                    last_heartbeat_at: now,
                };
                if !tx.insert_if_absent(Keyspace::Lease, &key, &serde_json::to_vec(&lease)?)? {
                    return Err(StoreError::Conflict);
                }
            }
            acquired = Some(name);
            Ok(())
        })?;
        Ok(acquired.expect("acquire transaction committed without a name"))
    }

    fn try_acquire(&self, family: &str, name: &str) -> Result<()> {
        let mut outcome = TryOutcome::Acquired;
        self.transact(&mut |tx| {
            outcome = TryOutcome::Acquired;
            let now = self.clock.now();
            let Some(mut record) = self.read_record(tx, family, name)? else {
                outcome = TryOutcome::NotExist;
                return Ok(());
            };
            if !self.is_free(tx, family, name)? || !self.consume_free(tx, family, name, now)? {
                outcome = TryOutcome::InUse;
                return Ok(());
            }
            record.updated_at = now;
            self.write_record(tx, family, name, &record)
        })?;
        match outcome {
            TryOutcome::Acquired => Ok(()),
            TryOutcome::NotExist => Err(Error::NotExist),
            TryOutcome::InUse => Err(Error::InUse),
        }
    }

    fn keep_alive(&self, family: &str, name: &str) -> Result<()> {
        self.transact(&mut |tx| {
            let now = self.clock.now();
            // Only names that exist and are held get a heartbeat.
            let Some(mut record) = self.read_record(tx, family, name)? else {
                return Ok(());
            };
            if self.is_free(tx, family, name)? {
                return Ok(());
            }
            record.updated_at = now;
            self.write_record(tx, family, name, &record)?;
            self.refresh_heartbeat(tx, family, name, now)
        })
    }

    fn release(&self, family: &str, name: &str) -> Result<()> {
        self.transact(&mut |tx| {
            if self.read_record(tx, family, name)?.is_none() {
                return Ok(());
            }
            if self.is_free(tx, family, name)? {
                return Ok(());
            }
            self.mark_free(tx, family, name)
        })
    }

    fn list(&self) -> Result<Vec<Name>> {
        let mut names = Vec::new();
        self.transact(&mut |tx| {
            names.clear();
            for (key, value) in tx.scan_prefix(Keyspace::Data, "")? {
                let record: NameRecord = serde_json::from_slice(&value)?;
                let (family, name) = {
                    let (family, name) = split_key(&key)?;
                    (family.to_string(), name.to_string())
                };
                let free = self.is_free(tx, &family, &name)?;
                names.push(Name {
                    updated_at: if free {
                        DateTime::<Utc>::UNIX_EPOCH
                    } else {
                        record.updated_at
                    },
                    created_at: record.created_at,
                    name,
                    family,
                    free,
                });
            }
            Ok(())
        })?;
        Ok(names)
    }

    fn reset(&self) -> Result<()> {
        self.store.wipe()?;
        Ok(())
    }

    fn keep_alive_interval(&self) -> Option<Duration> {
        // Three heartbeats per expiry window.
        self.auto_release_after.map(|d| d / 3)
    }

    fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}
