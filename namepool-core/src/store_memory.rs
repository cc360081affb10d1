//! In-process, lease-style store.
//!
//! Keeps everything in ordered maps behind a mutex. Transactions run on a
//! working copy that replaces the shared state only on success, so an
//! aborted transaction leaves nothing behind. Useful for tests and for
//! serving an ephemeral backend.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::StoreError;
use crate::store::{Keyspace, Store, StoreTx, Style, TxFn};

type Map = BTreeMap<String, Vec<u8>>;

#[derive(Debug, Clone, Default)]
struct Maps {
    data: Map,
    free: Map,
    lease: Map,
    counter: Map,
}

impl Maps {
    fn map(&self, ks: Keyspace) -> &Map {
        match ks {
            Keyspace::Data => &self.data,
            Keyspace::Free => &self.free,
            Keyspace::Lease => &self.lease,
            Keyspace::Counter => &self.counter,
        }
    }

    fn map_mut(&mut self, ks: Keyspace) -> &mut Map {
        match ks {
            Keyspace::Data => &mut self.data,
            Keyspace::Free => &mut self.free,
            Keyspace::Lease => &mut self.lease,
            Keyspace::Counter => &mut self.counter,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    maps: Mutex<Maps>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

struct MemoryTx {
    maps: Maps,
}

impl StoreTx for MemoryTx {
    fn get(&mut self, ks: Keyspace, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.maps.map(ks).get(key).cloned())
    }

    fn put(&mut self, ks: Keyspace, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.maps.map_mut(ks).insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, ks: Keyspace, key: &str) -> Result<(), StoreError> {
        self.maps.map_mut(ks).remove(key);
        Ok(())
    }

    fn insert_if_absent(&mut self, ks: Keyspace, key: &str, value: &[u8])
        -> Result<bool, StoreError> {
        let map = self.maps.map_mut(ks);
        if map.contains_key(key) {
            return Ok(false);
        }
        map.insert(key.to_string(), value.to_vec());
        Ok(true)
    }

    fn scan_prefix(&mut self, ks: Keyspace, prefix: &str)
        -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        Ok(self
            .maps
            .map(ks)
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}

impl Store for MemoryStore {
    fn style(&self) -> Style {
        Style::Lease
    }

    fn transact(&self, f: &mut TxFn<'_>) -> Result<(), StoreError> {
        let mut shared = self.maps.lock().unwrap_or_else(|e| e.into_inner());
        let mut tx = MemoryTx {
            maps: shared.clone(),
        };
        f(&mut tx)?;
        *shared = tx.maps;
        Ok(())
    }

    fn wipe(&self) -> Result<(), StoreError> {
        *self.maps.lock().unwrap_or_else(|e| e.into_inner()) = Maps::default();
        Ok(())
    }
}
