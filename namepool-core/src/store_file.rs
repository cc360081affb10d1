//! Marker-style store in a single local file.
//!
//! Backed by a redb database with one table per keyspace. The database is
//! opened and closed around every transaction: redb holds an exclusive lock
//! on the file while it is open, and releasing it between operations is what
//! lets other processes sharing the file take their turn. An open attempt
//! that loses the race maps to [`StoreError::Conflict`] so the engine
//! retries it.

use std::path::PathBuf;

use redb::{Database, DatabaseError, ReadableTable, Table, TableDefinition, WriteTransaction};

use crate::error::StoreError;
use crate::store::{Keyspace, Store, StoreTx, Style, TxFn};

const DATA: TableDefinition<&str, &[u8]> = TableDefinition::new("data");
const FREE_NAMES: TableDefinition<&str, &[u8]> = TableDefinition::new("freeNames");
const LEASES: TableDefinition<&str, &[u8]> = TableDefinition::new("leases");
const COUNTERS: TableDefinition<&str, &[u8]> = TableDefinition::new("counters");

#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn open(&self) -> Result<Database, StoreError> {
        let existed = self.path.exists();
        let db = Database::create(&self.path).map_err(|err| match err {
            DatabaseError::DatabaseAlreadyOpen => StoreError::Conflict,
            other => StoreError::Backend(other.to_string()),
        })?;
        #[cfg(unix)]
        if !existed {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o666))?;
        }
        #[cfg(not(unix))]
        let _ = existed;
        Ok(db)
    }
}

struct FileTx<'a> {
    txn: &'a WriteTransaction,
}

impl<'a> FileTx<'a> {
    fn table(&self, ks: Keyspace) -> Result<Table<'a, &'static str, &'static [u8]>, StoreError> {
        let definition = match ks {
            Keyspace::Data => DATA,
            Keyspace::Free => FREE_NAMES,
            Keyspace::Lease => LEASES,
            Keyspace::Counter => COUNTERS,
        };
        self.txn
            .open_table(definition)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

impl StoreTx for FileTx<'_> {
    fn get(&mut self, ks: Keyspace, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let table = self.table(ks)?;
        let value = table
            .get(key)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }

    fn put(&mut self, ks: Keyspace, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut table = self.table(ks)?;
        table
            .insert(key, value)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    fn delete(&mut self, ks: Keyspace, key: &str) -> Result<(), StoreError> {
        let mut table = self.table(ks)?;
        table
            .remove(key)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    fn insert_if_absent(&mut self, ks: Keyspace, key: &str, value: &[u8])
        -> Result<bool, StoreError> {
        let mut table = self.table(ks)?;
        let occupied = table
            .get(key)
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .is_some();
        if occupied {
            return Ok(false);
        }
        table
            .insert(key, value)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(true)
    }

    fn scan_prefix(&mut self, ks: Keyspace, prefix: &str)
        -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let table = self.table(ks)?;
        let mut entries = Vec::new();
        for item in table
            .range(prefix..)
            .map_err(|e| StoreError::Backend(e.to_string()))?
        {
            let (key, value) = item.map_err(|e| StoreError::Backend(e.to_string()))?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key.to_string(), value.value().to_vec()));
        }
        Ok(entries)
    }
}

impl Store for FileStore {
    fn style(&self) -> Style {
        Style::Marker
    }

    fn transact(&self, f: &mut TxFn<'_>) -> Result<(), StoreError> {
        let db = self.open()?;
        let txn = db
            .begin_write()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let outcome = {
            let mut tx = FileTx { txn: &txn };
            f(&mut tx)
        };
        // The file lock is released when `db` goes out of scope either way.
        match outcome {
            Ok(()) => txn
                .commit()
                .map_err(|e| StoreError::Backend(e.to_string())),
            Err(err) => {
                let _ = txn.abort();
                Err(err)
            }
        }
    }

    fn wipe(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::Io(err)),
        }
    }
}
