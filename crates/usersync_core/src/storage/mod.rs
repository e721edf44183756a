//! On-device key-value persistence for property slots.
//!
//! # Responsibility
//! - Define the synchronous, best-effort slot contract used by properties.
//! - Provide an in-memory backend (with optional quota) and a SQLite backend.
//!
//! # Invariants
//! - Slot operations never panic; failures are returned as
//!   `LocalStorageError` and callers decide whether to log or surface them.

use crate::db::DbError;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod sqlite;

pub use sqlite::SqliteLocalStorage;

/// Local persistence failure.
#[derive(Debug)]
pub enum LocalStorageError {
    /// Writing would exceed the store capacity.
    QuotaExceeded { key: String, quota_bytes: usize },
    /// Payload could not be (de)serialized.
    Serialization(String),
    /// Backend failure.
    Db(DbError),
}

impl Display for LocalStorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuotaExceeded { key, quota_bytes } => {
                write!(f, "local storage quota of {quota_bytes} bytes exceeded writing `{key}`")
            }
            Self::Serialization(message) => write!(f, "local slot serialization failed: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LocalStorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for LocalStorageError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for LocalStorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Synchronous slot store keyed by string.
pub trait LocalStorage {
    fn read_slot(&self, key: &str) -> Result<Option<String>, LocalStorageError>;
    fn write_slot(&self, key: &str, serialized: &str) -> Result<(), LocalStorageError>;
    fn delete_slot(&self, key: &str) -> Result<(), LocalStorageError>;
    /// Returns every stored slot key in ascending order.
    fn slot_keys(&self) -> Result<Vec<String>, LocalStorageError>;
}

/// Process-local slot store, mainly for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryLocalStorage {
    slots: RefCell<BTreeMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryLocalStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store rejecting writes once keys plus payloads exceed `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            slots: RefCell::new(BTreeMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn used_bytes_without(&self, key: &str) -> usize {
        self.slots
            .borrow()
            .iter()
            .filter(|(slot_key, _)| slot_key.as_str() != key)
            .map(|(slot_key, payload)| slot_key.len() + payload.len())
            .sum()
    }
}

impl LocalStorage for MemoryLocalStorage {
    fn read_slot(&self, key: &str) -> Result<Option<String>, LocalStorageError> {
        Ok(self.slots.borrow().get(key).cloned())
    }

    fn write_slot(&self, key: &str, serialized: &str) -> Result<(), LocalStorageError> {
        if let Some(quota_bytes) = self.quota_bytes {
            let needed = self.used_bytes_without(key) + key.len() + serialized.len();
            if needed > quota_bytes {
                return Err(LocalStorageError::QuotaExceeded {
                    key: key.to_string(),
                    quota_bytes,
                });
            }
        }
        self.slots
            .borrow_mut()
            .insert(key.to_string(), serialized.to_string());
        Ok(())
    }

    fn delete_slot(&self, key: &str) -> Result<(), LocalStorageError> {
        self.slots.borrow_mut().remove(key);
        Ok(())
    }

    fn slot_keys(&self) -> Result<Vec<String>, LocalStorageError> {
        Ok(self.slots.borrow().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{LocalStorage, LocalStorageError, MemoryLocalStorage};

    #[test]
    fn memory_store_reads_back_and_deletes() {
        let store = MemoryLocalStorage::new();
        store.write_slot("a", "1").expect("write");
        assert_eq!(store.read_slot("a").expect("read").as_deref(), Some("1"));

        store.delete_slot("a").expect("delete");
        store.delete_slot("a").expect("delete is idempotent");
        assert!(store.read_slot("a").expect("read").is_none());
    }

    #[test]
    fn quota_counts_existing_slots_but_not_the_one_being_replaced() {
        let store = MemoryLocalStorage::with_quota(8);
        store.write_slot("a", "123").expect("4 bytes fit");
        store.write_slot("a", "1234567").expect("replacement fits in 8 bytes");

        let err = store.write_slot("b", "1").expect_err("quota should be exceeded");
        assert!(matches!(err, LocalStorageError::QuotaExceeded { .. }));
        assert_eq!(store.slot_keys().expect("keys"), vec!["a".to_string()]);
    }
}
