//! SQLite-backed slot store.
//!
//! # Invariants
//! - One row per slot key; writes replace the previous payload.
//! - The connection is opened through `db::open_db*`, so migrations are applied.

use super::{LocalStorage, LocalStorageError};
use crate::db::{open_db, open_db_in_memory};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Durable slot store on top of one SQLite connection.
pub struct SqliteLocalStorage {
    conn: Connection,
}

impl SqliteLocalStorage {
    /// Opens (or creates) the slot store file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LocalStorageError> {
        Ok(Self {
            conn: open_db(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self, LocalStorageError> {
        Ok(Self {
            conn: open_db_in_memory()?,
        })
    }

    /// Wraps a connection that already has migrations applied.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }
}

impl LocalStorage for SqliteLocalStorage {
    fn read_slot(&self, key: &str) -> Result<Option<String>, LocalStorageError> {
        let payload = self
            .conn
            .query_row(
                "SELECT payload FROM local_slots WHERE slot_key = ?1;",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(payload)
    }

    fn write_slot(&self, key: &str, serialized: &str) -> Result<(), LocalStorageError> {
        self.conn.execute(
            "INSERT INTO local_slots (slot_key, payload)
             VALUES (?1, ?2)
             ON CONFLICT(slot_key) DO UPDATE SET
                payload = excluded.payload,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![key, serialized],
        )?;
        Ok(())
    }

    fn delete_slot(&self, key: &str) -> Result<(), LocalStorageError> {
        self.conn
            .execute("DELETE FROM local_slots WHERE slot_key = ?1;", params![key])?;
        Ok(())
    }

    fn slot_keys(&self) -> Result<Vec<String>, LocalStorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT slot_key FROM local_slots ORDER BY slot_key ASC;")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }
}
