use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use rusqlite::{Connection, OptionalExtension, Result as SqliteResult};
use std::path::Path;
use std::sync::Mutex;

use crate::application::errors::StorageError;
use crate::domain::traits::{ConfigData, ConfigStore};

static TABLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").expect("valid table name regex"));

/// SQLite-backed configuration store: one `(name, value)` row per key
pub struct SqliteConfigStore {
    conn: Mutex<Connection>,
    table: String,
}

impl SqliteConfigStore {
    pub fn open(path: impl AsRef<Path>, table: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn, table)
    }

    pub fn in_memory(table: &str) -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?, table)
    }

    fn with_connection(conn: Connection, table: &str) -> Result<Self, StorageError> {
        // The table name is interpolated into SQL, so it must be a plain identifier
        if !TABLE_NAME.is_match(table) {
            return Err(StorageError::Internal(format!("invalid table name: {}", table)));
        }
        Ok(Self {
            conn: Mutex::new(conn),
            table: table.to_string(),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection, &str) -> SqliteResult<T>,
    ) -> Result<T, StorageError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::Internal("Lock poisoned".to_string()))?;
        Ok(f(&*conn, &self.table)?)
    }
}

#[async_trait]
impl ConfigStore for SqliteConfigStore {
    async fn ready(&self) -> Result<(), StorageError> {
        self.with_conn(|conn, table| {
            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        name TEXT PRIMARY KEY,
                        value TEXT
                    )",
                    table
                ),
                [],
            )?;
            Ok(())
        })
    }

    async fn defaults(&self, data: &ConfigData, reset: bool) -> Result<(), StorageError> {
        self.with_conn(|conn, table| {
            if reset {
                conn.execute(&format!("DELETE FROM {}", table), [])?;
            }
            let mut stmt =
                conn.prepare(&format!("INSERT OR IGNORE INTO {} (name, value) VALUES (?1, ?2)", table))?;
            for (key, value) in data {
                stmt.execute(rusqlite::params![key, value])?;
            }
            Ok(())
        })
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.with_conn(|conn, table| {
            let mut stmt = conn.prepare(&format!("SELECT name FROM {} ORDER BY name", table))?;
            let rows = stmt.query_map([], |row| row.get(0))?;

            let mut keys = Vec::new();
            for key in rows {
                keys.push(key?);
            }
            Ok(keys)
        })
    }

    async fn get_value(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.with_conn(|conn, table| {
            conn.query_row(
                &format!("SELECT value FROM {} WHERE name = ?1", table),
                [key],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()
            .map(Option::flatten)
        })
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.with_conn(|conn, table| {
            conn.execute(
                &format!("INSERT OR REPLACE INTO {} (name, value) VALUES (?1, ?2)", table),
                rusqlite::params![key, value],
            )?;
            Ok(())
        })
    }

    async fn delete_value(&self, key: &str) -> Result<bool, StorageError> {
        self.with_conn(|conn, table| {
            let rows = conn.execute(&format!("DELETE FROM {} WHERE name = ?1", table), [key])?;
            Ok(rows > 0)
        })
    }
}
