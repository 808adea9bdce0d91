//! Manual ABI overrides, in memory or persisted in SQLite

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, RwLock};

use alloy_json_abi::JsonAbi;
use alloy_primitives::Address;
use anyhow::{Context, Result};
use rusqlite::{params, Connection};

/// Read side of the per-address manual ABI store
pub trait ManualAbiStore: Send + Sync {
    /// User-supplied ABI for `address`, if any
    fn get(&self, address: &Address) -> Option<JsonAbi>;
}

/// Store key: lowercased 0x-prefixed address
pub fn store_key(address: &Address) -> String {
    format!("0x{}", hex::encode(address))
}

/// Volatile store, used by tests and when no database is configured
#[derive(Debug, Default)]
pub struct InMemoryAbiStore {
    abis: RwLock<HashMap<String, JsonAbi>>,
}

impl InMemoryAbiStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, address: &Address, abi: JsonAbi) {
        let mut abis = match self.abis.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        abis.insert(store_key(address), abi);
    }

    pub fn remove(&self, address: &Address) -> bool {
        let mut abis = match self.abis.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        abis.remove(&store_key(address)).is_some()
    }
}

impl ManualAbiStore for InMemoryAbiStore {
    fn get(&self, address: &Address) -> Option<JsonAbi> {
        let abis = match self.abis.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        abis.get(&store_key(address)).cloned()
    }
}

/// Manual ABI row as persisted
#[derive(Debug, Clone)]
pub struct StoredAbi {
    pub address: String,
    pub abi_json: String,
    pub label: Option<String>,
}

/// SQLite-backed manual ABI store
#[derive(Debug)]
pub struct SqliteAbiStore {
    conn: Mutex<Connection>,
}

impl SqliteAbiStore {
    /// Open or create the database
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
        let conn = Connection::open(path).with_context(|| format!("open db {}", path.display()))?;
        Self::with_connection(conn)
    }

    /// Throwaway database, handy for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory db")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS manual_abis (
                address     TEXT PRIMARY KEY,
                abi_json    TEXT NOT NULL,
                label       TEXT,
                updated_at  INTEGER DEFAULT (strftime('%s', 'now'))
            );
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Save (or replace) the ABI for an address
    pub fn set(&self, address: &Address, abi: &JsonAbi, label: Option<&str>) -> Result<()> {
        let abi_json = serde_json::to_string(abi).context("serialize ABI")?;
        self.conn().execute(
            "INSERT INTO manual_abis(address, abi_json, label) VALUES (?1, ?2, ?3)
             ON CONFLICT(address) DO UPDATE SET
                abi_json=excluded.abi_json,
                label=excluded.label,
                updated_at=strftime('%s', 'now')",
            params![store_key(address), abi_json, label],
        )?;
        Ok(())
    }

    pub fn remove(&self, address: &Address) -> Result<bool> {
        let deleted = self.conn().execute(
            "DELETE FROM manual_abis WHERE address = ?1",
            params![store_key(address)],
        )?;
        Ok(deleted > 0)
    }

    pub fn load(&self, address: &Address) -> Result<Option<StoredAbi>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT address, abi_json, label FROM manual_abis WHERE address = ?1")?;
        let mut rows = stmt.query(params![store_key(address)])?;
        if let Some(row) = rows.next()? {
            Ok(Some(StoredAbi {
                address: row.get(0)?,
                abi_json: row.get(1)?,
                label: row.get(2)?,
            }))
        } else {
            Ok(None)
        }
    }

    pub fn list(&self) -> Result<Vec<StoredAbi>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT address, abi_json, label FROM manual_abis ORDER BY address")?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(StoredAbi {
                address: row.get(0)?,
                abi_json: row.get(1)?,
                label: row.get(2)?,
            });
        }
        Ok(out)
    }
}

impl ManualAbiStore for SqliteAbiStore {
    fn get(&self, address: &Address) -> Option<JsonAbi> {
        let stored = match self.load(address) {
            Ok(stored) => stored?,
            Err(err) => {
                tracing::warn!(%address, error = %err, "manual ABI lookup failed");
                return None;
            }
        };
        match serde_json::from_str::<JsonAbi>(&stored.abi_json) {
            Ok(abi) => Some(abi),
            Err(err) => {
                tracing::warn!(%address, error = %err, "stored manual ABI is not valid JSON ABI");
                None
            }
        }
    }
}
