use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, warn};

use crate::error::{Result, VitaeError};
use crate::models::OrcidId;

/// Key → ORCID iD store backed by SQLite (`orcid_mapping(UIN, ORCID)`).
pub struct IdentifierMap {
    connection: Mutex<Connection>,
}

impl IdentifierMap {
    /// Open an existing mapping database read-only.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(VitaeError::Config(format!(
                "mapping database not found: {}",
                path.display()
            )));
        }
        let conn = Connection::open_with_flags(path, rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(Self {
            connection: Mutex::new(conn),
        })
    }

    /// Empty writable store with the mapping table created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS orcid_mapping (
                UIN   TEXT PRIMARY KEY,
                ORCID TEXT
            );",
        )?;
        Ok(Self {
            connection: Mutex::new(conn),
        })
    }

    pub fn insert(&self, key: &str, orcid: &OrcidId) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO orcid_mapping (UIN, ORCID) VALUES (?1, ?2)",
            params![key, orcid.as_str()],
        )?;
        Ok(())
    }

    /// Resolve `key` to a validated ORCID iD.
    pub fn resolve(&self, key: &str) -> Result<OrcidId> {
        let conn = self.lock()?;
        let stored: Option<Option<String>> = conn
            .query_row(
                "SELECT ORCID FROM orcid_mapping WHERE UIN = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        let Some(raw) = stored.flatten().filter(|s| !s.trim().is_empty()) else {
            return Err(VitaeError::UnmappedKey(key.to_string()));
        };
        match OrcidId::parse(&raw) {
            Ok(id) => {
                debug!(key, orcid = %id, "resolved mapping");
                Ok(id)
            }
            Err(e) => {
                warn!(key, stored = %raw, "mapping holds a malformed ORCID iD");
                Err(e)
            }
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| VitaeError::Config("mapping database lock poisoned".to_string()))
    }
}
