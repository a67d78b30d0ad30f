use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::error::StoreError;
use crate::policy::Decision;
use crate::registry::Profile;

pub const UNKNOWN_NAME: &str = "Unknown";

/// One persisted verification attempt. Immutable once written.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessLogEntry {
    pub id: i64,
    pub identity: Option<String>,
    pub display_name: String,
    pub timestamp: String,
    pub matched: bool,
    pub distance: Option<f64>,
}

/// Append-only audit trail. Exposes no update or delete operations.
pub struct AccessLedger {
    conn: Connection,
}

impl AccessLedger {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS access_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                identity TEXT,
                display_name TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                matched INTEGER NOT NULL,
                distance REAL
            )",
            [],
        )?;
        Ok(Self { conn })
    }

    /// Records one decision. The timestamp is assigned here, at write time.
    ///
    /// Display name precedence: resolved profile, then the raw identity key,
    /// then "Unknown". An identity the registry does not know must still
    /// produce a readable entry.
    pub fn append(
        &self,
        decision: &Decision,
        profile: Option<&Profile>,
    ) -> Result<AccessLogEntry, StoreError> {
        let display_name = match (profile, &decision.identity) {
            (Some(p), _) => p.display_name.clone(),
            (None, Some(identity)) => identity.clone(),
            (None, None) => UNKNOWN_NAME.to_string(),
        };
        let timestamp = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO access_log (identity, display_name, timestamp, matched, distance)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                decision.identity,
                display_name,
                timestamp,
                decision.matched,
                decision.distance
            ],
        )?;
        Ok(AccessLogEntry {
            id: self.conn.last_insert_rowid(),
            identity: decision.identity.clone(),
            display_name,
            timestamp,
            matched: decision.matched,
            distance: decision.distance,
        })
    }

    /// Newest entries first.
    pub fn recent(&self, limit: usize) -> Result<Vec<AccessLogEntry>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, identity, display_name, timestamp, matched, distance
             FROM access_log ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit as i64], |row| {
            Ok(AccessLogEntry {
                id: row.get(0)?,
                identity: row.get(1)?,
                display_name: row.get(2)?,
                timestamp: row.get(3)?,
                matched: row.get(4)?,
                distance: row.get(5)?,
            })
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM access_log", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    #[cfg(test)]
    pub(crate) fn break_storage(&self) {
        self.conn.execute("DROP TABLE access_log", []).unwrap();
    }
}
