use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;

use crate::error::StoreError;

/// One registered individual. Created at seed time, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub identity: String,
    pub display_name: String,
    pub group: String,
}

/// Seed-file entry; the identity key is the map key.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileSeed {
    pub display_name: String,
    #[serde(default)]
    pub group: String,
}

pub type SeedMapping = BTreeMap<String, ProfileSeed>;

pub struct ProfileRegistry {
    conn: Connection,
}

impl ProfileRegistry {
    /// Opens (creating if needed) the profile table. Failure here is fatal:
    /// the access point cannot run without its registry.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS profiles (
                id INTEGER PRIMARY KEY,
                identity TEXT UNIQUE NOT NULL,
                display_name TEXT NOT NULL,
                group_label TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn })
    }

    /// Insert-if-absent for every entry. Idempotent: existing profiles are
    /// never overwritten or duplicated.
    pub fn seed(&self, mapping: &SeedMapping) -> Result<(), StoreError> {
        let mut stmt = self.conn.prepare(
            "INSERT OR IGNORE INTO profiles (identity, display_name, group_label)
             VALUES (?1, ?2, ?3)",
        )?;
        for (identity, seed) in mapping {
            stmt.execute(params![identity, seed.display_name, seed.group])?;
        }
        Ok(())
    }

    /// A miss is not an error.
    pub fn lookup(&self, identity: &str) -> Result<Option<Profile>, StoreError> {
        let profile = self
            .conn
            .query_row(
                "SELECT identity, display_name, group_label FROM profiles WHERE identity = ?1",
                [identity],
                |row| {
                    Ok(Profile {
                        identity: row.get(0)?,
                        display_name: row.get(1)?,
                        group: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}
