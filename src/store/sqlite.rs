use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{Result, XflowError};
use crate::provider::ProviderKind;
use crate::store::{RotationState, SourceCursor, Store};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            XflowError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;
        migrations
            .to_latest(&mut conn)
            .map_err(|e| XflowError::Other(format!("Migration failed: {}", e)))?;

        Ok(())
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    }

    fn cursor_from_row(row: &Row<'_>) -> rusqlite::Result<SourceCursor> {
        Ok(SourceCursor {
            source_key: row.get(0)?,
            last_seen_id: row.get(1)?,
            last_seen_at: row
                .get::<_, Option<String>>(2)?
                .and_then(|s| Self::parse_datetime(&s)),
            updated_at: row
                .get::<_, String>(3)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
        })
    }
}

impl Store for SqliteStore {
    fn load_rotation(&self, provider: ProviderKind) -> Result<Option<RotationState>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                "SELECT provider, keys_fingerprint, active_index, updated_at
                 FROM rotation_state WHERE provider = ?1",
                params![provider.as_str()],
                |row| {
                    Ok(RotationState {
                        provider: row.get(0)?,
                        keys_fingerprint: row.get(1)?,
                        active_index: row.get::<_, i64>(2)?.max(0) as usize,
                        updated_at: row
                            .get::<_, String>(3)
                            .ok()
                            .and_then(|s| Self::parse_datetime(&s))
                            .unwrap_or_else(Utc::now),
                    })
                },
            )
            .optional()?;

        Ok(result)
    }

    fn save_rotation(
        &self,
        provider: ProviderKind,
        keys_fingerprint: &str,
        active_index: usize,
    ) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO rotation_state (provider, keys_fingerprint, active_index, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(provider) DO UPDATE SET
                keys_fingerprint = excluded.keys_fingerprint,
                active_index = excluded.active_index,
                updated_at = excluded.updated_at",
            params![
                provider.as_str(),
                keys_fingerprint,
                active_index as i64,
                Utc::now().to_rfc3339()
            ],
        )?;

        Ok(())
    }

    fn set_source_cursor(
        &self,
        source_key: &str,
        last_seen_id: &str,
        last_seen_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO source_cursors (source_key, last_seen_id, last_seen_at, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(source_key) DO UPDATE SET
                last_seen_id = excluded.last_seen_id,
                last_seen_at = excluded.last_seen_at,
                updated_at = excluded.updated_at",
            params![
                source_key,
                last_seen_id,
                last_seen_at.map(|dt| dt.to_rfc3339()),
                Utc::now().to_rfc3339()
            ],
        )?;

        Ok(())
    }

    fn get_source_cursor(&self, source_key: &str) -> Result<Option<SourceCursor>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                "SELECT source_key, last_seen_id, last_seen_at, updated_at
                 FROM source_cursors WHERE source_key = ?1",
                params![source_key],
                Self::cursor_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn list_source_cursors(&self) -> Result<Vec<SourceCursor>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT source_key, last_seen_id, last_seen_at, updated_at
             FROM source_cursors ORDER BY source_key",
        )?;

        let cursors = stmt
            .query_map([], Self::cursor_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(cursors)
    }
}
