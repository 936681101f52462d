use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{Category, Event};
use crate::session::SnapshotSource;
use crate::utils;

/// Local copy of the last successful sync.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open_default() -> rusqlite::Result<Self> {
        Self::open(&utils::database_path())
    }

    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        if let Err(err) = utils::ensure_parent(path) {
            log::warn!("failed to create parent of {:?}: {err}", path);
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS events(
                id TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                starts_at_utc TEXT NOT NULL,
                category_id TEXT
            );
            CREATE INDEX IF NOT EXISTS events_starts_at ON events(starts_at_utc);
            CREATE TABLE IF NOT EXISTS categories(
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS sync_state(
                id INTEGER PRIMARY KEY CHECK (id = 1),
                synced_at_utc TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Swaps the stored snapshot for `events` and `categories` in one
    /// transaction and records the sync time.
    pub fn replace_snapshot(
        &mut self,
        events: &[Event],
        categories: &[Category],
        synced_at: DateTime<Utc>,
    ) -> rusqlite::Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM events", [])?;
        tx.execute("DELETE FROM categories", [])?;
        {
            let mut insert_event = tx.prepare(
                "INSERT INTO events (id, payload, starts_at_utc, category_id)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                   payload = excluded.payload,
                   starts_at_utc = excluded.starts_at_utc,
                   category_id = excluded.category_id",
            )?;
            for event in events {
                let payload = serde_json::to_string(event)
                    .map_err(|err| rusqlite::Error::ToSqlConversionFailure(Box::new(err)))?;
                insert_event.execute(params![
                    event.id,
                    payload,
                    event.starts_at,
                    event.category_id
                ])?;
            }

            let mut insert_category = tx.prepare(
                "INSERT INTO categories (id, name) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name",
            )?;
            for category in categories {
                insert_category.execute(params![category.id, category.name])?;
            }
        }
        tx.execute(
            "INSERT INTO sync_state (id, synced_at_utc) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET synced_at_utc = excluded.synced_at_utc",
            params![synced_at],
        )?;
        tx.commit()
    }

    pub fn list_events(&self) -> rusqlite::Result<Vec<Event>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM events ORDER BY starts_at_utc ASC, id ASC")?;
        let rows = stmt.query_map([], |row| {
            let payload: String = row.get(0)?;
            serde_json::from_str::<Event>(&payload).map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(
                    payload.len(),
                    rusqlite::types::Type::Text,
                    Box::new(err),
                )
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn list_categories(&self) -> rusqlite::Result<Vec<Category>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM categories ORDER BY name COLLATE NOCASE ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        rows.collect()
    }

    pub fn last_synced(&self) -> rusqlite::Result<Option<DateTime<Utc>>> {
        self.conn
            .query_row(
                "SELECT synced_at_utc FROM sync_state WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()
    }

    pub fn snapshot(&self) -> rusqlite::Result<SnapshotSource> {
        Ok(SnapshotSource {
            events: self.list_events()?,
            categories: self.list_categories()?,
        })
    }
}
