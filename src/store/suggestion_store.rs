//! SQLite-backed suggestion table.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;

use super::record::{RecordId, SuggestionRecord, SuggestionSource, is_persistable};

/// Default SQLite busy timeout applied when opening a store
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 2000;

/// Store handle shared between the per-binding workers
pub type SharedStore = Arc<Mutex<SuggestionStore>>;

/// Errors raised by the suggestion store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Store operation timed out after {0} ms")]
    Timeout(u64),

    #[error("Value not persistable: {0:?}")]
    Rejected(String),

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("Store job aborted: {0}")]
    Aborted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS suggestions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    field_identifier TEXT NOT NULL,
    value TEXT NOT NULL,
    last_used_timestamp INTEGER NOT NULL,
    usage_count INTEGER NOT NULL DEFAULT 1 CHECK (usage_count >= 1),
    field_type TEXT NOT NULL,
    source TEXT NOT NULL,
    url_scope TEXT,
    UNIQUE (field_identifier, value)
);
CREATE INDEX IF NOT EXISTS idx_suggestions_rank
    ON suggestions(field_identifier, usage_count DESC, last_used_timestamp DESC, id DESC);
CREATE INDEX IF NOT EXISTS idx_suggestions_scope ON suggestions(field_identifier, url_scope);
"#;

const SELECT_COLUMNS: &str = "id, field_identifier, value, last_used_timestamp, usage_count, \
                              field_type, source, url_scope";

const RANK_ORDER: &str = "ORDER BY usage_count DESC, last_used_timestamp DESC, id DESC";

/// Per-field row count, used by `formfill stats`
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldSummary {
    pub field_identifier: String,
    pub records: u64,
    pub total_usage: u64,
}

/// Database handle for suggestion persistence.
pub struct SuggestionStore {
    conn: Connection,
}

impl std::fmt::Debug for SuggestionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuggestionStore").finish_non_exhaustive()
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<SuggestionRecord> {
    let source: String = row.get(6)?;
    let usage: i64 = row.get(4)?;
    Ok(SuggestionRecord {
        id: RecordId(row.get(0)?),
        field_identifier: row.get(1)?,
        value: row.get(2)?,
        last_used_timestamp: row.get(3)?,
        usage_count: usage.clamp(1, u32::MAX as i64) as u32,
        field_type: row.get(5)?,
        source: SuggestionSource::from_column(&source),
        url_scope: row.get(7)?,
    })
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl SuggestionStore {
    /// Open or create a store at the given path, creating parent directories.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::open_with_timeout(path, Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))
    }

    /// Open or create a store with an explicit SQLite busy timeout.
    pub fn open_with_timeout<P: AsRef<Path>>(
        path: P,
        busy_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(SCHEMA)?;
        log::debug!("Opened suggestion store at {}", path.display());
        Ok(Self { conn })
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Record a field value, collapsing duplicates into a usage increment
    pub fn upsert(
        &mut self,
        field_identifier: &str,
        value: &str,
        field_type: &str,
        source: SuggestionSource,
        url_scope: Option<&str>,
    ) -> Result<RecordId, StoreError> {
        self.upsert_at(
            field_identifier,
            value,
            field_type,
            source,
            url_scope,
            now_millis(),
        )
    }

    /// `upsert` with an explicit timestamp in epoch milliseconds
    ///
    /// An existing row keeps its field type. Its scope moves to the latest
    /// non-null scope and a prefilled row becomes user input once the user
    /// submits the same value.
    pub fn upsert_at(
        &mut self,
        field_identifier: &str,
        value: &str,
        field_type: &str,
        source: SuggestionSource,
        url_scope: Option<&str>,
        timestamp_ms: i64,
    ) -> Result<RecordId, StoreError> {
        if !is_persistable(value) {
            return Err(StoreError::Rejected(value.to_string()));
        }

        let tx = self.conn.transaction()?;

        let existing: Option<(i64, String)> = tx
            .query_row(
                "SELECT id, source FROM suggestions WHERE field_identifier = ?1 AND value = ?2",
                params![field_identifier, value],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let id = match existing {
            Some((id, existing_source)) => {
                let merged_source = match (SuggestionSource::from_column(&existing_source), source)
                {
                    (SuggestionSource::Prefilled, SuggestionSource::Prefilled) => {
                        SuggestionSource::Prefilled
                    }
                    _ => SuggestionSource::UserInput,
                };
                tx.execute(
                    "UPDATE suggestions
                     SET usage_count = usage_count + 1,
                         last_used_timestamp = ?2,
                         source = ?3,
                         url_scope = COALESCE(?4, url_scope)
                     WHERE id = ?1",
                    params![id, timestamp_ms, merged_source.as_str(), url_scope],
                )?;
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO suggestions
                        (field_identifier, value, last_used_timestamp, usage_count,
                         field_type, source, url_scope)
                     VALUES (?1, ?2, ?3, 1, ?4, ?5, ?6)",
                    params![
                        field_identifier,
                        value,
                        timestamp_ms,
                        field_type,
                        source.as_str(),
                        url_scope,
                    ],
                )?;
                tx.last_insert_rowid()
            }
        };

        tx.commit()?;
        Ok(RecordId(id))
    }

    /// Ranked records for a field, across all scopes
    pub fn query_by_field(
        &self,
        field_identifier: &str,
        limit: usize,
    ) -> Result<Vec<SuggestionRecord>, StoreError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM suggestions
             WHERE field_identifier = ?1
             {RANK_ORDER} LIMIT ?2"
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![field_identifier, limit as i64], row_to_record)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Ranked records for a field that match `url_scope` or carry no scope
    pub fn query_by_field_and_scope(
        &self,
        field_identifier: &str,
        url_scope: &str,
        limit: usize,
    ) -> Result<Vec<SuggestionRecord>, StoreError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM suggestions
             WHERE field_identifier = ?1 AND (url_scope = ?2 OR url_scope IS NULL)
             {RANK_ORDER} LIMIT ?3"
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(
            params![field_identifier, url_scope, limit as i64],
            row_to_record,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Fetch a single record
    pub fn get(&self, id: RecordId) -> Result<Option<SuggestionRecord>, StoreError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM suggestions WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id.0], row_to_record)
            .optional()?)
    }

    /// Delete a record. Returns whether a row was removed.
    pub fn delete(&mut self, id: RecordId) -> Result<bool, StoreError> {
        let removed = self
            .conn
            .execute("DELETE FROM suggestions WHERE id = ?1", params![id.0])?;
        Ok(removed > 0)
    }

    /// Delete every record of a field. Returns the number of rows removed.
    pub fn delete_all_for_field(&mut self, field_identifier: &str) -> Result<usize, StoreError> {
        Ok(self.conn.execute(
            "DELETE FROM suggestions WHERE field_identifier = ?1",
            params![field_identifier],
        )?)
    }

    /// Total number of stored records
    pub fn count(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM suggestions", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// Row and usage totals per field, most used first
    pub fn field_summaries(&self) -> Result<Vec<FieldSummary>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT field_identifier, COUNT(*), SUM(usage_count) FROM suggestions
             GROUP BY field_identifier
             ORDER BY SUM(usage_count) DESC, field_identifier ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let records: i64 = row.get(1)?;
            let usage: i64 = row.get(2)?;
            Ok(FieldSummary {
                field_identifier: row.get(0)?,
                records: records.max(0) as u64,
                total_usage: usage.max(0) as u64,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

/// Wrap a store for sharing across worker threads
pub fn shared(store: SuggestionStore) -> SharedStore {
    Arc::new(Mutex::new(store))
}

/// Run `f` with exclusive access to a shared store
pub fn with_store<T>(
    store: &SharedStore,
    f: impl FnOnce(&mut SuggestionStore) -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    let mut guard = store.lock().map_err(|_| StoreError::Poisoned)?;
    f(&mut guard)
}

#[cfg(test)]
#[path = "suggestion_store_tests.rs"]
mod suggestion_store_tests;
