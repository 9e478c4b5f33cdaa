//! SQLite progress store
//!
//! One `progress_record` row per (user, word). Timestamps are stored as unix
//! microseconds, which spans every instant the scheduler can produce.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use wordwise_algo::ProgressRecord;

use super::migrations;
use super::{check_user_id, ProgressStore, StorageError, StorageResult};

const UPSERT_SQL: &str = r#"
    INSERT INTO progress_record (
        user_id, word_id, review_count, ease_factor, interval_days,
        last_reviewed_at, next_review_at, is_mastered, is_retired, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
    ON CONFLICT(user_id, word_id) DO UPDATE SET
        review_count = excluded.review_count,
        ease_factor = excluded.ease_factor,
        interval_days = excluded.interval_days,
        last_reviewed_at = excluded.last_reviewed_at,
        next_review_at = excluded.next_review_at,
        is_mastered = excluded.is_mastered,
        is_retired = excluded.is_retired,
        updated_at = excluded.updated_at
"#;

const SELECT_COLUMNS: &str = "word_id, review_count, ease_factor, interval_days, \
     last_reviewed_at, next_review_at, is_mastered, is_retired";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and bring its schema up to date
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA busy_timeout=5000;
            "#,
        )?;

        Self::from_connection(conn)
    }

    pub fn in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        let version = migrations::run_migrations(&conn)?;
        tracing::debug!(version, "progress schema ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn get_connection(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::LockError(e.to_string()))
    }
}

impl ProgressStore for SqliteStore {
    fn load(&self, user_id: &str, word_id: &str) -> StorageResult<Option<ProgressRecord>> {
        let conn = self.get_connection()?;

        let record = conn
            .query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM progress_record \
                     WHERE user_id = ?1 AND word_id = ?2"
                ),
                params![user_id, word_id],
                record_from_row,
            )
            .optional()?;

        Ok(record)
    }

    fn save(&self, user_id: &str, record: &ProgressRecord) -> StorageResult<()> {
        check_user_id(user_id)?;
        record.validate()?;

        let conn = self.get_connection()?;
        upsert(&conn, user_id, record)?;
        Ok(())
    }

    fn load_all(&self, user_id: &str) -> StorageResult<Vec<ProgressRecord>> {
        let conn = self.get_connection()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM progress_record \
             WHERE user_id = ?1 ORDER BY word_id"
        ))?;
        let records = stmt
            .query_map(params![user_id], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn save_all(&self, user_id: &str, records: &[ProgressRecord]) -> StorageResult<()> {
        check_user_id(user_id)?;
        for record in records {
            record.validate()?;
        }

        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;
        for record in records {
            upsert(&tx, user_id, record)?;
        }
        tx.commit()?;

        tracing::debug!(user_id, count = records.len(), "progress rows written");
        Ok(())
    }
}

fn upsert(conn: &Connection, user_id: &str, record: &ProgressRecord) -> rusqlite::Result<usize> {
    conn.execute(
        UPSERT_SQL,
        params![
            user_id,
            record.word_id,
            record.review_count,
            record.ease_factor,
            record.interval_days,
            record.last_reviewed_at.map(|t| t.timestamp_micros()),
            record.next_review_at.map(|t| t.timestamp_micros()),
            record.is_mastered,
            record.is_retired,
            Utc::now().timestamp_millis(),
        ],
    )
}

fn record_from_row(row: &Row) -> rusqlite::Result<ProgressRecord> {
    Ok(ProgressRecord {
        word_id: row.get(0)?,
        review_count: row.get(1)?,
        ease_factor: row.get(2)?,
        interval_days: row.get(3)?,
        last_reviewed_at: timestamp_column(row, 4)?,
        next_review_at: timestamp_column(row, 5)?,
        is_mastered: row.get(6)?,
        is_retired: row.get(7)?,
    })
}

fn timestamp_column(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let Some(micros) = row.get::<_, Option<i64>>(idx)? else {
        return Ok(None);
    };
    DateTime::<Utc>::from_timestamp_micros(micros)
        .map(Some)
        .ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                Type::Integer,
                format!("timestamp {micros} out of range").into(),
            )
        })
}
