//! SQLite schema migrations
//!
//! Migrations are listed in [`MIGRATIONS`] in version order. Each one runs in
//! its own transaction together with its row in `progress_schema_history`, so
//! a failed step leaves the database at the previous version.

use std::collections::HashSet;

use rusqlite::{params, Connection};

use crate::storage::{StorageError, StorageResult};

pub const CURRENT_SCHEMA_VERSION: i32 = 2;

#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i32,
    pub name: &'static str,
    pub sql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "progress_record table",
        sql: include_str!("schema.sql"),
    },
    Migration {
        version: 2,
        name: "due lookup index",
        sql: "CREATE INDEX IF NOT EXISTS idx_progress_user_due \
              ON progress_record(user_id, is_retired, is_mastered, next_review_at);",
    },
];

const HISTORY_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS progress_schema_history (
        version       INTEGER PRIMARY KEY,
        name          TEXT    NOT NULL,
        applied_at_ms INTEGER NOT NULL
    );
"#;

/// A row of `progress_schema_history`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub version: i32,
    pub name: String,
    pub applied_at_ms: i64,
}

/// Bring the schema up to [`CURRENT_SCHEMA_VERSION`]; returns the resulting version
pub fn run_migrations(conn: &Connection) -> StorageResult<i32> {
    run_pending(conn, MIGRATIONS)
}

fn run_pending(conn: &Connection, migrations: &[Migration]) -> StorageResult<i32> {
    conn.execute_batch(HISTORY_TABLE)
        .map_err(|e| StorageError::Migration(format!("cannot create history table: {e}")))?;

    let applied: HashSet<i32> = applied_migrations(conn)?
        .into_iter()
        .map(|m| m.version)
        .collect();

    for migration in migrations.iter().filter(|m| !applied.contains(&m.version)) {
        tracing::info!(
            version = migration.version,
            name = migration.name,
            "applying progress schema migration"
        );
        if let Err(e) = apply(conn, migration) {
            tracing::error!(version = migration.version, error = %e, "schema migration failed");
            return Err(e);
        }
    }

    schema_version(conn)
}

fn apply(conn: &Connection, migration: &Migration) -> StorageResult<()> {
    // Dropping the transaction without commit rolls it back
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(migration.sql).map_err(|e| {
        StorageError::Migration(format!("v{} ({}): {e}", migration.version, migration.name))
    })?;
    tx.execute(
        "INSERT INTO progress_schema_history (version, name, applied_at_ms) VALUES (?1, ?2, ?3)",
        params![
            migration.version,
            migration.name,
            chrono::Utc::now().timestamp_millis()
        ],
    )?;
    tx.commit()?;
    Ok(())
}

/// Highest applied version; 0 before the first migration
pub fn schema_version(conn: &Connection) -> StorageResult<i32> {
    let version: Option<i32> = conn.query_row(
        "SELECT MAX(version) FROM progress_schema_history",
        [],
        |row| row.get(0),
    )?;
    Ok(version.unwrap_or(0))
}

pub fn applied_migrations(conn: &Connection) -> StorageResult<Vec<AppliedMigration>> {
    let mut stmt = conn.prepare(
        "SELECT version, name, applied_at_ms FROM progress_schema_history ORDER BY version",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(AppliedMigration {
            version: row.get(0)?,
            name: row.get(1)?,
            applied_at_ms: row.get(2)?,
        })
    })?;

    let mut applied = Vec::new();
    for row in rows {
        applied.push(row?);
    }
    Ok(applied)
}
