use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::SchemaError;

/// Revision of the table layout below. Bump it whenever a table changes; an
/// existing database carrying another value is refused.
pub const SCHEMA_VERSION: i64 = 1;

/// Open (or create) the corpus database at `path` and make sure its schema is
/// present and current.
pub fn open_store(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create data directory")?;
    }

    let conn = Connection::open(path).context("failed to open SQLite database")?;
    ensure_schema(&conn)?;
    info!(path = %path.display(), "corpus store opened");
    Ok(conn)
}

/// Throwaway store used by tests and dry runs.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// Check the version marker, then lazily create every table. The function
/// also toggles `PRAGMA foreign_keys = ON` so removing a source cascades to
/// its lines.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("failed to enable foreign keys")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )
    .context("failed to create meta table")?;

    if let Some(found) = stored_version(conn)? {
        if found != SCHEMA_VERSION {
            return Err(SchemaError::VersionMismatch {
                expected: SCHEMA_VERSION,
                found,
            }
            .into());
        }
    }

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sources (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )
    .context("failed to create sources table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS lines (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            text TEXT NOT NULL UNIQUE,
            first_word TEXT NOT NULL,
            last_word TEXT NOT NULL,
            syllables INTEGER NOT NULL,
            source_id INTEGER NOT NULL,
            FOREIGN KEY(source_id) REFERENCES sources(id) ON DELETE CASCADE
        )",
        [],
    )
    .context("failed to create lines table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS rhyme_pools (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            hint TEXT NOT NULL,
            seed TEXT NOT NULL UNIQUE
        )",
        [],
    )
    .context("failed to create rhyme_pools table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS rhyme_words (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            word TEXT NOT NULL,
            syllables INTEGER NOT NULL,
            rhyme_type TEXT NOT NULL,
            pool_id INTEGER NOT NULL,
            UNIQUE(word, rhyme_type),
            FOREIGN KEY(pool_id) REFERENCES rhyme_pools(id)
        )",
        [],
    )
    .context("failed to create rhyme_words table")?;

    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_lines_first_word ON lines(first_word);
         CREATE INDEX IF NOT EXISTS idx_lines_last_word ON lines(last_word);
         CREATE INDEX IF NOT EXISTS idx_lines_source ON lines(source_id);
         CREATE INDEX IF NOT EXISTS idx_rhyme_words_pool ON rhyme_words(pool_id);",
    )
    .context("failed to create indexes")?;

    conn.execute(
        "INSERT OR IGNORE INTO meta (key, value) VALUES ('schema_version', ?1)",
        params![SCHEMA_VERSION.to_string()],
    )
    .context("failed to record schema version")?;

    debug!(version = SCHEMA_VERSION, "schema ready");
    Ok(())
}

/// Version marker of an existing database, `None` for a fresh file.
fn stored_version(conn: &Connection) -> Result<Option<i64>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()
        .context("failed to read schema version")?;

    raw.map(|value| {
        value
            .parse::<i64>()
            .with_context(|| format!("schema version \"{value}\" is not a number"))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_store_records_current_version() {
        let conn = open_in_memory().unwrap();
        assert_eq!(stored_version(&conn).unwrap(), Some(SCHEMA_VERSION));
        // Re-running against the same connection is harmless.
        ensure_schema(&conn).unwrap();
    }

    #[test]
    fn mismatched_version_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.sqlite");
        {
            let conn = open_store(&path).unwrap();
            conn.execute(
                "UPDATE meta SET value = '99' WHERE key = 'schema_version'",
                [],
            )
            .unwrap();
        }

        let err = open_store(&path).unwrap_err();
        match err.downcast_ref::<SchemaError>() {
            Some(SchemaError::VersionMismatch { expected, found }) => {
                assert_eq!(*expected, SCHEMA_VERSION);
                assert_eq!(*found, 99);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
