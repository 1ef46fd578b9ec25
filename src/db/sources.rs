use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::{Line, Source, SourceSummary};

/// Return the id of the source called `name`, creating it on first sight.
pub fn upsert_source(conn: &Connection, name: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO sources (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
        params![name],
    )
    .context("failed to insert source")?;

    conn.query_row(
        "SELECT id FROM sources WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )
    .context("failed to look up source id")
}

/// Every source with the number of lines it currently owns, ordered by name.
pub fn list_sources(conn: &Connection) -> Result<Vec<SourceSummary>> {
    let mut stmt = conn
        .prepare(
            "SELECT s.id, s.name, s.created_at, COUNT(l.id)
             FROM sources s
             LEFT JOIN lines l ON l.source_id = s.id
             GROUP BY s.id
             ORDER BY s.name",
        )
        .context("failed to prepare source listing")?;

    let sources = stmt
        .query_map([], |row| {
            Ok(SourceSummary {
                source: Source {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                },
                line_count: row.get(3)?,
            })
        })
        .context("failed to load sources")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect sources")?;

    Ok(sources)
}

/// Remove a source by name. The schema cascades to `lines`, so its lines go
/// with it. Returns whether anything was deleted.
pub fn delete_source(conn: &Connection, name: &str) -> Result<bool> {
    let deleted = conn
        .execute("DELETE FROM sources WHERE name = ?1", params![name])
        .context("failed to delete source")?;
    Ok(deleted > 0)
}

/// Drop every line a source owns ahead of a re-ingestion.
pub fn delete_lines_by_source(conn: &Connection, source_id: i64) -> Result<usize> {
    conn.execute("DELETE FROM lines WHERE source_id = ?1", params![source_id])
        .context("failed to delete source lines")
}

/// Insert a line unless one with the same text already exists. Returns
/// `true` when a new row was written.
pub fn upsert_line(
    conn: &Connection,
    first_word: &str,
    last_word: &str,
    text: &str,
    syllables: u32,
    source_id: i64,
) -> Result<bool> {
    let inserted = conn
        .execute(
            "INSERT INTO lines (first_word, last_word, text, syllables, source_id)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(text) DO NOTHING",
            params![first_word, last_word, text, syllables, source_id],
        )
        .context("failed to insert line")?;
    Ok(inserted > 0)
}

/// Number of lines in the corpus across all sources.
pub fn count_lines(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM lines", [], |row| row.get(0))
        .context("failed to count lines")
}

/// Look up one line by id. `None` when no such line exists.
pub fn fetch_line(conn: &Connection, id: i64) -> Result<Option<Line>> {
    conn.query_row(
        "SELECT id, text, first_word, last_word, syllables, source_id
         FROM lines WHERE id = ?1",
        params![id],
        line_from_row,
    )
    .optional()
    .context("failed to fetch line")
}

/// Lines owned by one source, in insertion order.
pub fn fetch_lines_for_source(conn: &Connection, source_id: i64) -> Result<Vec<Line>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, text, first_word, last_word, syllables, source_id
             FROM lines WHERE source_id = ?1 ORDER BY id",
        )
        .context("failed to prepare source lines query")?;

    let lines = stmt
        .query_map(params![source_id], line_from_row)
        .context("failed to iterate source lines")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect source lines")?;

    Ok(lines)
}

/// Shared row mapper; expects the column order used by every line query.
pub(crate) fn line_from_row(row: &Row<'_>) -> rusqlite::Result<Line> {
    Ok(Line {
        id: row.get(0)?,
        text: row.get(1)?,
        first_word: row.get(2)?,
        last_word: row.get(3)?,
        syllables: row.get(4)?,
        source_id: row.get(5)?,
    })
}
