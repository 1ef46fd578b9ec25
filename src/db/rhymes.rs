use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{RhymePool, PERFECT_RHYME};

/// Create the pool seeded by `seed`, or return the existing one's id.
pub fn upsert_rhyme_pool(conn: &Connection, hint: &str, seed: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO rhyme_pools (hint, seed) VALUES (?1, ?2) ON CONFLICT(seed) DO NOTHING",
        params![hint, seed],
    )
    .context("failed to insert rhyme pool")?;

    conn.query_row(
        "SELECT id FROM rhyme_pools WHERE seed = ?1",
        params![seed],
        |row| row.get(0),
    )
    .context("failed to look up rhyme pool id")
}

/// Record `word` as a member of `pool_id`. Memberships are first-writer-wins:
/// a word already owned by a pool keeps its owner and `false` is returned.
pub fn upsert_rhyme_word(
    conn: &Connection,
    word: &str,
    syllables: u32,
    rhyme_type: &str,
    pool_id: i64,
) -> Result<bool> {
    let inserted = conn
        .execute(
            "INSERT INTO rhyme_words (word, syllables, rhyme_type, pool_id)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(word, rhyme_type) DO NOTHING",
            params![word, syllables, rhyme_type, pool_id],
        )
        .context("failed to insert rhyme word")?;
    Ok(inserted > 0)
}

/// Every word that already belongs to some pool.
pub fn list_known_rhyme_words(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT DISTINCT word FROM rhyme_words ORDER BY word")
        .context("failed to prepare rhyme word query")?;

    let mut rows = stmt.query([]).context("failed to execute rhyme word query")?;

    let mut words = Vec::new();
    while let Some(row) = rows.next().context("failed to fetch rhyme word row")? {
        let word: String = row.get(0).context("failed to read rhyme word")?;
        words.push(word);
    }

    Ok(words)
}

/// The perfect-rhyme pool owning `word`, if any.
pub fn pool_for_word(conn: &Connection, word: &str) -> Result<Option<RhymePool>> {
    conn.query_row(
        "SELECT p.id, p.hint, p.seed
         FROM rhyme_pools p
         INNER JOIN rhyme_words w ON w.pool_id = p.id
         WHERE w.word = ?1 AND w.rhyme_type = ?2",
        params![word, PERFECT_RHYME],
        |row| {
            Ok(RhymePool {
                id: row.get(0)?,
                hint: row.get(1)?,
                seed: row.get(2)?,
            })
        },
    )
    .optional()
    .context("failed to look up pool for word")
}

/// Members of one pool, alphabetically.
pub fn fetch_pool_words(conn: &Connection, pool_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT word FROM rhyme_words WHERE pool_id = ?1 ORDER BY word")
        .context("failed to prepare pool member query")?;

    let words = stmt
        .query_map(params![pool_id], |row| row.get(0))
        .context("failed to iterate pool members")?
        .collect::<Result<Vec<String>, _>>()
        .context("failed to collect pool members")?;

    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    #[test]
    fn membership_is_first_writer_wins() {
        let conn = open_in_memory().unwrap();
        let cats = upsert_rhyme_pool(&conn, "ats", "cats").unwrap();
        assert_eq!(upsert_rhyme_pool(&conn, "ats", "cats").unwrap(), cats);
        let bats = upsert_rhyme_pool(&conn, "ats", "bats").unwrap();
        assert_ne!(cats, bats);

        assert!(upsert_rhyme_word(&conn, "hats", 1, PERFECT_RHYME, cats).unwrap());
        assert!(!upsert_rhyme_word(&conn, "hats", 1, PERFECT_RHYME, bats).unwrap());

        let owner = pool_for_word(&conn, "hats").unwrap().unwrap();
        assert_eq!(owner.id, cats);
        assert_eq!(owner.seed, "cats");
        assert!(pool_for_word(&conn, "dogs").unwrap().is_none());
    }

    #[test]
    fn lists_known_words_once() {
        let conn = open_in_memory().unwrap();
        let pool = upsert_rhyme_pool(&conn, "ay", "day").unwrap();
        upsert_rhyme_word(&conn, "day", 1, PERFECT_RHYME, pool).unwrap();
        upsert_rhyme_word(&conn, "way", 1, PERFECT_RHYME, pool).unwrap();

        assert_eq!(list_known_rhyme_words(&conn).unwrap(), vec!["day", "way"]);
        assert_eq!(fetch_pool_words(&conn, pool).unwrap(), vec!["day", "way"]);
    }
}
