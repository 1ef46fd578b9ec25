//! Typed query objects for the composer. The composer describes what it needs
//! (`PoolQuery`, `LinePredicate`) and only this module turns those
//! descriptions into SQL, always with bound parameters.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use tracing::debug;

use super::sources::line_from_row;
use crate::models::{Line, Position, PERFECT_RHYME};

/// Inclusive syllable range a line (or word) has to fall in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SyllableWindow {
    pub min: u32,
    pub max: u32,
}

impl SyllableWindow {
    /// `target` widened by `tolerance` on both sides, clamped at zero.
    pub fn around(target: u32, tolerance: u32) -> Self {
        Self {
            min: target.saturating_sub(tolerance),
            max: target.saturating_add(tolerance),
        }
    }

    pub fn contains(&self, syllables: u32) -> bool {
        (self.min..=self.max).contains(&syllables)
    }
}

/// Which line boundaries a rhyme group has to be served at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolPosition {
    First,
    Last,
    Both,
}

impl PoolPosition {
    fn positions(self) -> &'static [Position] {
        match self {
            PoolPosition::First => &[Position::First],
            PoolPosition::Last => &[Position::Last],
            PoolPosition::Both => &Position::ALL,
        }
    }
}

/// Requirements a rhyme pool has to meet before a group may use it.
#[derive(Debug, Clone)]
pub struct PoolQuery {
    pub position: PoolPosition,
    /// Minimum usable lines, and distinct words, at every required position.
    pub quota: u32,
    /// Each window must be met by at least `quota` pool-linked lines.
    pub syllable_windows: Vec<SyllableWindow>,
    /// Pools already claimed by other groups.
    pub exclude_pools: Vec<i64>,
    pub limit: usize,
}

/// Up to `query.limit` pool ids meeting `query`, in random order.
///
/// For `PoolPosition::Both` a pool must qualify at each boundary, and only
/// lines whose first and last words differ are counted.
pub fn resolve_candidate_pools<R: Rng>(
    conn: &Connection,
    query: &PoolQuery,
    rng: &mut R,
) -> Result<Vec<i64>> {
    let distinct_ends = query.position == PoolPosition::Both;
    let mut qualifying: Option<BTreeSet<i64>> = None;

    for &position in query.position.positions() {
        let pools = qualifying_pools(conn, position, query, distinct_ends)?;
        qualifying = Some(match qualifying {
            None => pools,
            Some(previous) => previous.intersection(&pools).copied().collect(),
        });
    }

    let mut pools: Vec<i64> = qualifying.unwrap_or_default().into_iter().collect();
    pools.shuffle(rng);
    pools.truncate(query.limit);
    debug!(
        position = ?query.position,
        quota = query.quota,
        found = pools.len(),
        "resolved candidate pools"
    );
    Ok(pools)
}

fn qualifying_pools(
    conn: &Connection,
    position: Position,
    query: &PoolQuery,
    distinct_ends: bool,
) -> Result<BTreeSet<i64>> {
    let column = position.column();
    let quota = i64::from(query.quota);
    let mut sql = format!(
        "SELECT rw.pool_id
         FROM lines l
         INNER JOIN rhyme_words rw ON rw.word = l.{column} AND rw.rhyme_type = ?
         WHERE 1 = 1"
    );
    let mut values: Vec<Value> = vec![Value::from(PERFECT_RHYME.to_string())];

    if distinct_ends {
        sql.push_str(" AND l.first_word <> l.last_word");
    }
    if !query.exclude_pools.is_empty() {
        sql.push_str(&format!(
            " AND rw.pool_id NOT IN ({})",
            placeholders(query.exclude_pools.len())
        ));
        values.extend(query.exclude_pools.iter().map(|id| Value::from(*id)));
    }

    sql.push_str(&format!(
        " GROUP BY rw.pool_id HAVING COUNT(*) >= ? AND COUNT(DISTINCT l.{column}) >= ?"
    ));
    values.push(Value::from(quota));
    values.push(Value::from(quota));

    for window in &query.syllable_windows {
        sql.push_str(
            " AND SUM(CASE WHEN l.syllables BETWEEN ? AND ? THEN 1 ELSE 0 END) >= ?",
        );
        values.push(Value::from(i64::from(window.min)));
        values.push(Value::from(i64::from(window.max)));
        values.push(Value::from(quota));
    }

    let mut stmt = conn
        .prepare(&sql)
        .context("failed to prepare candidate pool query")?;

    let pools = stmt
        .query_map(params_from_iter(values), |row| row.get(0))
        .context("failed to iterate candidate pools")?
        .collect::<Result<BTreeSet<i64>, _>>()
        .context("failed to collect candidate pools")?;

    Ok(pools)
}

/// Constraints on the word at one boundary of a sampled line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordFilter {
    /// Word must belong to this pool.
    pub pool: Option<i64>,
    /// Word must be exactly this.
    pub equals: Option<String>,
    /// Word must not be any of these.
    pub exclude: Vec<String>,
    /// When non-empty, word must be one of these.
    pub include_only: Vec<String>,
    /// Word must carry this estimated syllable count.
    pub syllables: Option<u32>,
}

/// Conjunction of everything a sampled line has to satisfy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinePredicate {
    pub syllables: Option<SyllableWindow>,
    pub first: WordFilter,
    pub last: WordFilter,
    /// Reject lines that start and end on the same word.
    pub distinct_ends: bool,
}

impl LinePredicate {
    pub fn word(&self, position: Position) -> &WordFilter {
        match position {
            Position::First => &self.first,
            Position::Last => &self.last,
        }
    }

    pub fn word_mut(&mut self, position: Position) -> &mut WordFilter {
        match position {
            Position::First => &mut self.first,
            Position::Last => &mut self.last,
        }
    }

    /// Render as a `WHERE` body plus its bound values.
    fn to_sql(&self) -> (String, Vec<Value>) {
        let mut clauses: Vec<String> = vec!["1 = 1".to_string()];
        let mut values: Vec<Value> = Vec::new();

        if let Some(window) = self.syllables {
            clauses.push("l.syllables BETWEEN ? AND ?".to_string());
            values.push(Value::from(i64::from(window.min)));
            values.push(Value::from(i64::from(window.max)));
        }

        for position in Position::ALL {
            let column = position.column();
            let filter = self.word(position);

            if let Some(pool) = filter.pool {
                clauses.push(format!(
                    "EXISTS (SELECT 1 FROM rhyme_words rw
                     WHERE rw.word = l.{column} AND rw.rhyme_type = ? AND rw.pool_id = ?)"
                ));
                values.push(Value::from(PERFECT_RHYME.to_string()));
                values.push(Value::from(pool));
            }
            if let Some(word) = &filter.equals {
                clauses.push(format!("l.{column} = ?"));
                values.push(Value::from(word.clone()));
            }
            if !filter.exclude.is_empty() {
                clauses.push(format!(
                    "l.{column} NOT IN ({})",
                    placeholders(filter.exclude.len())
                ));
                values.extend(filter.exclude.iter().cloned().map(Value::from));
            }
            if !filter.include_only.is_empty() {
                clauses.push(format!(
                    "l.{column} IN ({})",
                    placeholders(filter.include_only.len())
                ));
                values.extend(filter.include_only.iter().cloned().map(Value::from));
            }
            if let Some(syllables) = filter.syllables {
                clauses.push(format!(
                    "EXISTS (SELECT 1 FROM rhyme_words rw
                     WHERE rw.word = l.{column} AND rw.syllables = ?)"
                ));
                values.push(Value::from(i64::from(syllables)));
            }
        }

        if self.distinct_ends {
            clauses.push("l.first_word <> l.last_word".to_string());
        }

        (clauses.join(" AND "), values)
    }
}

/// One uniformly random line matching `predicate`, or `None` when nothing
/// matches. The match count is taken first and a random offset into the
/// id-ordered matches is fetched, so `rng` alone decides the pick.
pub fn sample_line<R: Rng>(
    conn: &Connection,
    predicate: &LinePredicate,
    rng: &mut R,
) -> Result<Option<Line>> {
    let (where_sql, values) = predicate.to_sql();

    let count: i64 = conn
        .query_row(
            &format!("SELECT COUNT(*) FROM lines l WHERE {where_sql}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )
        .context("failed to count matching lines")?;

    if count == 0 {
        return Ok(None);
    }

    let offset = rng.random_range(0..count);
    let mut values = values;
    values.push(Value::from(offset));

    let line = conn
        .query_row(
            &format!(
                "SELECT l.id, l.text, l.first_word, l.last_word, l.syllables, l.source_id
                 FROM lines l WHERE {where_sql}
                 ORDER BY l.id LIMIT 1 OFFSET ?"
            ),
            params_from_iter(values.iter()),
            line_from_row,
        )
        .context("failed to fetch sampled line")?;

    Ok(Some(line))
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        open_in_memory, upsert_line, upsert_rhyme_pool, upsert_rhyme_word, upsert_source,
    };
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Pool "ats" = {cats, hats, bats}; pool "og" = {dog, log}.
    fn seeded() -> (Connection, i64, i64) {
        let conn = open_in_memory().unwrap();
        let ats = upsert_rhyme_pool(&conn, "ats", "cats").unwrap();
        let og = upsert_rhyme_pool(&conn, "og", "dog").unwrap();
        for word in ["cats", "hats", "bats", "i", "my"] {
            upsert_rhyme_word(&conn, word, 1, PERFECT_RHYME, ats).unwrap();
        }
        for word in ["dog", "log"] {
            upsert_rhyme_word(&conn, word, 1, PERFECT_RHYME, og).unwrap();
        }
        let source = upsert_source(&conn, "test").unwrap();
        upsert_line(&conn, "i", "cats", "i like cats", 3, source).unwrap();
        upsert_line(&conn, "i", "hats", "i like big hats", 4, source).unwrap();
        upsert_line(&conn, "my", "bats", "my bats", 2, source).unwrap();
        upsert_line(&conn, "i", "dog", "i walk the dog", 4, source).unwrap();
        upsert_line(&conn, "my", "log", "my log", 2, source).unwrap();
        (conn, ats, og)
    }

    fn query(position: PoolPosition, quota: u32) -> PoolQuery {
        PoolQuery {
            position,
            quota,
            syllable_windows: Vec::new(),
            exclude_pools: Vec::new(),
            limit: 10,
        }
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let window = SyllableWindow::around(4, 1);
        assert!(window.contains(3) && window.contains(5));
        assert!(!window.contains(6));
        assert_eq!(SyllableWindow::around(0, 1), SyllableWindow { min: 0, max: 1 });
    }

    #[test]
    fn pools_must_meet_quota_and_diversity() {
        let (conn, ats, og) = seeded();
        let mut rng = StdRng::seed_from_u64(1);

        let mut found = resolve_candidate_pools(&conn, &query(PoolPosition::Last, 2), &mut rng).unwrap();
        found.sort();
        assert_eq!(found, vec![ats, og]);

        let found = resolve_candidate_pools(&conn, &query(PoolPosition::Last, 3), &mut rng).unwrap();
        assert_eq!(found, vec![ats]);

        // Only "i" and "my" start lines, both in the "ats" pool.
        let found = resolve_candidate_pools(&conn, &query(PoolPosition::First, 3), &mut rng).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn windows_and_exclusions_narrow_the_result() {
        let (conn, ats, og) = seeded();
        let mut rng = StdRng::seed_from_u64(2);

        let mut windowed = query(PoolPosition::Last, 2);
        windowed.syllable_windows = vec![SyllableWindow::around(4, 0)];
        // Only one four-syllable line per pool.
        assert!(resolve_candidate_pools(&conn, &windowed, &mut rng).unwrap().is_empty());

        let mut excluded = query(PoolPosition::Last, 2);
        excluded.exclude_pools = vec![ats];
        assert_eq!(resolve_candidate_pools(&conn, &excluded, &mut rng).unwrap(), vec![og]);
    }

    #[test]
    fn sampling_honours_every_filter() {
        let (conn, ats, _) = seeded();
        let mut rng = StdRng::seed_from_u64(3);

        let mut predicate = LinePredicate {
            syllables: Some(SyllableWindow::around(4, 0)),
            ..LinePredicate::default()
        };
        predicate.last.pool = Some(ats);
        predicate.last.exclude = vec!["cats".to_string()];

        for _ in 0..20 {
            let line = sample_line(&conn, &predicate, &mut rng).unwrap().unwrap();
            assert_eq!(line.text, "i like big hats");
        }

        predicate.last.exclude.push("hats".to_string());
        assert!(sample_line(&conn, &predicate, &mut rng).unwrap().is_none());
    }

    #[test]
    fn sampling_supports_equality_and_include_lists() {
        let (conn, _, _) = seeded();
        let mut rng = StdRng::seed_from_u64(4);

        let mut predicate = LinePredicate::default();
        predicate.first.equals = Some("my".to_string());
        predicate.last.include_only = vec!["log".to_string(), "cats".to_string()];
        let line = sample_line(&conn, &predicate, &mut rng).unwrap().unwrap();
        assert_eq!(line.text, "my log");
    }

    #[test]
    fn sampling_reaches_every_match() {
        let (conn, ats, _) = seeded();
        let mut rng = StdRng::seed_from_u64(5);
        let mut predicate = LinePredicate::default();
        predicate.last.pool = Some(ats);

        let mut seen = BTreeSet::new();
        for _ in 0..200 {
            seen.insert(sample_line(&conn, &predicate, &mut rng).unwrap().unwrap().last_word);
        }
        assert_eq!(seen.len(), 3);
    }
}
