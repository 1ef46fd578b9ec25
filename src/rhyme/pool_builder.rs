//! Lazily partitions words into rhyme pools, asking the oracle at most once
//! per word per run and persisting every pool it discovers.

use std::collections::HashSet;
use std::sync::{LazyLock, Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use rusqlite::Connection;
use tracing::{debug, warn};

use super::{RhymeOracle, SyllableEstimator};
use crate::db::{list_known_rhyme_words, upsert_rhyme_pool, upsert_rhyme_word};
use crate::error::OracleError;
use crate::models::PERFECT_RHYME;

/// Trailing "vowels, consonants, vowels, consonants" fragment of a word.
static HINT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[aeiouy]*[^aeiouy]*[aeiouy]+[^aeiouy]*$").expect("hint pattern is valid")
});

/// Display hint for a pool seeded by `word`.
pub fn rhyme_hint(word: &str) -> String {
    HINT_PATTERN
        .find(word)
        .map_or_else(|| "Unknown".to_string(), |m| m.as_str().to_string())
}

/// Strip oracle noise (digits, punctuation, spaces) and lowercase.
pub fn normalize_word(candidate: &str) -> String {
    candidate
        .chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Observability counters for one builder's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuilderStats {
    pub known_words: usize,
    pub unrhymeable_words: usize,
    pub oracle_calls: u64,
    pub pools_created: u64,
}

#[derive(Debug, Default)]
struct RhymeMemo {
    /// Words owned by some pool; seeded from the store.
    known: HashSet<String>,
    /// Words the oracle had nothing for during this run. Never persisted.
    unrhymeable: HashSet<String>,
    oracle_calls: u64,
    pools_created: u64,
}

/// Owner of the word-to-pool memo for one ingestion run.
///
/// `ensure_rhymeable` holds the memo lock for the whole lookup, including the
/// pool write, so two threads seeing a word for the first time at once still
/// create a single pool for it.
#[derive(Debug)]
pub struct RhymePoolBuilder<O, E> {
    oracle: O,
    estimator: E,
    memo: Mutex<RhymeMemo>,
}

impl<O: RhymeOracle, E: SyllableEstimator> RhymePoolBuilder<O, E> {
    /// Build with the positive memo seeded from every persisted membership.
    pub fn load(conn: &Connection, oracle: O, estimator: E) -> Result<Self> {
        let known: HashSet<String> = list_known_rhyme_words(conn)?.into_iter().collect();
        debug!(known = known.len(), "rhyme memo seeded");
        Ok(Self {
            oracle,
            estimator,
            memo: Mutex::new(RhymeMemo {
                known,
                ..RhymeMemo::default()
            }),
        })
    }

    /// Estimator used for rhyme word syllable counts, shared with ingestion
    /// for whole lines.
    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    /// Snapshot of the memo sizes and oracle usage so far.
    pub fn stats(&self) -> Result<BuilderStats> {
        let memo = self.lock()?;
        Ok(BuilderStats {
            known_words: memo.known.len(),
            unrhymeable_words: memo.unrhymeable.len(),
            oracle_calls: memo.oracle_calls,
            pools_created: memo.pools_created,
        })
    }

    /// Whether `word` belongs to a rhyme pool, creating one for it when the
    /// oracle knows rhymes. Store failures while writing a new pool are
    /// returned; oracle failures count as "unrhymeable" for the rest of the
    /// run.
    pub fn ensure_rhymeable(&self, conn: &Connection, word: &str) -> Result<bool> {
        let mut memo = self.lock()?;
        if memo.known.contains(word) {
            return Ok(true);
        }
        if memo.unrhymeable.contains(word) {
            return Ok(false);
        }

        memo.oracle_calls += 1;
        let rhymes: Vec<String> = match self.oracle.perfect_rhymes(word) {
            Ok(by_syllables) => by_syllables.into_values().flatten().collect(),
            Err(OracleError::NotFound(_)) => Vec::new(),
            Err(err) => {
                warn!(word = %word, error = %err, "rhyme oracle failed; treating word as unrhymeable");
                Vec::new()
            }
        };

        if rhymes.is_empty() {
            debug!(word = %word, "no perfect rhymes");
            memo.unrhymeable.insert(word.to_string());
            return Ok(false);
        }

        let mut members = vec![word.to_string()];
        for candidate in &rhymes {
            let normalized = normalize_word(candidate);
            if normalized.is_empty()
                || memo.known.contains(&normalized)
                || members.contains(&normalized)
            {
                continue;
            }
            members.push(normalized);
        }

        let hint = rhyme_hint(word);
        let tx = conn
            .unchecked_transaction()
            .context("failed to begin rhyme pool transaction")?;
        let pool_id = upsert_rhyme_pool(&tx, &hint, word)?;
        for member in &members {
            upsert_rhyme_word(
                &tx,
                member,
                self.estimator.estimate(member),
                PERFECT_RHYME,
                pool_id,
            )?;
        }
        tx.commit().context("failed to commit rhyme pool")?;

        debug!(
            word = %word,
            pool_id,
            hint = %hint,
            members = members.len(),
            "rhyme pool created"
        );
        memo.pools_created += 1;
        memo.known.extend(members);
        Ok(true)
    }

    fn lock(&self) -> Result<MutexGuard<'_, RhymeMemo>> {
        self.memo
            .lock()
            .map_err(|_| anyhow!("rhyme memo lock poisoned"))
    }
}
