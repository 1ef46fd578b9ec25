//! Corpus ingestion: raw text in, accepted rhyme-linked lines out.
//!
//! A source is always replaced wholesale. Its previous lines are deleted, the
//! text is cut into segments, each segment is cleaned and validated, and the
//! survivors are written idempotently by text. Every rejected segment is
//! counted under the reason it failed.

mod clean;

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use rusqlite::Connection;
use tracing::{debug, info};

use crate::db::{delete_lines_by_source, upsert_line, upsert_source};
use crate::rhyme::{normalize_word, RhymeOracle, RhymePoolBuilder, SyllableEstimator};

pub use clean::{clean_line, segment};

/// Lines must be strictly shorter than this many characters.
pub const MAX_LINE_CHARS: usize = 255;
/// Longest boundary word accepted.
pub const MAX_WORD_CHARS: usize = 34;

/// Why a segment did not become a corpus line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Nothing left after cleaning.
    Empty,
    /// Line or boundary word over its length limit.
    TooLong,
    /// Boundary word has no letters, e.g. a number left after a leading "and".
    TooShort,
    /// A boundary word has no rhyme pool.
    Unrhymeable,
    /// Same text already stored.
    Duplicate,
}

/// Per-reason rejection counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RejectionCounts {
    pub empty: usize,
    pub too_long: usize,
    pub too_short: usize,
    pub unrhymeable: usize,
    pub duplicate: usize,
}

impl RejectionCounts {
    fn record(&mut self, reason: Rejection) {
        match reason {
            Rejection::Empty => self.empty += 1,
            Rejection::TooLong => self.too_long += 1,
            Rejection::TooShort => self.too_short += 1,
            Rejection::Unrhymeable => self.unrhymeable += 1,
            Rejection::Duplicate => self.duplicate += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.empty + self.too_long + self.too_short + self.unrhymeable + self.duplicate
    }
}

/// Outcome of ingesting one source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub source_id: i64,
    /// Lines dropped from the previous ingestion of this source.
    pub removed_previous: usize,
    /// Distinct segments considered.
    pub segments: usize,
    pub accepted: usize,
    pub rejected: RejectionCounts,
}

/// A cleaned line that passed validation, ready to store.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    text: String,
    first_word: String,
    last_word: String,
    syllables: u32,
}

/// Replace the lines of source `name` with those accepted from `text`.
///
/// Store errors abort the run; everything else is counted and skipped.
pub fn ingest<O, E>(
    conn: &Connection,
    builder: &RhymePoolBuilder<O, E>,
    text: &str,
    name: &str,
) -> Result<IngestReport>
where
    O: RhymeOracle,
    E: SyllableEstimator,
{
    let source_id = upsert_source(conn, name)?;
    let removed_previous = delete_lines_by_source(conn, source_id)?;
    debug!(source = %name, removed_previous, "previous lines removed");

    let segments = segment(text);
    let mut report = IngestReport {
        source_id,
        removed_previous,
        segments: segments.len(),
        ..IngestReport::default()
    };

    for raw in segments {
        match evaluate(conn, builder, raw)? {
            Ok(candidate) => {
                let inserted = upsert_line(
                    conn,
                    &candidate.first_word,
                    &candidate.last_word,
                    &candidate.text,
                    candidate.syllables,
                    source_id,
                )?;
                if inserted {
                    report.accepted += 1;
                } else {
                    report.rejected.record(Rejection::Duplicate);
                }
            }
            Err(reason) => report.rejected.record(reason),
        }
    }

    info!(
        source = %name,
        segments = report.segments,
        accepted = report.accepted,
        rejected = report.rejected.total(),
        unrhymeable = report.rejected.unrhymeable,
        duplicate = report.rejected.duplicate,
        "source ingested"
    );
    Ok(report)
}

/// Read `path` and ingest it, naming the source after the file stem unless a
/// name is given.
pub fn ingest_file<O, E>(
    conn: &Connection,
    builder: &RhymePoolBuilder<O, E>,
    path: &Path,
    name: Option<&str>,
) -> Result<IngestReport>
where
    O: RhymeOracle,
    E: SyllableEstimator,
{
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let text = String::from_utf8_lossy(&bytes);

    let name = match name {
        Some(name) => name.to_string(),
        None => path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("cannot derive a source name from {}", path.display()))?,
    };

    ingest(conn, builder, &text, &name)
}

/// Clean and validate one segment. The outer `Result` carries store errors
/// from the rhyme lookup; the inner one the rejection reason.
fn evaluate<O, E>(
    conn: &Connection,
    builder: &RhymePoolBuilder<O, E>,
    raw: &str,
) -> Result<Result<Candidate, Rejection>>
where
    O: RhymeOracle,
    E: SyllableEstimator,
{
    let Some(text) = clean_line(raw) else {
        return Ok(Err(Rejection::Empty));
    };

    let length = text.chars().count();
    if length >= MAX_LINE_CHARS {
        return Ok(Err(Rejection::TooLong));
    }

    let tokens: Vec<&str> = text.split_whitespace().collect();
    let (Some(first), Some(last)) = (tokens.first(), tokens.last()) else {
        return Ok(Err(Rejection::Empty));
    };

    // Boundary words are keyed the way rhyme candidates are, so "that's"
    // joins the pool that already holds "thats".
    let first = normalize_word(first);
    let last = normalize_word(last);
    for word in [&first, &last] {
        let chars = word.chars().count();
        if chars == 0 {
            return Ok(Err(Rejection::TooShort));
        }
        if chars > MAX_WORD_CHARS {
            return Ok(Err(Rejection::TooLong));
        }
    }

    if !builder.ensure_rhymeable(conn, &first)? || !builder.ensure_rhymeable(conn, &last)? {
        return Ok(Err(Rejection::Unrhymeable));
    }

    let estimator = builder.estimator();
    let syllables = tokens.iter().map(|token| estimator.estimate(token)).sum();

    Ok(Ok(Candidate {
        first_word: first,
        last_word: last,
        syllables,
        text,
    }))
}
