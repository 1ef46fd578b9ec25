//! Domain models that mirror the SQLite schema and get passed between the
//! ingestor, the store helpers and the composer. These stay light-weight data
//! holders; the behaviour lives in the modules that own each concern.

use std::fmt;

/// Rhyme type recorded for every pool membership. Only perfect rhymes are
/// gathered today, but the column keeps memberships unique per type.
pub const PERFECT_RHYME: &str = "perfect";

#[derive(Debug, Clone)]
/// A named body of text that lines were cut from.
pub struct Source {
    pub id: i64,
    /// Unique name, typically the file stem of the ingested text.
    pub name: String,
    /// SQLite `CURRENT_TIMESTAMP` text captured on first insert.
    pub created_at: String,
}

#[derive(Debug, Clone)]
/// Listing row for the `sources` command.
pub struct SourceSummary {
    pub source: Source,
    pub line_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// An accepted corpus line. Both boundary words belong to some rhyme pool.
pub struct Line {
    pub id: i64,
    pub text: String,
    pub first_word: String,
    pub last_word: String,
    /// Estimated syllable count of the whole line.
    pub syllables: u32,
    pub source_id: i64,
}

impl Line {
    /// Word at one boundary of the line.
    pub fn word_at(&self, position: Position) -> &str {
        match position {
            Position::First => &self.first_word,
            Position::Last => &self.last_word,
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A set of words treated as mutually rhyming.
pub struct RhymePool {
    pub id: i64,
    /// Trailing letter fragment of the seed, or `"Unknown"`.
    pub hint: String,
    /// Word whose oracle lookup created the pool.
    pub seed: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Boundary of a line a rhyme constraint applies to.
pub enum Position {
    First,
    Last,
}

impl Position {
    pub const ALL: [Position; 2] = [Position::First, Position::Last];

    /// Column holding the word for this boundary.
    pub(crate) fn column(self) -> &'static str {
        match self {
            Position::First => "first_word",
            Position::Last => "last_word",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::First => write!(f, "first"),
            Position::Last => write!(f, "last"),
        }
    }
}
