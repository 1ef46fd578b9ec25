//! Typed errors for the places where callers need to tell failures apart.
//! Plain persistence helpers keep returning `anyhow::Result`; the enums here
//! cover the cases the composer and the bootstrap code branch on.

use thiserror::Error;

/// Problems detected while opening the corpus database.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The database was written by a different schema revision. There is no
    /// automatic migration, so the caller has to stop.
    #[error("schema version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: i64, found: i64 },
}

/// Failure modes of a rhyme oracle lookup.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("no rhymes known for \"{0}\"")]
    NotFound(String),
    #[error("rhyme oracle unavailable: {0}")]
    Unavailable(String),
}

/// A song template that can never be walked, regardless of corpus contents.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template has no slots")]
    Empty,
    #[error("slot {slot} references slot {target}, which is not strictly earlier")]
    ForwardReference { slot: usize, target: usize },
    #[error("slot {slot} has an empty rhyme group tag")]
    EmptyTag { slot: usize },
}

/// Errors surfaced by a song-book run. Individual attempt failures are
/// absorbed by the run and never show up here.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("no rhyme pool can satisfy group \"{tag}\"")]
    Resolution { tag: String },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Reasons a single composition attempt stops early.
#[derive(Debug, Error)]
pub(crate) enum SlotFailure {
    #[error("slot {slot}: no line matches")]
    NoMatch { slot: usize },
    #[error("slot {slot}: back-reference to unresolved slot {target}")]
    InvalidReference { slot: usize, target: usize },
    #[error("slot {slot}: rhyme group \"{tag}\" has no assigned pool")]
    UnassignedGroup { slot: usize, tag: String },
    #[error("slot {slot}: store error: {source}")]
    Store {
        slot: usize,
        #[source]
        source: anyhow::Error,
    },
}
