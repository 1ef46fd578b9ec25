//! Core library surface for rhymadex: a rhyme-linked line corpus and the
//! constraint-driven song composer built on top of it.
//!
//! The binary only parses arguments and prints; everything it does goes
//! through the functions re-exported here.
pub mod compose;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod models;
pub mod rhyme;
pub mod ui;

/// Store bootstrap and the source maintenance calls used by the CLI.
pub use db::{delete_source, list_sources, open_in_memory, open_store};

pub use compose::{compose_song_book, Song, SongBook, SongTemplate};
pub use config::ComposerConfig;
pub use error::{ComposeError, OracleError, SchemaError, TemplateError};
pub use ingest::{ingest, ingest_file, IngestReport};
pub use models::{Line, Position, RhymePool, Source};
pub use rhyme::{CmuDictOracle, HeuristicEstimator, RhymeOracle, RhymePoolBuilder, SyllableEstimator};

/// Read-only song book browser.
pub use ui::run_browser;
