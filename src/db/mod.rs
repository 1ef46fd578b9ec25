//! Persistence module split across logical submodules. Every function takes a
//! borrowed `rusqlite::Connection`; the caller owns the connection and decides
//! how it is shared.

mod connection;
mod queries;
mod rhymes;
mod sources;

pub use connection::{ensure_schema, open_in_memory, open_store, SCHEMA_VERSION};
pub use queries::{
    resolve_candidate_pools, sample_line, LinePredicate, PoolPosition, PoolQuery,
    SyllableWindow, WordFilter,
};
pub use rhymes::{
    fetch_pool_words, list_known_rhyme_words, pool_for_word, upsert_rhyme_pool,
    upsert_rhyme_word,
};
pub use sources::{
    count_lines, delete_lines_by_source, delete_source, fetch_line, fetch_lines_for_source,
    list_sources, upsert_line, upsert_source,
};
