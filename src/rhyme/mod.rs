//! Rhyme knowledge: the oracle and estimator seams, their dictionary-backed
//! implementations, and the builder that grows rhyme pools from them.

mod cmudict;
mod pool_builder;
mod syllables;

use std::collections::BTreeMap;

use crate::error::OracleError;

pub use cmudict::CmuDictOracle;
pub use pool_builder::{normalize_word, rhyme_hint, BuilderStats, RhymePoolBuilder};
pub use syllables::HeuristicEstimator;

/// Perfect rhymes of a word, grouped by the rhyming word's syllable count.
pub type RhymesBySyllables = BTreeMap<u32, Vec<String>>;

/// Source of perfect-rhyme relations.
pub trait RhymeOracle {
    /// Perfect rhymes of `word`. `OracleError::NotFound` when the oracle
    /// knows none.
    fn perfect_rhymes(&self, word: &str) -> Result<RhymesBySyllables, OracleError>;
}

/// Approximate syllable counter.
pub trait SyllableEstimator {
    fn estimate(&self, word: &str) -> u32;
}

impl<T: RhymeOracle + ?Sized> RhymeOracle for &T {
    fn perfect_rhymes(&self, word: &str) -> Result<RhymesBySyllables, OracleError> {
        (**self).perfect_rhymes(word)
    }
}

impl<T: SyllableEstimator + ?Sized> SyllableEstimator for &T {
    fn estimate(&self, word: &str) -> u32 {
        (**self).estimate(word)
    }
}
