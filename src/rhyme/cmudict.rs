//! Rhyme oracle backed by a CMU-style pronouncing dictionary
//! (`WORD  P1 P2 ...`, vowels carrying a stress digit).

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::{
    normalize_word, HeuristicEstimator, RhymeOracle, RhymesBySyllables, SyllableEstimator,
};
use crate::error::OracleError;

/// In-memory pronouncing dictionary indexed by rhyme key.
#[derive(Debug, Default)]
pub struct CmuDictOracle {
    /// Word to each of its pronunciations.
    pronunciations: HashMap<String, Vec<Vec<String>>>,
    /// Rhyme key (phones from the last stressed vowel on) to words.
    by_rhyme: HashMap<String, BTreeSet<String>>,
}

impl CmuDictOracle {
    /// Read a dictionary file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open pronouncing dictionary {}", path.display()))?;
        let oracle = Self::from_reader(BufReader::new(file))?;
        info!(
            path = %path.display(),
            words = oracle.pronunciations.len(),
            "pronouncing dictionary loaded"
        );
        Ok(oracle)
    }

    /// Parse `WORD  PH1 PH2 ...` entries. Lines starting with `;;;` are
    /// comments, and alternate pronunciations (`WORD(2)`) join their base word.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut oracle = Self::default();
        for line in reader.lines() {
            let line = line.context("failed to read pronouncing dictionary")?;
            let line = line.trim();
            if line.is_empty() || line.starts_with(";;;") {
                continue;
            }

            let mut parts = line.split_whitespace();
            let Some(head) = parts.next() else {
                continue;
            };
            let phones: Vec<String> = parts.map(str::to_string).collect();
            if phones.is_empty() {
                continue;
            }

            // "READ(2)" is the second pronunciation of "read". Entries are
            // keyed like corpus words, so "THAT'S" is found as "thats".
            let word = normalize_word(head.split_once('(').map_or(head, |(base, _)| base));
            if word.is_empty() {
                continue;
            }

            if let Some(key) = rhyme_key(&phones) {
                oracle
                    .by_rhyme
                    .entry(key)
                    .or_default()
                    .insert(word.clone());
            }
            oracle.pronunciations.entry(word).or_default().push(phones);
        }
        Ok(oracle)
    }

    fn syllables_of(&self, word: &str) -> Option<u32> {
        self.pronunciations
            .get(word)
            .and_then(|prons| prons.first())
            .map(|phones| vowel_count(phones))
    }
}

fn is_vowel_phone(phone: &str) -> bool {
    phone.ends_with(|c: char| c.is_ascii_digit())
}

fn vowel_count(phones: &[String]) -> u32 {
    phones.iter().filter(|p| is_vowel_phone(p)).count() as u32
}

/// Phones from the last primary-stressed vowel to the end. Falls back to the
/// last secondary-stressed vowel, then to the last vowel of any kind.
fn rhyme_key(phones: &[String]) -> Option<String> {
    let start = ['1', '2', '0'].iter().find_map(|stress| {
        phones
            .iter()
            .rposition(|p| is_vowel_phone(p) && p.ends_with(*stress))
    })?;
    Some(phones[start..].join(" "))
}

impl RhymeOracle for CmuDictOracle {
    fn perfect_rhymes(&self, word: &str) -> Result<RhymesBySyllables, OracleError> {
        let prons = self
            .pronunciations
            .get(word)
            .ok_or_else(|| OracleError::NotFound(word.to_string()))?;

        let mut grouped: BTreeMap<u32, BTreeSet<&str>> = BTreeMap::new();
        for key in prons.iter().filter_map(|phones| rhyme_key(phones)) {
            let Some(words) = self.by_rhyme.get(&key) else {
                continue;
            };
            for other in words.iter().filter(|w| w.as_str() != word) {
                let syllables = self.syllables_of(other).unwrap_or_default();
                grouped.entry(syllables).or_default().insert(other.as_str());
            }
        }

        if grouped.is_empty() {
            return Err(OracleError::NotFound(word.to_string()));
        }
        Ok(grouped
            .into_iter()
            .map(|(syllables, words)| (syllables, words.into_iter().map(str::to_string).collect()))
            .collect())
    }
}

impl SyllableEstimator for CmuDictOracle {
    fn estimate(&self, word: &str) -> u32 {
        self.syllables_of(word)
            .unwrap_or_else(|| HeuristicEstimator.estimate(word))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DICT: &str = ";;; sample
CATS  K AE1 T S
HATS  HH AE1 T S
ACROBATS  AE1 K R AH0 B AE2 T S
DOG  D AO1 G
READ  R IY1 D
READ(2)  R EH1 D
BREED  B R IY1 D
BED  B EH1 D
THAT'S  DH AE1 T S
";

    fn oracle() -> CmuDictOracle {
        CmuDictOracle::from_reader(DICT.as_bytes()).unwrap()
    }

    #[test]
    fn groups_rhymes_by_syllable_count() {
        let rhymes = oracle().perfect_rhymes("cats").unwrap();
        assert_eq!(
            rhymes.get(&1),
            Some(&vec!["hats".to_string(), "thats".to_string()])
        );
        // "acrobats" stresses its first vowel, so it is not a perfect rhyme.
        assert!(rhymes.get(&3).is_none());
    }

    #[test]
    fn variant_pronunciations_all_contribute() {
        let rhymes = oracle().perfect_rhymes("read").unwrap();
        assert_eq!(rhymes[&1], vec!["bed".to_string(), "breed".to_string()]);
    }

    #[test]
    fn unknown_or_lonely_words_are_not_found() {
        let oracle = oracle();
        assert!(matches!(oracle.perfect_rhymes("zebra"), Err(OracleError::NotFound(_))));
        assert!(matches!(oracle.perfect_rhymes("dog"), Err(OracleError::NotFound(_))));
    }

    #[test]
    fn estimates_from_pronunciation_then_heuristic() {
        let oracle = oracle();
        assert_eq!(oracle.estimate("acrobats"), 3);
        assert_eq!(oracle.estimate("window"), 2);
    }

    #[test]
    fn contractions_are_keyed_without_apostrophes() {
        let oracle = oracle();
        let rhymes = oracle.perfect_rhymes("thats").unwrap();
        assert_eq!(rhymes[&1], vec!["cats".to_string(), "hats".to_string()]);
        assert_eq!(oracle.estimate("thats"), 1);
    }
}
