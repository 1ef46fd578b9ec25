//! Tuning knobs for the composer and the on-disk locations the binary uses.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use directories::BaseDirs;

/// Folder name used beneath the user's home directory for application data.
const DATA_DIR_NAME: &str = ".rhymadex";
/// SQLite file name stored inside the application data directory.
const DB_FILE_NAME: &str = "rhymadex.sqlite";

/// Parameters of a song-book run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposerConfig {
    /// Factor applied to a group's per-position occurrence count to get its
    /// quota. Doubled again for groups used at both line boundaries.
    pub quota_multiplier: u32,
    /// Allowed distance between a line's syllable count and its target.
    pub syllable_tolerance: u32,
    /// Candidate pools requested per group, and the cap on pool combinations.
    pub max_pool_combinations: usize,
    /// Independent attempts per pool combination.
    pub variations_per_combination: usize,
    /// Fixed RNG seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            quota_multiplier: 2,
            syllable_tolerance: 1,
            max_pool_combinations: 8,
            variations_per_combination: 4,
            seed: None,
        }
    }
}

/// Application data directory inside the user's home.
pub fn data_dir() -> Result<PathBuf> {
    let base_dirs = BaseDirs::new().ok_or_else(|| anyhow!("could not locate home directory"))?;
    Ok(base_dirs.home_dir().join(DATA_DIR_NAME))
}

/// Default location of the corpus database.
pub fn default_db_path() -> Result<PathBuf> {
    Ok(data_dir()?.join(DB_FILE_NAME))
}
