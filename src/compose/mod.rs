//! Song composition.
//!
//! Runs in three phases:
//! 1. every rhyme group tag of the template is resolved to a random stack of
//!    candidate pools that can serve it (`resolve`);
//! 2. one attempt walks the template with one pool per tag, drawing a random
//!    matching line per slot and failing outright on the first dead end
//!    (`attempt`);
//! 3. the song book pops pool combinations off the stacks and runs a fixed
//!    number of attempts for each, keeping only the successes.

mod attempt;
mod resolve;
mod template;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::config::ComposerConfig;
use crate::error::{ComposeError, SlotFailure};
use crate::models::Line;

pub use attempt::AttemptState;
pub use resolve::{
    group_demands, resolve_rhyme_groups, CombinationQueue, GroupDemand, PoolAssignment,
    PoolStacks,
};
pub use template::{LineSlot, SlotSpec, SongTemplate, WordRule, WordSlot};

use attempt::Attempt;

/// One filled template: a line per slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    pub lines: Vec<Line>,
    /// Pool each rhyme group drew from.
    pub pools: PoolAssignment,
}

impl fmt::Display for Song {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Result of one composition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success(Song),
    Failed,
}

/// Every song produced by one run, plus how the run went.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SongBook {
    pub songs: Vec<Song>,
    /// Pool combinations tried.
    pub combinations: usize,
    pub attempts: usize,
    pub failures: usize,
    /// The run stopped early on request.
    pub cancelled: bool,
}

/// Tags used at both line boundaries somewhere in the template.
fn dual_tags(template: &SongTemplate, tolerance: u32) -> BTreeSet<String> {
    group_demands(template, tolerance)
        .into_iter()
        .filter(|(_, demand)| demand.is_dual())
        .map(|(tag, _)| tag)
        .collect()
}

/// Walk `template` once with fixed pools. Exclusion state lives and dies
/// with the attempt.
pub fn compose_attempt<R: Rng>(
    conn: &Connection,
    template: &SongTemplate,
    assignment: &PoolAssignment,
    config: &ComposerConfig,
    rng: &mut R,
) -> AttemptOutcome {
    let dual = dual_tags(template, config.syllable_tolerance);
    run_attempt(conn, template, assignment, &dual, config, rng)
}

fn run_attempt<R: Rng>(
    conn: &Connection,
    template: &SongTemplate,
    assignment: &PoolAssignment,
    dual: &BTreeSet<String>,
    config: &ComposerConfig,
    rng: &mut R,
) -> AttemptOutcome {
    match Attempt::new(template, assignment, dual, config.syllable_tolerance).run(conn, rng) {
        Ok(song) => AttemptOutcome::Success(song),
        Err(failure @ SlotFailure::Store { .. }) => {
            warn!(error = %failure, "attempt aborted by store error");
            AttemptOutcome::Failed
        }
        Err(failure) => {
            debug!(reason = %failure, "attempt failed");
            AttemptOutcome::Failed
        }
    }
}

/// Generate a song book, seeding the RNG from `config.seed` or the OS.
pub fn compose_song_book(
    conn: &Connection,
    template: &SongTemplate,
    config: &ComposerConfig,
    cancel: &AtomicBool,
) -> Result<SongBook, ComposeError> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    compose_song_book_with_rng(conn, template, config, cancel, &mut rng)
}

/// Generate a song book with a caller-supplied RNG.
///
/// Fails only when the template is malformed, a rhyme group cannot be
/// resolved, or the store fails during resolution. Failed attempts are
/// counted and dropped; an empty book means every attempt failed. `cancel`
/// is checked between attempts, and songs collected before it was raised
/// are kept.
pub fn compose_song_book_with_rng<R: Rng>(
    conn: &Connection,
    template: &SongTemplate,
    config: &ComposerConfig,
    cancel: &AtomicBool,
    rng: &mut R,
) -> Result<SongBook, ComposeError> {
    template.validate()?;

    let stacks = resolve_rhyme_groups(conn, template, config, rng)?;
    let queue = CombinationQueue::new(stacks);
    let dual = dual_tags(template, config.syllable_tolerance);
    let mut book = SongBook::default();

    'combinations: while book.combinations < config.max_pool_combinations {
        let Some(assignment) = queue.pop()? else {
            break;
        };
        book.combinations += 1;
        debug!(pools = ?assignment, "trying pool combination");

        for _ in 0..config.variations_per_combination {
            if cancel.load(Ordering::Relaxed) {
                book.cancelled = true;
                break 'combinations;
            }
            book.attempts += 1;
            match run_attempt(conn, template, &assignment, &dual, config, rng) {
                AttemptOutcome::Success(song) => book.songs.push(song),
                AttemptOutcome::Failed => book.failures += 1,
            }
        }
    }

    info!(
        combinations = book.combinations,
        attempts = book.attempts,
        songs = book.songs.len(),
        cancelled = book.cancelled,
        "song book generated"
    );
    Ok(book)
}
