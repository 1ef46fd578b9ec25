//! A single composition attempt: walk the template once with fixed pool
//! assignments, drawing one random line per slot.
//!
//! There is no local repair. The first slot that cannot be filled fails the
//! whole attempt, and the song-book loop simply tries again.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use rusqlite::Connection;

use super::resolve::PoolAssignment;
use super::template::{LineSlot, SlotSpec, SongTemplate, WordRule};
use super::Song;
use crate::db::{sample_line, LinePredicate, SyllableWindow};
use crate::error::SlotFailure;
use crate::models::{Line, Position};

/// Where an attempt stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    /// About to fill the slot at this index.
    Walking(usize),
    Success,
    Failed,
}

/// Words already emitted per rhyme group and boundary during one attempt.
#[derive(Debug, Default)]
struct ExclusionState {
    used: BTreeMap<(String, Position), BTreeSet<String>>,
}

impl ExclusionState {
    fn used(&self, tag: &str, position: Position) -> impl Iterator<Item = &String> {
        self.used
            .get(&(tag.to_string(), position))
            .into_iter()
            .flatten()
    }

    fn record(&mut self, tag: &str, position: Position, word: &str) {
        self.used
            .entry((tag.to_string(), position))
            .or_default()
            .insert(word.to_string());
    }
}

pub(crate) struct Attempt<'a> {
    template: &'a SongTemplate,
    assignment: &'a PoolAssignment,
    /// Tags used at both boundaries; their lines must start and end on
    /// different words.
    dual_tags: &'a BTreeSet<String>,
    tolerance: u32,
    lines: Vec<Line>,
    exclusions: ExclusionState,
    state: AttemptState,
}

impl<'a> Attempt<'a> {
    pub(crate) fn new(
        template: &'a SongTemplate,
        assignment: &'a PoolAssignment,
        dual_tags: &'a BTreeSet<String>,
        tolerance: u32,
    ) -> Self {
        Self {
            template,
            assignment,
            dual_tags,
            tolerance,
            lines: Vec::with_capacity(template.len()),
            exclusions: ExclusionState::default(),
            state: AttemptState::Walking(0),
        }
    }

    /// Walk every slot. The song on success, the first failure otherwise.
    pub(crate) fn run<R: Rng>(mut self, conn: &Connection, rng: &mut R) -> Result<Song, SlotFailure> {
        while let AttemptState::Walking(_) = self.state {
            self.step(conn, rng)?;
        }
        Ok(Song {
            lines: self.lines,
            pools: self.assignment.clone(),
        })
    }

    /// Advance by one slot.
    fn step<R: Rng>(&mut self, conn: &Connection, rng: &mut R) -> Result<(), SlotFailure> {
        let AttemptState::Walking(index) = self.state else {
            return Ok(());
        };
        if index == self.template.len() {
            self.state = AttemptState::Success;
            return Ok(());
        }

        let template = self.template;
        let resolved = match &template.slots[index] {
            LineSlot::Repeat { repeat } => self.repeated_line(index, *repeat),
            LineSlot::Spec(spec) => self.sample_slot(conn, index, spec, rng),
        };

        match resolved {
            Ok(line) => {
                self.lines.push(line);
                self.state = AttemptState::Walking(index + 1);
                Ok(())
            }
            Err(failure) => {
                self.state = AttemptState::Failed;
                Err(failure)
            }
        }
    }

    fn repeated_line(&self, slot: usize, target: usize) -> Result<Line, SlotFailure> {
        if target >= slot {
            return Err(SlotFailure::InvalidReference { slot, target });
        }
        self.lines
            .get(target)
            .cloned()
            .ok_or(SlotFailure::InvalidReference { slot, target })
    }

    fn sample_slot<R: Rng>(
        &mut self,
        conn: &Connection,
        slot: usize,
        spec: &SlotSpec,
        rng: &mut R,
    ) -> Result<Line, SlotFailure> {
        let predicate = self.predicate(slot, spec)?;
        let line = sample_line(conn, &predicate, rng)
            .map_err(|source| SlotFailure::Store { slot, source })?
            .ok_or(SlotFailure::NoMatch { slot })?;

        for position in Position::ALL {
            if let Some(tag) = spec.word(position).tag() {
                self.exclusions.record(tag, position, line.word_at(position));
            }
        }
        Ok(line)
    }

    fn predicate(&self, slot: usize, spec: &SlotSpec) -> Result<LinePredicate, SlotFailure> {
        let mut predicate = LinePredicate {
            syllables: spec
                .syllables
                .map(|target| SyllableWindow::around(target, self.tolerance)),
            ..LinePredicate::default()
        };

        for position in Position::ALL {
            let word = spec.word(position);
            let filter = predicate.word_mut(position);
            filter.exclude = word.exclude.clone();
            filter.include_only = word.include_only.clone();
            filter.syllables = word.syllables;

            match &word.rule {
                WordRule::Any => {}
                WordRule::Rhyme(tag) => {
                    let pool = self.assignment.get(tag).copied().ok_or_else(|| {
                        SlotFailure::UnassignedGroup {
                            slot,
                            tag: tag.clone(),
                        }
                    })?;
                    filter.pool = Some(pool);
                    filter
                        .exclude
                        .extend(self.exclusions.used(tag, position).cloned());
                    if self.dual_tags.contains(tag) {
                        predicate.distinct_ends = true;
                    }
                }
                WordRule::SameAs(target) => {
                    let target = *target;
                    let earlier = self
                        .lines
                        .get(target)
                        .filter(|_| target < slot)
                        .ok_or(SlotFailure::InvalidReference { slot, target })?;
                    filter.equals = Some(earlier.word_at(position).to_string());
                }
            }
        }

        Ok(predicate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::template::WordSlot;
    use crate::db::{open_in_memory, upsert_line, upsert_rhyme_pool, upsert_rhyme_word, upsert_source};
    use crate::models::PERFECT_RHYME;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn corpus() -> (Connection, i64) {
        let conn = open_in_memory().unwrap();
        let pool = upsert_rhyme_pool(&conn, "ats", "cats").unwrap();
        for word in ["cats", "hats"] {
            upsert_rhyme_word(&conn, word, 1, PERFECT_RHYME, pool).unwrap();
        }
        let source = upsert_source(&conn, "fixture").unwrap();
        upsert_line(&conn, "i", "cats", "i like cats", 3, source).unwrap();
        upsert_line(&conn, "no", "hats", "no hats", 2, source).unwrap();
        (conn, pool)
    }

    fn rhyme_last(tag: &str) -> LineSlot {
        LineSlot::Spec(SlotSpec {
            last: WordSlot::rhyme(tag),
            ..SlotSpec::default()
        })
    }

    #[test]
    fn walks_slot_by_slot_to_success() {
        let (conn, pool) = corpus();
        let template = SongTemplate::new(vec![rhyme_last("A"), LineSlot::Repeat { repeat: 0 }]);
        let assignment = PoolAssignment::from([("A".to_string(), pool)]);
        let dual = BTreeSet::new();
        let mut rng = StdRng::seed_from_u64(5);

        let mut attempt = Attempt::new(&template, &assignment, &dual, 1);
        assert_eq!(attempt.state, AttemptState::Walking(0));
        attempt.step(&conn, &mut rng).unwrap();
        assert_eq!(attempt.state, AttemptState::Walking(1));
        attempt.step(&conn, &mut rng).unwrap();
        assert_eq!(attempt.state, AttemptState::Walking(2));
        attempt.step(&conn, &mut rng).unwrap();
        assert_eq!(attempt.state, AttemptState::Success);
        assert_eq!(attempt.lines[0], attempt.lines[1]);
    }

    #[test]
    fn used_rhyme_words_are_excluded_for_the_rest_of_the_attempt() {
        let (conn, pool) = corpus();
        let template = SongTemplate::new(vec![rhyme_last("A"), rhyme_last("A"), rhyme_last("A")]);
        let assignment = PoolAssignment::from([("A".to_string(), pool)]);
        let dual = BTreeSet::new();
        let mut rng = StdRng::seed_from_u64(9);

        let mut attempt = Attempt::new(&template, &assignment, &dual, 1);
        attempt.step(&conn, &mut rng).unwrap();
        attempt.step(&conn, &mut rng).unwrap();
        assert_ne!(attempt.lines[0].last_word, attempt.lines[1].last_word);

        let failure = attempt.step(&conn, &mut rng).unwrap_err();
        assert!(matches!(failure, SlotFailure::NoMatch { slot: 2 }));
        assert_eq!(attempt.state, AttemptState::Failed);
    }

    #[test]
    fn unresolved_references_fail_the_attempt() {
        let (conn, _) = corpus();
        let template = SongTemplate::new(vec![LineSlot::Repeat { repeat: 1 }, rhyme_last("A")]);
        let assignment = PoolAssignment::new();
        let dual = BTreeSet::new();
        let mut rng = StdRng::seed_from_u64(1);

        let failure = Attempt::new(&template, &assignment, &dual, 1)
            .run(&conn, &mut rng)
            .unwrap_err();
        assert!(matches!(failure, SlotFailure::InvalidReference { slot: 0, target: 1 }));
    }

    #[test]
    fn tags_without_a_pool_fail_the_attempt() {
        let (conn, _) = corpus();
        let template = SongTemplate::new(vec![rhyme_last("B")]);
        let assignment = PoolAssignment::new();
        let dual = BTreeSet::new();
        let mut rng = StdRng::seed_from_u64(1);

        let failure = Attempt::new(&template, &assignment, &dual, 1)
            .run(&conn, &mut rng)
            .unwrap_err();
        assert!(matches!(failure, SlotFailure::UnassignedGroup { slot: 0, ref tag } if tag == "B"));
    }
}
