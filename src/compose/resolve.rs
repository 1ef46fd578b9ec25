//! Rhyme group resolution: turning template tags into stacks of candidate
//! pools before any line is drawn.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use anyhow::anyhow;
use rand::Rng;
use rusqlite::Connection;
use tracing::debug;

use super::template::{LineSlot, SongTemplate};
use crate::config::ComposerConfig;
use crate::db::{resolve_candidate_pools, PoolPosition, PoolQuery, SyllableWindow};
use crate::error::ComposeError;
use crate::models::Position;

/// One concrete pool per rhyme group tag.
pub type PoolAssignment = BTreeMap<String, i64>;

/// What a template asks of one rhyme group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupDemand {
    /// Slots using the tag for their first word.
    pub first: u32,
    /// Slots using the tag for their last word.
    pub last: u32,
    /// Line syllable windows of every slot carrying the tag.
    pub windows: BTreeSet<SyllableWindow>,
}

impl GroupDemand {
    /// Tag appears at both line boundaries somewhere in the template.
    pub fn is_dual(&self) -> bool {
        self.first > 0 && self.last > 0
    }

    /// Boundary the group's candidate pools must serve.
    pub fn position(&self) -> PoolPosition {
        match (self.first > 0, self.last > 0) {
            (true, true) => PoolPosition::Both,
            (true, false) => PoolPosition::First,
            _ => PoolPosition::Last,
        }
    }

    /// Lines a candidate pool must hold. Saturates rather than wrapping.
    pub fn quota(&self, multiplier: u32) -> u32 {
        let base = self.first.max(self.last).saturating_mul(multiplier);
        if self.is_dual() {
            base.saturating_mul(2)
        } else {
            base
        }
    }
}

/// Tally every tagged boundary word of the template, by tag.
pub fn group_demands(template: &SongTemplate, tolerance: u32) -> BTreeMap<String, GroupDemand> {
    let mut demands: BTreeMap<String, GroupDemand> = BTreeMap::new();

    for slot in &template.slots {
        let LineSlot::Spec(spec) = slot else {
            continue;
        };
        for position in Position::ALL {
            let Some(tag) = spec.word(position).tag() else {
                continue;
            };
            let demand = demands.entry(tag.to_string()).or_default();
            match position {
                Position::First => demand.first += 1,
                Position::Last => demand.last += 1,
            }
            if let Some(target) = spec.syllables {
                demand.windows.insert(SyllableWindow::around(target, tolerance));
            }
        }
    }

    demands
}

/// Candidate pools per tag, consumed one combination at a time. Groups may
/// share candidates, but no combination hands one pool to two groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStacks {
    stacks: BTreeMap<String, Vec<i64>>,
    remaining: usize,
}

impl PoolStacks {
    pub fn new(stacks: BTreeMap<String, Vec<i64>>) -> Self {
        // A template without tags still has exactly one (empty) combination.
        let remaining = stacks.values().map(Vec::len).min().unwrap_or(1);
        Self { stacks, remaining }
    }

    /// Tags in resolution order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.stacks.keys().map(String::as_str)
    }

    /// Upper bound on the combinations still to come.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Take one pool per tag, all distinct, preferring the top of each
    /// stack. `None` once no such choice is left.
    pub fn pop_combination(&mut self) -> Option<PoolAssignment> {
        if self.remaining == 0 {
            return None;
        }
        let stacks: Vec<&[i64]> = self.stacks.values().map(Vec::as_slice).collect();
        let Some(picks) = distinct_picks(&stacks) else {
            self.remaining = 0;
            return None;
        };

        self.remaining -= 1;
        Some(
            self.stacks
                .iter_mut()
                .zip(picks)
                .map(|((tag, stack), index)| (tag.clone(), stack.remove(index)))
                .collect(),
        )
    }

    /// First tag, in order, that cannot get a pool of its own alongside the
    /// tags before it.
    fn first_starved_tag(&self) -> Option<&str> {
        let stacks: Vec<&[i64]> = self.stacks.values().map(Vec::as_slice).collect();
        self.stacks
            .keys()
            .enumerate()
            .find(|(i, _)| distinct_picks(&stacks[..=*i]).is_none())
            .map(|(_, tag)| tag.as_str())
    }
}

/// Index into each stack such that every picked pool differs. Searches from
/// the top of each stack and backtracks on clashes.
fn distinct_picks(stacks: &[&[i64]]) -> Option<Vec<usize>> {
    fn search(stacks: &[&[i64]], used: &mut Vec<i64>, picks: &mut Vec<usize>) -> bool {
        let Some((stack, rest)) = stacks.split_first() else {
            return true;
        };
        for (index, pool) in stack.iter().enumerate().rev() {
            if used.contains(pool) {
                continue;
            }
            used.push(*pool);
            picks.push(index);
            if search(rest, used, picks) {
                return true;
            }
            used.pop();
            picks.pop();
        }
        false
    }

    let mut used = Vec::with_capacity(stacks.len());
    let mut picks = Vec::with_capacity(stacks.len());
    search(stacks, &mut used, &mut picks).then_some(picks)
}

/// `PoolStacks` shared by concurrent attempt groups. Each combination is
/// handed to exactly one caller.
#[derive(Debug, Default)]
pub struct CombinationQueue {
    stacks: Mutex<PoolStacks>,
}

impl CombinationQueue {
    pub fn new(stacks: PoolStacks) -> Self {
        Self {
            stacks: Mutex::new(stacks),
        }
    }

    /// Next combination, or `None` once any stack can no longer supply a
    /// distinct pool.
    pub fn pop(&self) -> anyhow::Result<Option<PoolAssignment>> {
        let mut stacks = self
            .stacks
            .lock()
            .map_err(|_| anyhow!("pool stack lock poisoned"))?;
        Ok(stacks.pop_combination())
    }
}

/// Find up to `config.max_pool_combinations` candidate pools for every tag.
///
/// Tags are resolved independently. Any tag left without candidates, or
/// without a candidate distinct from those of the other tags, fails the
/// whole template.
pub fn resolve_rhyme_groups<R: Rng>(
    conn: &Connection,
    template: &SongTemplate,
    config: &ComposerConfig,
    rng: &mut R,
) -> Result<PoolStacks, ComposeError> {
    let demands = group_demands(template, config.syllable_tolerance);
    let mut stacks = BTreeMap::new();

    for (tag, demand) in demands {
        let query = PoolQuery {
            position: demand.position(),
            quota: demand.quota(config.quota_multiplier),
            syllable_windows: demand.windows.iter().copied().collect(),
            exclude_pools: Vec::new(),
            limit: config.max_pool_combinations,
        };
        let pools = resolve_candidate_pools(conn, &query, rng)?;
        debug!(tag = %tag, quota = query.quota, candidates = pools.len(), "rhyme group resolved");

        if pools.is_empty() {
            return Err(ComposeError::Resolution { tag });
        }
        stacks.insert(tag, pools);
    }

    let stacks = PoolStacks::new(stacks);
    if let Some(tag) = stacks.first_starved_tag() {
        return Err(ComposeError::Resolution {
            tag: tag.to_string(),
        });
    }
    Ok(stacks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::template::{SlotSpec, WordSlot};

    fn spec(syllables: Option<u32>, first: WordSlot, last: WordSlot) -> LineSlot {
        LineSlot::Spec(SlotSpec {
            syllables,
            first,
            last,
        })
    }

    #[test]
    fn tallies_positions_windows_and_dual_use() {
        let template = SongTemplate::new(vec![
            spec(Some(4), WordSlot::default(), WordSlot::rhyme("A")),
            spec(Some(8), WordSlot::rhyme("Q"), WordSlot::rhyme("A")),
            spec(Some(9), WordSlot::rhyme("Q"), WordSlot::same_as(1)),
            LineSlot::Repeat { repeat: 0 },
            spec(None, WordSlot::default(), WordSlot::rhyme("Q")),
        ]);

        let demands = group_demands(&template, 1);
        let a = &demands["A"];
        assert_eq!((a.first, a.last), (0, 2));
        assert_eq!(a.position(), PoolPosition::Last);
        assert_eq!(a.quota(2), 4);
        assert_eq!(
            a.windows.iter().copied().collect::<Vec<_>>(),
            vec![SyllableWindow { min: 3, max: 5 }, SyllableWindow { min: 7, max: 9 }]
        );

        let q = &demands["Q"];
        assert_eq!((q.first, q.last), (2, 1));
        assert!(q.is_dual());
        assert_eq!(q.position(), PoolPosition::Both);
        assert_eq!(q.quota(2), 8);
    }

    #[test]
    fn stacks_pop_until_the_shortest_runs_out() {
        let mut stacks = PoolStacks::new(BTreeMap::from([
            ("A".to_string(), vec![1, 2, 3]),
            ("B".to_string(), vec![7, 8]),
        ]));
        assert_eq!(stacks.remaining(), 2);
        assert_eq!(
            stacks.pop_combination(),
            Some(BTreeMap::from([("A".to_string(), 3), ("B".to_string(), 8)]))
        );
        assert_eq!(
            stacks.pop_combination(),
            Some(BTreeMap::from([("A".to_string(), 2), ("B".to_string(), 7)]))
        );
        assert_eq!(stacks.pop_combination(), None);
    }

    #[test]
    fn untagged_templates_get_one_empty_combination() {
        let queue = CombinationQueue::new(PoolStacks::new(BTreeMap::new()));
        assert_eq!(queue.pop().unwrap(), Some(PoolAssignment::new()));
        assert_eq!(queue.pop().unwrap(), None);
    }

    #[test]
    fn quotas_saturate_instead_of_overflowing() {
        let demand = GroupDemand {
            first: 3,
            last: 2,
            windows: BTreeSet::new(),
        };
        assert_eq!(demand.quota(u32::MAX), u32::MAX);
        assert_eq!(demand.quota(u32::MAX / 2), u32::MAX);
    }

    #[test]
    fn combinations_never_hand_one_pool_to_two_tags() {
        let mut stacks = PoolStacks::new(BTreeMap::from([
            ("A".to_string(), vec![1, 2]),
            ("B".to_string(), vec![2, 1]),
        ]));
        assert_eq!(
            stacks.pop_combination(),
            Some(BTreeMap::from([("A".to_string(), 2), ("B".to_string(), 1)]))
        );
        assert_eq!(
            stacks.pop_combination(),
            Some(BTreeMap::from([("A".to_string(), 1), ("B".to_string(), 2)]))
        );
        assert_eq!(stacks.pop_combination(), None);
    }

    #[test]
    fn clashing_tops_backtrack_to_a_distinct_choice() {
        let mut stacks = PoolStacks::new(BTreeMap::from([
            ("A".to_string(), vec![4, 9]),
            ("B".to_string(), vec![9]),
        ]));
        assert_eq!(stacks.first_starved_tag(), None);
        assert_eq!(
            stacks.pop_combination(),
            Some(BTreeMap::from([("A".to_string(), 4), ("B".to_string(), 9)]))
        );
        assert_eq!(stacks.pop_combination(), None);

        let starved = PoolStacks::new(BTreeMap::from([
            ("A".to_string(), vec![5]),
            ("B".to_string(), vec![5]),
        ]));
        assert_eq!(starved.first_starved_tag(), Some("B"));
    }
}
