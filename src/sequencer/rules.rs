//! Hidden per-lane minimum play counts ("challenges")
use std::ops::RangeInclusive;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

use super::{Group, Lane, MAX_LANES};

/// Lanes constrained per group
pub const RULES_PER_GROUP: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    group: Group,
    required: [Option<u32>; MAX_LANES],
}

impl RuleSet {
    /// An unconstrained rule set
    pub fn empty(group: Group) -> Self {
        Self {
            group,
            required: [None; MAX_LANES],
        }
    }

    /// Pick two distinct lanes of `group` and give each a required count drawn
    /// from `counts`.
    pub fn generate<R: Rng + ?Sized>(
        group: Group,
        counts: RangeInclusive<u32>,
        rng: &mut R,
    ) -> Self {
        let lane_count = group.lane_count();
        debug_assert!(lane_count >= RULES_PER_GROUP);

        let mut rules = Self::empty(group);
        // sampling without replacement keeps the lanes distinct
        for i in index::sample(rng, lane_count, RULES_PER_GROUP) {
            rules.required[i] = Some(rng.gen_range(counts.clone()));
        }
        rules
    }

    /// Builder for fixed challenges
    pub fn with_requirement(mut self, lane: Lane, count: u32) -> Self {
        self.required[lane.index()] = Some(count);
        self
    }

    pub fn group(&self) -> Group {
        self.group
    }

    pub fn requirement_for(&self, lane: Lane) -> Option<u32> {
        self.required[lane.index()]
    }

    /// Constrained lanes in lane order
    pub fn iter(&self) -> impl Iterator<Item = (Lane, u32)> + '_ {
        self.group
            .lanes()
            .filter_map(|lane| self.requirement_for(lane).map(|count| (lane, count)))
    }

    /// Whether `counts` meets every requirement
    pub fn is_met_by(&self, counts: &[u32; MAX_LANES]) -> bool {
        self.iter().all(|(lane, required)| counts[lane.index()] >= required)
    }
}

/// Rule sets of every group for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rules {
    sets: [RuleSet; Group::COUNT],
}

impl Rules {
    pub fn generate<R: Rng + ?Sized>(counts: RangeInclusive<u32>, rng: &mut R) -> Self {
        Self {
            sets: Group::ALL.map(|group| RuleSet::generate(group, counts.clone(), rng)),
        }
    }

    /// Seeded generation. `None` seeds from the wall clock.
    pub fn from_seed(seed: Option<u64>, counts: RangeInclusive<u32>) -> Self {
        let seed = seed.unwrap_or_else(wall_clock_seed);
        tracing::debug!(seed, "generating rules");
        Self::generate(counts, &mut StdRng::seed_from_u64(seed))
    }

    pub fn from_sets(sets: [RuleSet; Group::COUNT]) -> Self {
        debug_assert!(Group::ALL.iter().all(|g| sets[g.index()].group() == *g));
        Self { sets }
    }

    pub fn for_group(&self, group: Group) -> &RuleSet {
        &self.sets[group.index()]
    }

    pub fn requirement_for(&self, group: Group, lane: Lane) -> Option<u32> {
        self.for_group(group).requirement_for(lane)
    }
}

fn wall_clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
