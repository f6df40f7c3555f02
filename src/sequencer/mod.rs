//! Core sequencer logic - groups, step grids and the shared grid handle
//!
//! Indices are typed: a `Step` is always in 0..16 and a `Lane` always fits its
//! group, so the grid operations themselves cannot be handed out-of-range values.
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub mod challenge;
pub mod clock;
pub mod editor;
pub mod playback;
pub mod rules;
pub mod trigger;

/// Steps per bar (sixteenth notes)
pub const STEPS: usize = 16;

/// Most lanes any group has
pub const MAX_LANES: usize = 5;

/// An instrument track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Group {
    Drum,
    Piano,
}

impl Group {
    pub const ALL: [Group; 2] = [Group::Drum, Group::Piano];
    pub const COUNT: usize = Self::ALL.len();

    pub const fn index(self) -> usize {
        match self {
            Group::Drum => 0,
            Group::Piano => 1,
        }
    }

    /// Number of samples registered for this group
    pub const fn lane_count(self) -> usize {
        match self {
            Group::Drum => 5,
            Group::Piano => 5,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Group::Drum => "drum",
            Group::Piano => "piano",
        }
    }

    pub fn lane_label(self, lane: Lane) -> &'static str {
        const DRUM: [&str; 5] = ["Kick", "Snare", "Stick", "HiHat", "OpenHat"];
        const PIANO: [&str; 5] = ["f", "d", "b", "g", "e"];
        match self {
            Group::Drum => DRUM[lane.index()],
            Group::Piano => PIANO[lane.index()],
        }
    }

    pub fn lanes(self) -> impl Iterator<Item = Lane> {
        (0..self.lane_count()).map(|i| Lane(i as u8))
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One of the 16 ordered slots of a grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Step(u8);

impl Step {
    pub const LAST: Step = Step(STEPS as u8 - 1);

    pub fn new(index: usize) -> Option<Self> {
        (index < STEPS).then(|| Self(index as u8))
    }

    pub fn all() -> impl Iterator<Item = Step> {
        (0..STEPS as u8).map(Step)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One selectable sample within a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lane(u8);

impl Lane {
    pub fn new(group: Group, index: usize) -> Option<Self> {
        (index < group.lane_count()).then(|| Self(index as u8))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lanes lit at one step. A lane is either in the set or not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LaneSet(u8);

impl LaneSet {
    pub fn contains(self, lane: Lane) -> bool {
        self.0 & (1 << lane.0) != 0
    }

    pub fn insert(&mut self, lane: Lane) {
        self.0 |= 1 << lane.0;
    }

    pub fn remove(&mut self, lane: Lane) {
        self.0 &= !(1 << lane.0);
    }

    /// Returns whether the lane is active afterwards
    pub fn toggle(&mut self, lane: Lane) -> bool {
        self.0 ^= 1 << lane.0;
        self.contains(lane)
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Lane> {
        (0..MAX_LANES as u8)
            .filter(move |&i| self.0 & (1 << i) != 0)
            .map(Lane)
    }
}

impl FromIterator<Lane> for LaneSet {
    fn from_iter<I: IntoIterator<Item = Lane>>(iter: I) -> Self {
        let mut set = LaneSet::default();
        for lane in iter {
            set.insert(lane);
        }
        set
    }
}

/// Per-lane trigger counts across all steps of one grid
pub type LaneCounts = [u32; MAX_LANES];

/// The 16 steps of one group
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepGrid {
    steps: [LaneSet; STEPS],
}

impl StepGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step_lanes(&self, step: Step) -> LaneSet {
        self.steps[step.index()]
    }

    pub fn lane_is_active(&self, step: Step, lane: Lane) -> bool {
        self.steps[step.index()].contains(lane)
    }

    pub fn set(&mut self, step: Step, lane: Lane, value: bool) {
        let lanes = &mut self.steps[step.index()];
        if value {
            lanes.insert(lane);
        } else {
            lanes.remove(lane);
        }
    }

    /// Returns whether the lane is active afterwards
    pub fn toggle(&mut self, step: Step, lane: Lane) -> bool {
        self.steps[step.index()].toggle(lane)
    }

    /// How many steps include each lane
    pub fn lane_counts(&self) -> LaneCounts {
        let mut counts = [0; MAX_LANES];
        for lanes in &self.steps {
            for lane in lanes.iter() {
                counts[lane.index()] += 1;
            }
        }
        counts
    }
}

/// Grids of every group, shared between the editor and the clock thread.
///
/// Each group sits behind its own lock and every method holds it for a single
/// read or write only.
#[derive(Debug, Clone, Default)]
pub struct SharedGrid {
    groups: Arc<[RwLock<StepGrid>; Group::COUNT]>,
}

impl SharedGrid {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self, group: Group) -> RwLockReadGuard<'_, StepGrid> {
        self.groups[group.index()]
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, group: Group) -> RwLockWriteGuard<'_, StepGrid> {
        self.groups[group.index()]
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn toggle(&self, group: Group, step: Step, lane: Lane) -> bool {
        self.write(group).toggle(step, lane)
    }

    pub fn set(&self, group: Group, step: Step, lane: Lane, value: bool) {
        self.write(group).set(step, lane, value);
    }

    pub fn step_lanes(&self, group: Group, step: Step) -> LaneSet {
        self.read(group).step_lanes(step)
    }

    pub fn lane_is_active(&self, group: Group, step: Step, lane: Lane) -> bool {
        self.read(group).lane_is_active(step, lane)
    }

    pub fn lane_counts(&self, group: Group) -> LaneCounts {
        self.read(group).lane_counts()
    }

    pub fn snapshot(&self, group: Group) -> StepGrid {
        self.read(group).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(i: usize) -> Step {
        Step::new(i).unwrap()
    }

    fn lane(i: usize) -> Lane {
        Lane::new(Group::Drum, i).unwrap()
    }

    #[test]
    fn test_index_bounds() {
        assert!(Step::new(15).is_some());
        assert!(Step::new(16).is_none());
        assert!(Lane::new(Group::Piano, 4).is_some());
        assert!(Lane::new(Group::Piano, 5).is_none());
        assert_eq!(Step::all().count(), STEPS);
    }

    #[test]
    fn test_grid_starts_empty() {
        let grid = StepGrid::new();
        assert!(Step::all().all(|s| grid.step_lanes(s).is_empty()));
    }

    #[test]
    fn test_grid_toggle() {
        let mut grid = StepGrid::new();
        assert!(grid.toggle(step(3), lane(2)));
        assert!(grid.lane_is_active(step(3), lane(2)));
        assert!(!grid.toggle(step(3), lane(2)));
        assert!(!grid.lane_is_active(step(3), lane(2)));
    }

    #[test]
    fn test_toggle_twice_restores_lanes() {
        let grid = SharedGrid::new();
        grid.set(Group::Drum, step(7), lane(0), true);
        grid.set(Group::Drum, step(7), lane(3), true);
        let before = grid.step_lanes(Group::Drum, step(7));

        for l in 0..5 {
            grid.toggle(Group::Drum, step(7), lane(l));
            grid.toggle(Group::Drum, step(7), lane(l));
            assert_eq!(grid.step_lanes(Group::Drum, step(7)), before);
        }
    }

    #[test]
    fn test_lane_at_most_once_per_step() {
        let mut grid = StepGrid::new();
        grid.set(step(0), lane(1), true);
        grid.set(step(0), lane(1), true);
        assert_eq!(grid.step_lanes(step(0)).len(), 1);
        assert_eq!(grid.lane_counts()[1], 1);
    }

    #[test]
    fn test_groups_are_independent() {
        let grid = SharedGrid::new();
        grid.toggle(Group::Drum, step(0), lane(0));
        assert!(grid.lane_is_active(Group::Drum, step(0), lane(0)));
        assert!(grid.step_lanes(Group::Piano, step(0)).is_empty());
        assert_eq!(grid.snapshot(Group::Piano), StepGrid::new());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let grid = SharedGrid::new();
        grid.toggle(Group::Piano, step(2), lane(1));
        let before = grid.snapshot(Group::Piano);
        grid.toggle(Group::Piano, step(3), lane(1));
        assert_eq!(before.lane_counts(), [0, 1, 0, 0, 0]);
        assert_eq!(grid.lane_counts(Group::Piano), [0, 2, 0, 0, 0]);
    }

    #[test]
    fn test_lane_counts() {
        let mut grid = StepGrid::new();
        for s in [1, 4, 9] {
            grid.set(step(s), lane(0), true);
        }
        grid.set(step(4), lane(2), true);
        assert_eq!(grid.lane_counts(), [3, 0, 1, 0, 0]);
    }

    #[test]
    fn test_lane_set_iter_is_ordered() {
        let set: LaneSet = [lane(4), lane(0), lane(2)].into_iter().collect();
        let lanes: Vec<usize> = set.iter().map(Lane::index).collect();
        assert_eq!(lanes, vec![0, 2, 4]);
    }

    #[test]
    fn test_concurrent_toggle_and_read() {
        let grid = SharedGrid::new();
        let writer = {
            let grid = grid.clone();
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    grid.toggle(Group::Drum, step(5), lane(1));
                }
            })
        };
        for _ in 0..1000 {
            let lanes = grid.step_lanes(Group::Drum, step(5));
            assert!(lanes.len() <= 1);
        }
        writer.join().unwrap();
        // even number of toggles
        assert!(!grid.lane_is_active(Group::Drum, step(5), lane(1)));
    }
}
