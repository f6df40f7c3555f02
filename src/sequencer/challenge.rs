//! Challenge evaluation - recounts every grid each tick and checks the rules
use tracing::info;

use super::rules::Rules;
use super::{Group, SharedGrid};

/// Result of one evaluation tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Evaluation {
    /// Every rule of every group is met
    pub satisfied: bool,
    /// First time this session the rules are met
    pub just_met: bool,
}

#[derive(Debug, Clone)]
pub struct ChallengeEvaluator {
    rules: Rules,
    verdict: bool,
    announced: bool,
}

impl ChallengeEvaluator {
    pub fn new(rules: Rules) -> Self {
        Self {
            rules,
            verdict: false,
            announced: false,
        }
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    pub fn evaluate(&mut self, grid: &SharedGrid) -> Evaluation {
        let satisfied = Group::ALL.iter().all(|&group| {
            let counts = grid.lane_counts(group);
            self.rules.for_group(group).is_met_by(&counts)
        });
        self.verdict = satisfied;

        let just_met = satisfied && !self.announced;
        if just_met {
            self.announced = true;
            info!("challenge met");
        }
        Evaluation {
            satisfied,
            just_met,
        }
    }

    /// Verdict of the last evaluation
    pub fn verdict(&self) -> bool {
        self.verdict
    }

    /// Whether the "challenge met" notice has been raised this session
    pub fn announced(&self) -> bool {
        self.announced
    }
}
