//! Engine configuration - tempo bounds, clock resolution and rule generation
use std::ops::RangeInclusive;
use std::time::Duration;

use crate::error::Error;
use crate::sequencer::clock::seconds_per_sixteenth;

/// Minimum number of polls the clock must get per sixteenth at `max_bpm`
pub const POLLS_PER_STEP: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub initial_bpm: f32,
    pub min_bpm: f32,
    /// Highest tempo `poll_interval` is sized for. Not a ceiling on `set_tempo`.
    pub max_bpm: f32,
    pub tempo_step: f32,
    pub poll_interval: Duration,
    pub rule_counts: RangeInclusive<u32>,
    /// `None` seeds rule generation from the wall clock
    pub rule_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_bpm: 120.0,
            min_bpm: 50.0,
            max_bpm: 300.0,
            tempo_step: 10.0,
            poll_interval: Duration::from_millis(1),
            rule_counts: 1..=6,
            rule_seed: None,
        }
    }
}

impl EngineConfig {
    pub fn with_bpm(mut self, bpm: f32) -> Self {
        self.initial_bpm = bpm;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rule_seed = Some(seed);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_rule_counts(mut self, counts: RangeInclusive<u32>) -> Self {
        self.rule_counts = counts;
        self
    }

    /// Longest poll interval that still guarantees no skipped boundary at `bpm`
    pub fn max_safe_poll_interval(bpm: f32) -> Duration {
        Duration::from_secs_f64(seconds_per_sixteenth(bpm) / POLLS_PER_STEP)
    }

    pub fn validate(&self) -> Result<(), Error> {
        for (name, bpm) in [
            ("initial_bpm", self.initial_bpm),
            ("min_bpm", self.min_bpm),
            ("max_bpm", self.max_bpm),
            ("tempo_step", self.tempo_step),
        ] {
            if !bpm.is_finite() {
                return Err(Error::InvalidConfig(format!("{name} must be finite, got {bpm}")));
            }
        }
        if !(self.min_bpm > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "min_bpm must be positive, got {}",
                self.min_bpm
            )));
        }
        if self.initial_bpm < self.min_bpm {
            return Err(Error::InvalidConfig(format!(
                "initial_bpm {} is below min_bpm {}",
                self.initial_bpm, self.min_bpm
            )));
        }
        if self.max_bpm < self.initial_bpm {
            return Err(Error::InvalidConfig(format!(
                "max_bpm {} is below initial_bpm {}",
                self.max_bpm, self.initial_bpm
            )));
        }
        if self.rule_counts.is_empty() || *self.rule_counts.start() == 0 {
            return Err(Error::InvalidConfig(format!(
                "rule_counts must be a non-empty range of positive counts, got {:?}",
                self.rule_counts
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::InvalidConfig("poll_interval must be non-zero".into()));
        }
        let limit = Self::max_safe_poll_interval(self.max_bpm);
        if self.poll_interval > limit {
            return Err(Error::InvalidConfig(format!(
                "poll_interval {:?} is coarser than {:?} needed at {} BPM",
                self.poll_interval, limit, self.max_bpm
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_default_poll_interval_fits_max_tempo() {
        let config = EngineConfig::default();
        // 300 BPM -> 50ms per sixteenth -> 5ms budget
        assert_eq!(
            EngineConfig::max_safe_poll_interval(config.max_bpm),
            Duration::from_millis(5)
        );
        assert!(config.poll_interval * 10 <= Duration::from_millis(50));
    }

    #[test]
    fn test_coarse_poll_interval_rejected() {
        let config = EngineConfig::default().with_poll_interval(Duration::from_millis(20));
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_tempo_bounds_rejected() {
        let below_floor = EngineConfig::default().with_bpm(40.0);
        assert!(below_floor.validate().is_err());

        let above_max = EngineConfig::default().with_bpm(400.0);
        assert!(above_max.validate().is_err());
    }

    #[test]
    fn test_non_finite_tempo_rejected() {
        for bpm in [f32::NAN, f32::INFINITY] {
            let config = EngineConfig::default().with_bpm(bpm);
            assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        }

        let mut config = EngineConfig::default();
        config.max_bpm = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_rule_count_rejected() {
        let config = EngineConfig::default().with_rule_counts(0..=3);
        assert!(config.validate().is_err());
    }
}
