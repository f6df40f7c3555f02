//! Beat clock - turns elapsed wall-clock time into a sixteenth-note step index
//!
//! The clock is polled rather than scheduled. Every poll recomputes the step
//! from the start instant and the current tempo; a change of step is a beat
//! boundary and dispatches the lanes lit at the new step. Polling needs to be
//! at least ten times finer than a sixteenth at the fastest tempo in use
//! (see `EngineConfig::validate`).
use std::time::Instant;

use tracing::{debug, warn};

use super::trigger::{Trigger, TriggerSink};
use super::{Group, SharedGrid, Step, STEPS};

/// Length of one step at `bpm`
pub fn seconds_per_sixteenth(bpm: f32) -> f64 {
    60.0 / bpm as f64 / 4.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Stopped,
    Running { started_at: Instant },
}

#[derive(Debug, Clone)]
pub struct BeatClock {
    state: ClockState,
    /// `None` until the first boundary after a start
    beat: Option<Step>,
    bpm: f32,
    tempo_changed: bool,
}

impl BeatClock {
    pub fn new(bpm: f32) -> Self {
        Self {
            state: ClockState::Stopped,
            beat: None,
            bpm,
            tempo_changed: false,
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, ClockState::Running { .. })
    }

    /// Start from step 0. Does nothing (and keeps the phase) if already running.
    pub fn start(&mut self, now: Instant) -> bool {
        if self.is_running() {
            return false;
        }
        self.state = ClockState::Running { started_at: now };
        self.beat = None;
        true
    }

    /// Freeze the clock. The current beat is kept for display.
    pub fn stop(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.state = ClockState::Stopped;
        true
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    /// Takes effect on the next poll. The phase is not preserved.
    pub fn set_bpm(&mut self, bpm: f32) {
        if bpm != self.bpm {
            self.bpm = bpm;
            self.tempo_changed = true;
        }
    }

    pub fn current_beat(&self) -> Option<Step> {
        self.beat
    }

    /// Step the clock would be on at `now`, or `None` when stopped
    pub fn beat_at(&self, now: Instant) -> Option<Step> {
        let ClockState::Running { started_at } = self.state else {
            return None;
        };
        let elapsed = now.saturating_duration_since(started_at).as_secs_f64();
        let sixteenths = (elapsed / seconds_per_sixteenth(self.bpm)).floor() as u64;
        Some(Step((sixteenths % STEPS as u64) as u8))
    }

    /// Advance to `now`. On a beat boundary every lane lit at the new step is
    /// sent to `sink` once, and the new step is returned.
    pub fn poll(&mut self, now: Instant, grid: &SharedGrid, sink: &dyn TriggerSink) -> Option<Step> {
        let beat = self.beat_at(now)?;
        if self.beat == Some(beat) {
            return None;
        }

        if let Some(previous) = self.beat {
            let advanced = (beat.index() + STEPS - previous.index()) % STEPS;
            if advanced > 1 && !self.tempo_changed {
                warn!(
                    from = %previous,
                    to = %beat,
                    skipped = advanced - 1,
                    "clock skipped beat boundaries"
                );
            }
        }
        self.tempo_changed = false;

        let mut dispatched = 0;
        for group in Group::ALL {
            for lane in grid.step_lanes(group, beat).iter() {
                match sink.play(Trigger::new(group, lane)) {
                    Ok(()) => dispatched += 1,
                    Err(e) => warn!(%group, %lane, "dropped trigger: {}", e),
                }
            }
        }
        debug!(step = %beat, dispatched, "beat");

        self.beat = Some(beat);
        Some(beat)
    }
}
