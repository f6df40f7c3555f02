//! Playback engine - owns the clock thread and the transport controls
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::clock::BeatClock;
use super::trigger::TriggerSink;
use super::{SharedGrid, Step};
use crate::config::EngineConfig;
use crate::error::Error;

pub struct PlaybackEngine {
    clock: Arc<Mutex<BeatClock>>,
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    min_bpm: f32,
    max_bpm: f32,
}

impl PlaybackEngine {
    /// Spawn the clock thread. Playback starts stopped.
    pub fn spawn(
        config: &EngineConfig,
        grid: SharedGrid,
        sink: impl TriggerSink + 'static,
    ) -> Result<Self, Error> {
        config.validate()?;

        let clock = Arc::new(Mutex::new(BeatClock::new(config.initial_bpm)));
        let shutdown = Arc::new(AtomicBool::new(false));
        let poll_interval = config.poll_interval;

        let worker = {
            let clock = Arc::clone(&clock);
            let shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name("jamgrid-clock".into())
                .spawn(move || run_clock(clock, grid, sink, shutdown, poll_interval))?
        };
        debug!(?poll_interval, "clock thread started");

        Ok(Self {
            clock,
            shutdown,
            worker: Some(worker),
            min_bpm: config.min_bpm,
            max_bpm: config.max_bpm,
        })
    }

    fn clock(&self) -> MutexGuard<'_, BeatClock> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn start(&self) {
        if self.clock().start(Instant::now()) {
            info!("playback started");
        }
    }

    /// Observed by the clock thread before its next dispatch
    pub fn stop(&self) {
        if self.clock().stop() {
            info!("playback stopped");
        }
    }

    pub fn toggle_play(&self) {
        if self.is_running() {
            self.stop();
        } else {
            self.start();
        }
    }

    pub fn is_running(&self) -> bool {
        self.clock().is_running()
    }

    pub fn current_beat(&self) -> Option<Step> {
        self.clock().current_beat()
    }

    pub fn bpm(&self) -> f32 {
        self.clock().bpm()
    }

    /// Add `delta` BPM, never going below the configured floor
    pub fn set_tempo(&self, delta: f32) -> f32 {
        let mut clock = self.clock();
        let bpm = (clock.bpm() + delta).max(self.min_bpm);
        clock.set_bpm(bpm);
        drop(clock);

        if bpm > self.max_bpm {
            warn!(bpm, max_bpm = self.max_bpm, "tempo above poll resolution, beats may be skipped");
        } else {
            debug!(bpm, "tempo changed");
        }
        bpm
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("clock thread panicked");
            }
        }
    }
}

fn run_clock(
    clock: Arc<Mutex<BeatClock>>,
    grid: SharedGrid,
    sink: impl TriggerSink,
    shutdown: Arc<AtomicBool>,
    poll_interval: Duration,
) {
    while !shutdown.load(Ordering::Acquire) {
        {
            let mut clock = clock.lock().unwrap_or_else(PoisonError::into_inner);
            clock.poll(Instant::now(), &grid, &sink);
        }
        thread::sleep(poll_interval);
    }
    debug!("clock thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::trigger::Trigger;
    use crate::sequencer::{Group, Lane, STEPS};
    use std::sync::mpsc::channel;

    fn engine() -> PlaybackEngine {
        let (tx, _rx) = channel::<Trigger>();
        PlaybackEngine::spawn(&EngineConfig::default(), SharedGrid::new(), tx).unwrap()
    }

    #[test]
    fn test_starts_stopped() {
        let engine = engine();
        assert!(!engine.is_running());
        assert_eq!(engine.current_beat(), None);
        assert_eq!(engine.bpm(), 120.0);
    }

    #[test]
    fn test_toggle_play() {
        let engine = engine();
        engine.toggle_play();
        assert!(engine.is_running());
        engine.toggle_play();
        assert!(!engine.is_running());
    }

    #[test]
    fn test_tempo_clamped_at_floor() {
        let engine = engine();
        for _ in 0..20 {
            let bpm = engine.set_tempo(-10.0);
            assert!(bpm >= 50.0);
        }
        assert_eq!(engine.bpm(), 50.0);
    }

    #[test]
    fn test_tempo_has_no_ceiling() {
        let engine = engine();
        for _ in 0..30 {
            engine.set_tempo(10.0);
        }
        assert_eq!(engine.bpm(), 420.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (tx, _rx) = channel::<Trigger>();
        let config = EngineConfig::default().with_poll_interval(Duration::from_millis(50));
        assert!(PlaybackEngine::spawn(&config, SharedGrid::new(), tx).is_err());
    }

    #[test]
    fn test_clock_thread_dispatches_and_stops() {
        let grid = SharedGrid::new();
        let kick = Lane::new(Group::Drum, 0).unwrap();
        for s in Step::all() {
            grid.set(Group::Drum, s, kick, true);
        }

        let (tx, rx) = channel();
        let config = EngineConfig::default().with_bpm(240.0);
        let engine = PlaybackEngine::spawn(&config, grid, tx).unwrap();

        engine.start();
        thread::sleep(Duration::from_millis(200));
        engine.stop();

        let fired: Vec<Trigger> = rx.try_iter().collect();
        assert!(!fired.is_empty());
        assert!(fired.len() <= STEPS);
        assert!(fired.iter().all(|t| *t == Trigger::new(Group::Drum, kick)));

        thread::sleep(Duration::from_millis(150));
        assert_eq!(rx.try_iter().count(), 0);
        assert!(engine.current_beat().is_some());
    }
}
