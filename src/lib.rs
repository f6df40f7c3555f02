//! JamGrid - real-time step sequencer engine
//!
//! This library provides the core of a 16-step, multi-lane sequencing toy:
//! - Per-group step grids shared safely between editing and playback
//! - A polled beat clock running on its own thread
//! - Hidden per-lane play-count challenges and their evaluation
//! - Audio and MIDI trigger sinks

pub mod audio;
pub mod config;
pub mod error;
pub mod midi;
pub mod sequencer;
pub mod session;

// Re-export commonly used types
pub use audio::AudioOutput;
pub use config::EngineConfig;
pub use error::{Error, SinkError};
pub use midi::{midi_note_name, MidiOutputDevice, MidiSink};
pub use sequencer::challenge::{ChallengeEvaluator, Evaluation};
pub use sequencer::clock::BeatClock;
pub use sequencer::editor::{Cell, GridEditor, GridLayout, InputFrame, Point, Rect};
pub use sequencer::playback::PlaybackEngine;
pub use sequencer::rules::{RuleSet, Rules};
pub use sequencer::trigger::{FanOut, Trigger, TriggerSink};
pub use sequencer::{Group, Lane, LaneSet, SharedGrid, Step, StepGrid, STEPS};
pub use session::{Session, TickReport};
