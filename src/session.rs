//! Session - one play session wiring the grid, clock, editor and challenge
//!
//! The presentation layer calls `tick` once per frame with that frame's input
//! and reads everything it draws through the accessors. Trigger dispatch runs
//! on the playback engine's own thread and never waits on a frame.
use tracing::info;

use crate::config::EngineConfig;
use crate::error::Error;
use crate::sequencer::challenge::{ChallengeEvaluator, Evaluation};
use crate::sequencer::editor::{Cell, Edit, GridEditor, GridLayout, InputFrame};
use crate::sequencer::playback::PlaybackEngine;
use crate::sequencer::rules::{RuleSet, Rules};
use crate::sequencer::trigger::TriggerSink;
use crate::sequencer::{Group, Lane, LaneSet, SharedGrid, Step};

/// What happened during one `tick`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickReport {
    pub edit: Option<Edit>,
    pub evaluation: Evaluation,
    pub tempo: Option<f32>,
}

pub struct Session {
    config: EngineConfig,
    grid: SharedGrid,
    playback: PlaybackEngine,
    editor: GridEditor,
    challenge: ChallengeEvaluator,
    won: bool,
}

impl Session {
    pub fn new(config: EngineConfig, sink: impl TriggerSink + 'static) -> Result<Self, Error> {
        let rules = Rules::from_seed(config.rule_seed, config.rule_counts.clone());
        Self::with_rules(config, rules, sink)
    }

    pub fn with_rules(
        config: EngineConfig,
        rules: Rules,
        sink: impl TriggerSink + 'static,
    ) -> Result<Self, Error> {
        let grid = SharedGrid::new();
        let playback = PlaybackEngine::spawn(&config, grid.clone(), sink)?;
        info!(bpm = config.initial_bpm, "session ready");

        Ok(Self {
            config,
            grid,
            playback,
            editor: GridEditor::new(GridLayout::default()),
            challenge: ChallengeEvaluator::new(rules),
            won: false,
        })
    }

    /// Process one frame of input and re-evaluate the challenge
    pub fn tick(&mut self, input: &InputFrame) -> TickReport {
        if input.toggle_play_pressed && self.editor.selected().is_some() {
            self.playback.toggle_play();
        }
        let tempo = (input.tempo_delta != 0.0).then(|| self.playback.set_tempo(input.tempo_delta));
        let edit = self.editor.update(input, &self.grid);
        let evaluation = self.challenge.evaluate(&self.grid);

        TickReport {
            edit,
            evaluation,
            tempo,
        }
    }

    /// Returns `true` the first time the group is selected this session
    pub fn select_group(&mut self, group: Group) -> bool {
        self.editor.select_group(group)
    }

    pub fn selected_group(&self) -> Option<Group> {
        self.editor.selected()
    }

    /// Accept the arrangement. Only possible while the challenge is met;
    /// starts playback if it is not already running.
    pub fn record(&mut self) -> bool {
        if !self.challenge.verdict() {
            return false;
        }
        self.playback.start();
        if !self.won {
            info!("arrangement recorded");
        }
        self.won = true;
        true
    }

    pub fn is_won(&self) -> bool {
        self.won
    }

    pub fn record_available(&self) -> bool {
        self.challenge.verdict()
    }

    pub fn toggle_play(&self) {
        self.playback.toggle_play();
    }

    pub fn tempo_step(&self) -> f32 {
        self.config.tempo_step
    }

    pub fn bpm(&self) -> f32 {
        self.playback.bpm()
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_running()
    }

    pub fn current_beat(&self) -> Option<Step> {
        self.playback.current_beat()
    }

    pub fn step_lanes(&self, group: Group, step: Step) -> LaneSet {
        self.grid.step_lanes(group, step)
    }

    pub fn cursor(&self) -> Option<Cell> {
        self.editor.cursor()
    }

    pub fn layout(&self) -> &GridLayout {
        self.editor.layout()
    }

    pub fn challenge_verdict(&self) -> bool {
        self.challenge.verdict()
    }

    pub fn rules(&self, group: Group) -> &RuleSet {
        self.challenge.rules().for_group(group)
    }

    pub fn requirement_for(&self, group: Group, lane: Lane) -> Option<u32> {
        self.challenge.rules().requirement_for(group, lane)
    }

    /// A running clock is on a step with lanes lit for `group`
    pub fn group_sounding(&self, group: Group) -> bool {
        self.is_playing()
            && self
                .current_beat()
                .is_some_and(|step| !self.step_lanes(group, step).is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::trigger::Trigger;
    use crate::sequencer::STEPS;
    use std::sync::mpsc::{channel, Receiver};
    use std::time::Duration;

    fn kick() -> Lane {
        Lane::new(Group::Drum, 0).unwrap()
    }

    fn session() -> (Session, Receiver<Trigger>) {
        let (tx, rx) = channel();
        let rules = Rules::from_sets([
            RuleSet::empty(Group::Drum).with_requirement(kick(), 2),
            RuleSet::empty(Group::Piano),
        ]);
        let session = Session::with_rules(EngineConfig::default(), rules, tx).unwrap();
        (session, rx)
    }

    fn click(session: &Session, step: usize, lane: Lane) -> InputFrame {
        let cell = Cell {
            step: Step::new(step).unwrap(),
            lane,
        };
        InputFrame {
            pointer: Some(session.layout().cell_rect(cell).center()),
            primary_pressed: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_play_key_needs_selected_group() {
        let (mut session, _rx) = session();
        let play = InputFrame {
            toggle_play_pressed: true,
            ..Default::default()
        };

        session.tick(&play);
        assert!(!session.is_playing());

        session.select_group(Group::Drum);
        session.tick(&play);
        assert!(session.is_playing());
        session.tick(&play);
        assert!(!session.is_playing());
    }

    #[test]
    fn test_nan_tempo_refused() {
        let (tx, _rx) = channel();
        let config = EngineConfig::default().with_bpm(f32::NAN).with_seed(7);
        assert!(Session::new(config, tx).is_err());
    }

    #[test]
    fn test_tempo_keys() {
        let (mut session, _rx) = session();
        let slower = InputFrame {
            tempo_delta: -session.tempo_step(),
            ..Default::default()
        };
        for _ in 0..10 {
            session.tick(&slower);
        }
        assert_eq!(session.bpm(), 50.0);
    }

    #[test]
    fn test_group_sounding_follows_lit_steps() {
        let (mut session, _rx) = session();
        session.select_group(Group::Drum);
        for step in 0..STEPS {
            session.tick(&click(&session, step, kick()));
        }
        assert!(!session.group_sounding(Group::Drum));

        session.toggle_play();
        std::thread::sleep(Duration::from_millis(50));
        assert!(session.current_beat().is_some());
        assert!(session.group_sounding(Group::Drum));
        // nothing lit for piano on any step
        assert!(!session.group_sounding(Group::Piano));

        session.toggle_play();
        assert!(!session.group_sounding(Group::Drum));
    }

    #[test]
    fn test_edit_then_record() {
        let (mut session, _rx) = session();
        session.select_group(Group::Drum);
        assert!(!session.record());

        let report = session.tick(&click(&session, 0, kick()));
        assert!(report.edit.is_some());
        assert!(!report.evaluation.satisfied);

        let report = session.tick(&click(&session, 8, kick()));
        assert!(report.evaluation.satisfied);
        assert!(report.evaluation.just_met);
        assert!(session.record_available());
        assert_eq!(session.requirement_for(Group::Drum, kick()), Some(2));

        assert!(session.record());
        assert!(session.is_won());
        assert!(session.is_playing());
    }

    #[test]
    fn test_record_rearms_after_unmet() {
        let (mut session, _rx) = session();
        session.select_group(Group::Drum);
        session.tick(&click(&session, 0, kick()));
        session.tick(&click(&session, 1, kick()));
        assert!(session.record_available());

        let report = session.tick(&click(&session, 1, kick()));
        assert!(!report.evaluation.satisfied);
        assert!(!session.record_available());
        assert!(!session.record());

        let report = session.tick(&click(&session, 1, kick()));
        assert!(report.evaluation.satisfied);
        assert!(!report.evaluation.just_met);
        assert!(session.record_available());
    }
}
