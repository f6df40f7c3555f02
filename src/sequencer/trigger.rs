//! Trigger sinks - where the clock sends "play sample N of group G now"
use std::sync::mpsc::Sender;

use super::{Group, Lane};
use crate::error::SinkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Trigger {
    pub group: Group,
    pub lane: Lane,
}

impl Trigger {
    pub fn new(group: Group, lane: Lane) -> Self {
        Self { group, lane }
    }
}

/// Fire-and-forget playback of one-shots.
///
/// `play` is called from the clock thread and must return without waiting on
/// the audio device. Overlapping instances of the same lane are allowed.
pub trait TriggerSink: Send {
    fn play(&self, trigger: Trigger) -> Result<(), SinkError>;
}

impl TriggerSink for Sender<Trigger> {
    fn play(&self, trigger: Trigger) -> Result<(), SinkError> {
        self.send(trigger).map_err(|_| SinkError::Disconnected)
    }
}

impl<S: TriggerSink + ?Sized> TriggerSink for Box<S> {
    fn play(&self, trigger: Trigger) -> Result<(), SinkError> {
        (**self).play(trigger)
    }
}

/// Sends every trigger to each inner sink
#[derive(Default)]
pub struct FanOut {
    sinks: Vec<Box<dyn TriggerSink>>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl TriggerSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn push(&mut self, sink: impl TriggerSink + 'static) {
        self.sinks.push(Box::new(sink));
    }
}

impl TriggerSink for FanOut {
    /// Every sink is tried; the first failure is reported
    fn play(&self, trigger: Trigger) -> Result<(), SinkError> {
        let mut result = Ok(());
        for sink in &self.sinks {
            if let Err(e) = sink.play(trigger) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    struct Rejecting;

    impl TriggerSink for Rejecting {
        fn play(&self, _: Trigger) -> Result<(), SinkError> {
            Err(SinkError::Rejected("busy".into()))
        }
    }

    fn kick() -> Trigger {
        Trigger::new(Group::Drum, Lane::new(Group::Drum, 0).unwrap())
    }

    #[test]
    fn test_channel_sink() {
        let (tx, rx) = channel();
        tx.play(kick()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), kick());

        drop(rx);
        assert_eq!(tx.play(kick()), Err(SinkError::Disconnected));
    }

    #[test]
    fn test_fan_out_tries_every_sink() {
        let (tx_a, rx_a) = channel();
        let (tx_b, rx_b) = channel();
        let sinks = FanOut::new().with(tx_a).with(Rejecting).with(tx_b);

        assert_eq!(sinks.play(kick()), Err(SinkError::Rejected("busy".into())));
        assert_eq!(rx_a.try_recv().unwrap(), kick());
        assert_eq!(rx_b.try_recv().unwrap(), kick());
    }
}
