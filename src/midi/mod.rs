//! MIDI output using midir
//!
//! The connection lives on a writer thread. Triggers become a note-on followed
//! by a note-off `NOTE_LENGTH` later; the clock only ever pushes to a channel.
use midir::{MidiOutput, MidiOutputConnection};
use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::audio::piano_note;
use crate::error::{Error, SinkError};
use crate::sequencer::trigger::{Trigger, TriggerSink};
use crate::sequencer::Group;

const CLIENT_NAME: &str = "JamGrid MIDI Output";
const NOTE_LENGTH: Duration = Duration::from_millis(100);
const VELOCITY: u8 = 100;

/// General MIDI percussion channel (10), zero based
const DRUM_CHANNEL: u8 = 9;
const PIANO_CHANNEL: u8 = 0;

enum Command {
    Play(Trigger),
    Connect(usize, Sender<Result<String, Error>>),
    Shutdown,
}

pub struct MidiOutputDevice {
    commands: Sender<Command>,
    worker: Option<JoinHandle<()>>,
    port_name: Option<String>,
}

impl MidiOutputDevice {
    pub fn new() -> Result<Self, Error> {
        let (commands, rx) = channel();
        let worker = thread::Builder::new()
            .name("jamgrid-midi".into())
            .spawn(move || Writer::default().run(rx))?;
        Ok(Self {
            commands,
            worker: Some(worker),
            port_name: None,
        })
    }

    pub fn available_ports() -> Vec<String> {
        if let Ok(midi_out) = MidiOutput::new(CLIENT_NAME) {
            midi_out
                .ports()
                .iter()
                .filter_map(|p| midi_out.port_name(p).ok())
                .collect()
        } else {
            vec![]
        }
    }

    pub fn connect(&mut self, port_index: usize) -> Result<(), Error> {
        let (reply, result) = channel();
        self.commands
            .send(Command::Connect(port_index, reply))
            .map_err(|_| Error::Midi("MIDI writer has stopped".into()))?;
        let name = result
            .recv()
            .map_err(|_| Error::Midi("MIDI writer has stopped".into()))??;
        info!(port = %name, "MIDI output connected");
        self.port_name = Some(name);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.port_name.is_some()
    }

    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    /// Sink to hand to the clock. Triggers are dropped while disconnected.
    pub fn sink(&self) -> MidiSink {
        MidiSink {
            commands: self.commands.clone(),
        }
    }
}

impl Drop for MidiOutputDevice {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

pub struct MidiSink {
    commands: Sender<Command>,
}

impl TriggerSink for MidiSink {
    fn play(&self, trigger: Trigger) -> Result<(), SinkError> {
        self.commands
            .send(Command::Play(trigger))
            .map_err(|_| SinkError::Disconnected)
    }
}

/// Channel and note a trigger is sent as
pub fn trigger_message(trigger: Trigger) -> (u8, u8) {
    match trigger.group {
        Group::Drum => {
            // kick, side stick... general MIDI numbers for each drum lane
            const NOTES: [u8; 5] = [36, 38, 37, 42, 46];
            (DRUM_CHANNEL, NOTES[trigger.lane.index()])
        }
        Group::Piano => (PIANO_CHANNEL, piano_note(trigger.lane.index())),
    }
}

#[derive(Default)]
struct Writer {
    connection: Option<MidiOutputConnection>,
    /// (due, channel, note)
    pending_offs: Vec<(Instant, u8, u8)>,
}

impl Writer {
    fn run(mut self, commands: std::sync::mpsc::Receiver<Command>) {
        loop {
            let command = match self.next_due() {
                Some(due) => {
                    let timeout = due.saturating_duration_since(Instant::now());
                    commands.recv_timeout(timeout)
                }
                None => commands.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match command {
                Ok(Command::Play(trigger)) => self.note_on(trigger),
                Ok(Command::Connect(port_index, reply)) => {
                    let _ = reply.send(self.connect(port_index));
                }
                Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }
            self.flush_offs(Instant::now());
        }
        self.close();
        debug!("MIDI writer exiting");
    }

    fn next_due(&self) -> Option<Instant> {
        self.pending_offs.iter().map(|(due, _, _)| *due).min()
    }

    fn connect(&mut self, port_index: usize) -> Result<String, Error> {
        let midi_out = MidiOutput::new(CLIENT_NAME)
            .map_err(|e| Error::Midi(format!("failed to create MIDI output: {}", e)))?;

        let ports = midi_out.ports();
        let port = ports
            .get(port_index)
            .ok_or_else(|| Error::Midi(format!("invalid port index {}", port_index)))?;
        let name = midi_out
            .port_name(port)
            .unwrap_or_else(|_| format!("port {}", port_index));

        self.close();
        let connection = midi_out
            .connect(port, "jamgrid")
            .map_err(|e| Error::Midi(format!("failed to connect: {}", e)))?;
        self.connection = Some(connection);
        Ok(name)
    }

    fn close(&mut self) {
        self.flush_offs(Instant::now() + NOTE_LENGTH);
        self.pending_offs.clear();
        self.connection = None;
    }

    fn note_on(&mut self, trigger: Trigger) {
        let Some(conn) = self.connection.as_mut() else {
            return;
        };
        let (channel, note) = trigger_message(trigger);
        if let Err(e) = conn.send(&[0x90 | channel, note, VELOCITY]) {
            warn!("failed to send note on: {}", e);
            return;
        }
        self.pending_offs
            .push((Instant::now() + NOTE_LENGTH, channel, note));
    }

    fn flush_offs(&mut self, now: Instant) {
        let Some(conn) = self.connection.as_mut() else {
            self.pending_offs.clear();
            return;
        };
        self.pending_offs.retain(|&(due, channel, note)| {
            if due > now {
                return true;
            }
            if let Err(e) = conn.send(&[0x80 | channel, note, 0]) {
                warn!("failed to send note off: {}", e);
            }
            false
        });
    }
}

pub fn midi_note_name(note: u8) -> String {
    let note_names = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
    let octave = (note / 12) as i32 - 1;
    let note_index = (note % 12) as usize;
    format!("{}{}", note_names[note_index], octave)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::Lane;

    #[test]
    fn test_trigger_message() {
        let kick = Trigger::new(Group::Drum, Lane::new(Group::Drum, 0).unwrap());
        assert_eq!(trigger_message(kick), (9, 36));

        let f = Trigger::new(Group::Piano, Lane::new(Group::Piano, 0).unwrap());
        let (channel, note) = trigger_message(f);
        assert_eq!(channel, 0);
        assert_eq!(midi_note_name(note), "F4");
    }

    #[test]
    fn test_piano_lanes_match_labels() {
        for lane in Group::Piano.lanes() {
            let (_, note) = trigger_message(Trigger::new(Group::Piano, lane));
            let name = midi_note_name(note).to_lowercase();
            assert!(name.starts_with(Group::Piano.lane_label(lane)));
        }
    }

    #[test]
    fn test_sink_accepts_while_disconnected() {
        let device = MidiOutputDevice::new().unwrap();
        assert!(!device.is_connected());
        let sink = device.sink();
        let hat = Trigger::new(Group::Drum, Lane::new(Group::Drum, 3).unwrap());
        assert_eq!(sink.play(hat), Ok(()));

        drop(device);
        assert_eq!(sink.play(hat), Err(SinkError::Disconnected));
    }
}
