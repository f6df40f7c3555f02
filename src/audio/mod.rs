//! Audio output using cpal
//!
//! Triggers are queued to the audio callback, which mixes one procedural
//! one-shot voice per trigger. Voices of the same lane may overlap.
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::mpsc::{channel, Receiver, Sender};
use tracing::{error, info};

use crate::error::Error;
use crate::sequencer::trigger::Trigger;
use crate::sequencer::Group;

const MAX_VOICES: usize = 32;
const MASTER_GAIN: f32 = 0.3;

pub struct AudioOutput {
    _stream: cpal::Stream,
    sender: Sender<Trigger>,
}

impl AudioOutput {
    pub fn new() -> Result<Self, Error> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(Error::NoOutputDevice)?;
        let config = device.default_output_config()?;
        info!(
            device = %device.name().unwrap_or_else(|_| "unknown".into()),
            ?config,
            "audio output"
        );

        let sample_rate = config.sample_rate().0;
        let channels = config.channels() as usize;
        let (sender, receiver) = channel();
        let mixer = Mixer::new(receiver, sample_rate as f32);

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &config.into(), mixer, channels)
            }
            cpal::SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &config.into(), mixer, channels)
            }
            cpal::SampleFormat::U16 => {
                Self::build_stream::<u16>(&device, &config.into(), mixer, channels)
            }
            other => return Err(Error::UnsupportedSampleFormat(format!("{other:?}"))),
        }?;
        stream.play()?;
        info!(sample_rate, "audio stream started");

        Ok(Self {
            _stream: stream,
            sender,
        })
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        mut mixer: Mixer,
        channels: usize,
    ) -> Result<cpal::Stream, Error>
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        let stream = device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| mixer.render(data, channels),
            |err| error!("audio stream error: {}", err),
            None,
        )?;
        Ok(stream)
    }

    /// Sink to hand to the clock. Sending never blocks.
    pub fn sink(&self) -> Sender<Trigger> {
        self.sender.clone()
    }
}

struct Mixer {
    triggers: Receiver<Trigger>,
    voices: Vec<Voice>,
    sample_rate: f32,
    noise: StdRng,
}

impl Mixer {
    fn new(triggers: Receiver<Trigger>, sample_rate: f32) -> Self {
        Self {
            triggers,
            voices: Vec::with_capacity(MAX_VOICES),
            sample_rate,
            noise: StdRng::from_entropy(),
        }
    }

    fn render<T>(&mut self, output: &mut [T], channels: usize)
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        while let Ok(trigger) = self.triggers.try_recv() {
            if self.voices.len() == MAX_VOICES {
                // steal the oldest
                self.voices.remove(0);
            }
            self.voices.push(Voice::new(trigger, self.sample_rate));
        }

        for frame in output.chunks_mut(channels) {
            let mut sample = 0.0;
            for voice in &mut self.voices {
                sample += voice.next_sample(self.sample_rate, &mut self.noise);
            }
            let value = T::from_sample((sample * MASTER_GAIN).clamp(-1.0, 1.0));
            for out in frame {
                *out = value;
            }
        }
        self.voices.retain(|v| !v.finished());
    }
}

/// A decaying one-shot: a swept sine mixed with noise
#[derive(Debug, Clone, Copy, PartialEq)]
struct Voice {
    start_hz: f32,
    end_hz: f32,
    noise: f32,
    length: u32,
    position: u32,
    phase: f32,
}

impl Voice {
    fn new(trigger: Trigger, sample_rate: f32) -> Self {
        let (start_hz, end_hz, noise, seconds) = match trigger.group {
            Group::Drum => match trigger.lane.index() {
                0 => (150.0, 45.0, 0.0, 0.25),   // kick
                1 => (190.0, 160.0, 0.7, 0.18),  // snare
                2 => (1800.0, 1600.0, 0.2, 0.03), // stick
                3 => (0.0, 0.0, 1.0, 0.05),      // hihat
                _ => (0.0, 0.0, 1.0, 0.3),       // open hat
            },
            Group::Piano => {
                let hz = midi_note_to_frequency(piano_note(trigger.lane.index()));
                (hz, hz, 0.0, 0.6)
            }
        };
        Self {
            start_hz,
            end_hz,
            noise,
            length: (seconds * sample_rate) as u32,
            position: 0,
            phase: 0.0,
        }
    }

    fn finished(&self) -> bool {
        self.position >= self.length
    }

    fn next_sample(&mut self, sample_rate: f32, rng: &mut StdRng) -> f32 {
        if self.finished() {
            return 0.0;
        }
        let t = self.position as f32 / self.length as f32;
        let envelope = (1.0 - t) * (1.0 - t);
        let frequency = self.start_hz + (self.end_hz - self.start_hz) * t;

        let tone = (self.phase * 2.0 * std::f32::consts::PI).sin();
        self.phase += frequency / sample_rate;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        let noise: f32 = if self.noise > 0.0 {
            rng.gen_range(-1.0..1.0)
        } else {
            0.0
        };

        self.position += 1;
        (tone * (1.0 - self.noise) + noise * self.noise) * envelope
    }
}

/// MIDI note played by a piano lane: f, d, b, g, e
pub fn piano_note(lane: usize) -> u8 {
    const NOTES: [u8; 5] = [65, 62, 59, 67, 64];
    NOTES[lane % NOTES.len()]
}

fn midi_note_to_frequency(note: u8) -> f32 {
    440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0)
}
