//! Error types shared by the engine and its device sinks

/// Errors raised while setting up a session or one of its devices
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid engine config: {0}")]
    InvalidConfig(String),

    #[error("no audio output device available")]
    NoOutputDevice,

    #[error("unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),

    #[error("failed to fetch default output config: {0}")]
    AudioConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build output stream: {0}")]
    AudioBuild(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    AudioPlay(#[from] cpal::PlayStreamError),

    #[error("MIDI error: {0}")]
    Midi(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A trigger sink could not accept a play request.
///
/// These are transient: the clock logs them and keeps going.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("sink disconnected")]
    Disconnected,

    #[error("sink rejected trigger: {0}")]
    Rejected(String),
}
