/// Typed errors for the engine, composition loading and MIDI output
use std::io;

/// Rejected composition data. A failed `reconfigure` leaves the engine's
/// previous configuration in place.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("step count must be positive")]
    InvalidStepCount,
    #[error("pulse count {pulses} is outside 0..={steps}")]
    PulsesOutOfRange { pulses: usize, steps: usize },
    #[error("malformed note reference: {0:?}")]
    MalformedNote(String),
    #[error("malformed chord tone: {0:?}")]
    MalformedChordTone(String),
    #[error("tempo must be a positive number of beats per minute, got {0}")]
    InvalidTempo(f64),
}

#[derive(Debug, thiserror::Error)]
pub enum CompositionError {
    #[error("failed to read composition: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse composition: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid composition: {0}")]
    Validation(#[from] ValidationError),
}

#[derive(Debug, thiserror::Error)]
pub enum MidiError {
    #[error("failed to create MIDI output: {0}")]
    Init(#[from] midir::InitError),
    #[error("invalid MIDI port index {0}")]
    InvalidPort(usize),
    #[error("failed to connect: {0}")]
    Connect(String),
    #[error("failed to send MIDI message: {0}")]
    Send(#[from] midir::SendError),
}
