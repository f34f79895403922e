/// MIDI output using midir, plus pitch-name conversions
use midir::{MidiOutput, MidiOutputConnection};
use tracing::{debug, info};

use crate::error::MidiError;

const CLIENT_NAME: &str = "eucseq MIDI Output";

const NOTE_ON: u8 = 0x90;
const NOTE_OFF: u8 = 0x80;
// Channel 10, zero-based.
const DRUM_CHANNEL: u8 = 9;

pub struct MidiOutputDevice {
    connection: Option<MidiOutputConnection>,
}

impl MidiOutputDevice {
    pub fn new() -> Self {
        Self { connection: None }
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

    pub fn connect(&mut self, port_index: usize) -> Result<(), MidiError> {
        let midi_out = MidiOutput::new(CLIENT_NAME)?;

        let ports = midi_out.ports();
        let port = ports
            .get(port_index)
            .ok_or(MidiError::InvalidPort(port_index))?;
        let port_name = midi_out.port_name(port).unwrap_or_default();

        let connection = midi_out
            .connect(port, "eucseq")
            .map_err(|e| MidiError::Connect(e.to_string()))?;

        info!(port = %port_name, "Connected MIDI output");
        self.connection = Some(connection);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn send_note_on(&mut self, note: u8, velocity: u8) -> Result<(), MidiError> {
        self.send(&[NOTE_ON, note, velocity])
    }

    pub fn send_note_off(&mut self, note: u8) -> Result<(), MidiError> {
        self.send(&[NOTE_OFF, note, 0])
    }

    /// Percussion hit on the drum channel. Drum voices ignore note length, so
    /// the note off follows immediately.
    pub fn send_drum_hit(&mut self, note: u8, velocity: u8) -> Result<(), MidiError> {
        self.send(&[NOTE_ON | DRUM_CHANNEL, note, velocity])?;
        self.send(&[NOTE_OFF | DRUM_CHANNEL, note, 0])
    }

    pub fn disconnect(&mut self) {
        if self.connection.take().is_some() {
            debug!("Disconnected MIDI output");
        }
    }

    fn send(&mut self, message: &[u8]) -> Result<(), MidiError> {
        if let Some(ref mut conn) = self.connection {
            conn.send(message)?;
        }
        Ok(())
    }
}

impl Default for MidiOutputDevice {
    fn default() -> Self {
        Self::new()
    }
}

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

pub fn midi_note_name(note: u8) -> String {
    let octave = (note / 12) as i32 - 1;
    let note_index = (note % 12) as usize;
    format!("{}{}", NOTE_NAMES[note_index], octave)
}

/// Parse scientific pitch notation (`A4`, `C#3`, `Bb2`, `c-1`) into a MIDI
/// note number. Returns `None` for anything outside 0..=127.
pub fn parse_note_name(name: &str) -> Option<u8> {
    let mut chars = name.chars();
    let pitch_class: i32 = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let rest = chars.as_str();
    let (accidental, octave) = match rest.as_bytes().first()? {
        b'#' => (1, &rest[1..]),
        b'b' => (-1, &rest[1..]),
        _ => (0, rest),
    };

    if octave.is_empty() || octave.starts_with('+') {
        return None;
    }
    let octave: i32 = octave.parse().ok()?;
    let note = (octave + 1) * 12 + pitch_class + accidental;
    u8::try_from(note).ok().filter(|n| *n <= 127)
}

pub fn midi_note_to_frequency(note: u8) -> f32 {
    440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0)
}
