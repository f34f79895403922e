/// Structured composition records consumed by the rhythm engine
///
/// A composition is replaced wholesale on every edit. It is deserialized from
/// strict JSON using the field names of the editor format:
///
/// ```json
/// {
///   "tempo": 120,
///   "steps": 16,
///   "chord": ["C4", "E4", "G4"],
///   "seq1": { "pulses": 3, "offset": 0, "note": "chord" },
///   "seq2": { "pulses": 4, "note": "s-kick" }
/// }
/// ```
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CompositionError, ValidationError};
use crate::midi::parse_note_name;
use crate::samples::{sample_name, SAMPLE_PREFIX};

pub const CHANNEL_COUNT: usize = 4;

const CHORD_PULL: &str = "chord";

/// Where a channel's note comes from when its pattern hits.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NoteSpec {
    /// Next tone of the composition's chord, indexed by the global step counter.
    #[default]
    ChordPull,
    /// Prefixed sample reference, e.g. `s-kick`.
    Sample(String),
    /// Literal pitch handed to the synth, e.g. `A4`.
    Pitch(String),
}

impl NoteSpec {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let ok = match self {
            NoteSpec::ChordPull => true,
            NoteSpec::Sample(reference) => sample_name(reference).is_some_and(|n| !n.is_empty()),
            NoteSpec::Pitch(name) => parse_note_name(name).is_some(),
        };
        if ok {
            Ok(())
        } else {
            Err(ValidationError::MalformedNote(self.to_string()))
        }
    }
}

impl FromStr for NoteSpec {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let note = if s == CHORD_PULL {
            NoteSpec::ChordPull
        } else if s.starts_with(SAMPLE_PREFIX) {
            NoteSpec::Sample(s.to_string())
        } else {
            NoteSpec::Pitch(s.to_string())
        };
        note.validate()?;
        Ok(note)
    }
}

impl TryFrom<String> for NoteSpec {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NoteSpec> for String {
    fn from(note: NoteSpec) -> Self {
        note.to_string()
    }
}

impl fmt::Display for NoteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoteSpec::ChordPull => f.write_str(CHORD_PULL),
            NoteSpec::Sample(reference) => f.write_str(reference),
            NoteSpec::Pitch(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub pulses: usize,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub note: NoteSpec,
}

/// Immutable snapshot of the user's composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "CompositionRecord", into = "CompositionRecord")]
pub struct Composition {
    pub tempo: f64,
    pub step_count: usize,
    pub chord: Vec<String>,
    pub channels: [Option<ChannelSpec>; CHANNEL_COUNT],
}

impl Composition {
    pub fn from_json(source: &str) -> Result<Self, CompositionError> {
        let composition: Composition = serde_json::from_str(source)?;
        composition.validate()?;
        Ok(composition)
    }

    pub fn load(path: &Path) -> Result<Self, CompositionError> {
        let source = fs::read_to_string(path)?;
        Self::from_json(&source)
    }

    /// Check everything the engine relies on. Pattern bounds are checked again
    /// when patterns are generated.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.tempo.is_finite() && self.tempo > 0.0) {
            return Err(ValidationError::InvalidTempo(self.tempo));
        }
        if self.step_count == 0 {
            return Err(ValidationError::InvalidStepCount);
        }
        if let Some(tone) = self.chord.iter().find(|t| parse_note_name(t).is_none()) {
            return Err(ValidationError::MalformedChordTone(tone.clone()));
        }
        for channel in self.channels.iter().flatten() {
            if channel.pulses > self.step_count {
                return Err(ValidationError::PulsesOutOfRange {
                    pulses: channel.pulses,
                    steps: self.step_count,
                });
            }
            channel.note.validate()?;
        }
        Ok(())
    }
}

impl Default for Composition {
    fn default() -> Self {
        Self {
            tempo: 120.0,
            step_count: 16,
            chord: Vec::new(),
            channels: [
                Some(ChannelSpec {
                    pulses: 3,
                    offset: 0,
                    note: NoteSpec::ChordPull,
                }),
                None,
                None,
                None,
            ],
        }
    }
}

/// On-disk shape: channels are the named fields `seq1`..`seq4`.
#[derive(Serialize, Deserialize)]
struct CompositionRecord {
    tempo: f64,
    steps: usize,
    #[serde(default)]
    chord: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    seq1: Option<ChannelSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    seq2: Option<ChannelSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    seq3: Option<ChannelSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    seq4: Option<ChannelSpec>,
}

impl From<CompositionRecord> for Composition {
    fn from(record: CompositionRecord) -> Self {
        Self {
            tempo: record.tempo,
            step_count: record.steps,
            chord: record.chord,
            channels: [record.seq1, record.seq2, record.seq3, record.seq4],
        }
    }
}

impl From<Composition> for CompositionRecord {
    fn from(composition: Composition) -> Self {
        let [seq1, seq2, seq3, seq4] = composition.channels;
        Self {
            tempo: composition.tempo,
            steps: composition.step_count,
            chord: composition.chord,
            seq1,
            seq2,
            seq3,
            seq4,
        }
    }
}
