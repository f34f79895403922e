/// EUCSEQ - a Euclidean step sequencer library
///
/// This library provides the core components for a pattern-driven sequencer:
/// - Pulse distribution over a fixed step count
/// - A four-channel step multiplexer driven by a global step counter
/// - Compositions loaded from JSON
/// - Audio and MIDI outputs plus a transport clock for playback

pub mod audio;
pub mod composition;
pub mod error;
pub mod midi;
pub mod samples;
pub mod sequencer;

// Re-export commonly used types
pub use audio::AudioOutput;
pub use composition::{ChannelSpec, Composition, NoteSpec, CHANNEL_COUNT};
pub use error::{CompositionError, MidiError, ValidationError};
pub use midi::{midi_note_name, parse_note_name, MidiOutputDevice};
pub use samples::SampleTable;
pub use sequencer::playback::{PlaybackEngine, PlaybackEvent};
pub use sequencer::{Channel, Pattern, RhythmEngine, TriggerSet};
