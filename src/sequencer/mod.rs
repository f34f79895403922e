/// Core sequencer logic - pattern channels multiplexed onto one step clock
///
/// The engine owns up to four channels, each a generated pattern bound to a
/// note source, plus the chord the chord-pulling channels cycle through. Every
/// tick evaluates all channels against a global step counter and returns one
/// coalesced trigger set.
use parking_lot::Mutex;
use tracing::{info, trace, warn};

use crate::composition::{Composition, NoteSpec, CHANNEL_COUNT};
use crate::error::ValidationError;

pub mod pattern;
pub mod playback;

pub use pattern::Pattern;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub pattern: Pattern,
    pub note: NoteSpec,
}

/// Everything that sounds on one step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerSet {
    /// Pitches for a single simultaneous attack. Duplicates are kept.
    pub pitches: Vec<String>,
    /// Distinct sample references in channel order.
    pub samples: Vec<String>,
}

impl TriggerSet {
    pub fn is_empty(&self) -> bool {
        self.pitches.is_empty() && self.samples.is_empty()
    }
}

type Channels = [Option<Channel>; CHANNEL_COUNT];

#[derive(Debug, Default)]
struct EngineState {
    channels: Channels,
    chord: Vec<String>,
    step_counter: u64,
    muted: bool,
}

/// Step multiplexer shared between the clock and the edit source.
///
/// All state sits behind one lock: `reconfigure` swaps in a fully built
/// channel set and `tick` reads the channels and advances the counter while
/// holding it, so a tick never sees half of a configuration.
#[derive(Debug, Default)]
pub struct RhythmEngine {
    state: Mutex<EngineState>,
}

impl RhythmEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_composition(composition: &Composition) -> Result<Self, ValidationError> {
        let engine = Self::new();
        engine.reconfigure(composition)?;
        Ok(engine)
    }

    /// Replace every channel slot and the chord. The step counter keeps
    /// running. On error the active configuration is left untouched.
    pub fn reconfigure(&self, composition: &Composition) -> Result<(), ValidationError> {
        let channels = match build_channels(composition) {
            Ok(channels) => channels,
            Err(e) => {
                warn!(error = %e, "Rejected composition, keeping previous configuration");
                return Err(e);
            }
        };
        let chord = composition.chord.clone();
        let active = channels.iter().flatten().count();

        {
            let mut state = self.state.lock();
            state.channels = channels;
            state.chord = chord;
        }

        info!(
            steps = composition.step_count,
            channels = active,
            "Reconfigured rhythm engine"
        );
        Ok(())
    }

    /// Evaluate every channel at the current step, then advance the counter.
    ///
    /// Always computes the full result, even when muted; muting is applied by
    /// the playback layer.
    pub fn tick(&self) -> TriggerSet {
        self.tick_with_step().1
    }

    /// Like `tick`, also returning the step index that was evaluated. Both come
    /// from the same lock acquisition.
    pub fn tick_with_step(&self) -> (u64, TriggerSet) {
        let mut state = self.state.lock();
        let step = state.step_counter;
        let mut triggers = TriggerSet::default();

        for channel in state.channels.iter().flatten() {
            if !channel.pattern.is_pulse(step) {
                continue;
            }
            match &channel.note {
                NoteSpec::ChordPull => {
                    if !state.chord.is_empty() {
                        let ix = (step % state.chord.len() as u64) as usize;
                        triggers.pitches.push(state.chord[ix].clone());
                    }
                }
                NoteSpec::Pitch(name) => triggers.pitches.push(name.clone()),
                NoteSpec::Sample(name) => {
                    if !triggers.samples.contains(name) {
                        triggers.samples.push(name.clone());
                    }
                }
            }
        }

        state.step_counter = step.wrapping_add(1);
        trace!(step, ?triggers, "Tick");
        (step, triggers)
    }

    /// Index of the step the next `tick` will evaluate.
    pub fn step_counter(&self) -> u64 {
        self.state.lock().step_counter
    }

    pub fn is_muted(&self) -> bool {
        self.state.lock().muted
    }

    pub fn set_muted(&self, muted: bool) {
        self.state.lock().muted = muted;
    }

    pub fn toggle_mute(&self) -> bool {
        let mut state = self.state.lock();
        state.muted = !state.muted;
        state.muted
    }

    /// Snapshot of the active channel slots.
    pub fn channels(&self) -> Channels {
        self.state.lock().channels.clone()
    }

    pub fn chord(&self) -> Vec<String> {
        self.state.lock().chord.clone()
    }
}

fn build_channels(composition: &Composition) -> Result<Channels, ValidationError> {
    composition.validate()?;

    let mut channels: Channels = Default::default();
    for (slot, spec) in channels.iter_mut().zip(&composition.channels) {
        if let Some(spec) = spec {
            *slot = Some(Channel {
                pattern: Pattern::generate(composition.step_count, spec.pulses, spec.offset)?,
                note: spec.note.clone(),
            });
        }
    }
    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::ChannelSpec;
    use std::sync::Arc;
    use std::thread;

    fn channel(pulses: usize, offset: i64, note: NoteSpec) -> Option<ChannelSpec> {
        Some(ChannelSpec {
            pulses,
            offset,
            note,
        })
    }

    fn composition(step_count: usize, channels: [Option<ChannelSpec>; 4]) -> Composition {
        Composition {
            tempo: 120.0,
            step_count,
            chord: Vec::new(),
            channels,
        }
    }

    fn pitch(name: &str) -> NoteSpec {
        NoteSpec::Pitch(name.to_string())
    }

    fn sample(name: &str) -> NoteSpec {
        NoteSpec::Sample(name.to_string())
    }

    #[test]
    fn test_empty_engine_ticks_silently() {
        let engine = RhythmEngine::new();
        for _ in 0..4 {
            assert!(engine.tick().is_empty());
        }
        assert_eq!(engine.step_counter(), 4);
    }

    #[test]
    fn test_pitch_and_sample_on_same_step() {
        let engine = RhythmEngine::with_composition(&composition(
            4,
            [
                channel(1, 0, pitch("A4")),
                channel(1, 0, sample("s-kick")),
                None,
                None,
            ],
        ))
        .unwrap();

        let triggers = engine.tick();
        assert_eq!(triggers.pitches, vec!["A4"]);
        assert_eq!(triggers.samples, vec!["s-kick"]);
        assert!(engine.tick().is_empty());
    }

    #[test]
    fn test_samples_are_deduplicated() {
        let engine = RhythmEngine::with_composition(&composition(
            4,
            [
                channel(4, 0, sample("s-kick")),
                None,
                channel(4, 0, sample("s-kick")),
                None,
            ],
        ))
        .unwrap();
        assert_eq!(engine.tick().samples, vec!["s-kick"]);
    }

    #[test]
    fn test_pitches_keep_duplicates_and_slot_order() {
        let engine = RhythmEngine::with_composition(&composition(
            2,
            [
                channel(2, 0, pitch("C4")),
                channel(2, 0, sample("s-snare")),
                channel(2, 0, pitch("C4")),
                channel(2, 0, sample("s-kick")),
            ],
        ))
        .unwrap();

        let triggers = engine.tick();
        assert_eq!(triggers.pitches, vec!["C4", "C4"]);
        assert_eq!(triggers.samples, vec!["s-snare", "s-kick"]);
    }

    #[test]
    fn test_chord_pull_uses_global_step() {
        let mut compo = composition(8, [channel(4, 0, NoteSpec::ChordPull), None, None, None]);
        compo.chord = vec!["C4".to_string(), "E4".to_string(), "G4".to_string()];
        let engine = RhythmEngine::with_composition(&compo).unwrap();
        assert_eq!(engine.chord(), compo.chord);

        // hits on every other step: counters 0, 2, 4 pick chord[0], chord[2], chord[1]
        let pitches: Vec<Vec<String>> = (0..6).map(|_| engine.tick().pitches).collect();
        assert_eq!(
            pitches,
            vec![
                vec!["C4".to_string()],
                vec![],
                vec!["G4".to_string()],
                vec![],
                vec!["E4".to_string()],
                vec![],
            ]
        );
    }

    #[test]
    fn test_chord_pull_with_empty_chord_is_silent() {
        let engine = RhythmEngine::with_composition(&composition(
            4,
            [channel(4, 0, NoteSpec::ChordPull), None, None, None],
        ))
        .unwrap();
        assert!(engine.tick().is_empty());
    }

    #[test]
    fn test_reconfigure_keeps_counter() {
        let engine = RhythmEngine::new();
        engine.tick();
        engine.tick();
        engine.tick();

        // 4 steps, single hit on step 0: counter 3 misses, counter 4 wraps to a hit
        engine
            .reconfigure(&composition(4, [channel(1, 0, pitch("E2")), None, None, None]))
            .unwrap();
        assert_eq!(engine.step_counter(), 3);
        assert!(engine.tick().is_empty());
        assert_eq!(engine.tick().pitches, vec!["E2"]);
    }

    #[test]
    fn test_failed_reconfigure_keeps_previous_configuration() {
        let good = composition(4, [channel(4, 0, pitch("A4")), None, None, None]);
        let engine = RhythmEngine::with_composition(&good).unwrap();

        let bad = composition(4, [None, channel(9, 0, pitch("A4")), None, None]);
        assert_eq!(
            engine.reconfigure(&bad),
            Err(ValidationError::PulsesOutOfRange { pulses: 9, steps: 4 })
        );

        let bad_note = composition(4, [channel(1, 0, sample("s-")), None, None, None]);
        assert!(matches!(
            engine.reconfigure(&bad_note),
            Err(ValidationError::MalformedNote(_))
        ));

        assert!(matches!(
            engine.reconfigure(&composition(0, Default::default())),
            Err(ValidationError::InvalidStepCount)
        ));

        assert_eq!(engine.tick().pitches, vec!["A4"]);
        assert_eq!(engine.channels()[0].as_ref().map(|c| c.pattern.hit_count()), Some(4));
    }

    #[test]
    fn test_absent_slots_are_disabled() {
        let engine = RhythmEngine::with_composition(&composition(
            4,
            [channel(4, 0, pitch("A4")), channel(4, 0, pitch("B4")), None, None],
        ))
        .unwrap();
        engine
            .reconfigure(&composition(4, [None, channel(4, 0, pitch("B4")), None, None]))
            .unwrap();

        let channels = engine.channels();
        assert!(channels[0].is_none());
        assert!(channels[1].is_some());
        assert_eq!(engine.tick().pitches, vec!["B4"]);
    }

    #[test]
    fn test_mute_does_not_gate_evaluation() {
        let engine = RhythmEngine::with_composition(&composition(
            2,
            [channel(2, 0, pitch("A4")), None, None, None],
        ))
        .unwrap();

        assert!(!engine.is_muted());
        assert!(engine.toggle_mute());
        assert_eq!(engine.tick().pitches, vec!["A4"]);
        assert_eq!(engine.step_counter(), 1);
        engine.set_muted(false);
        assert!(!engine.is_muted());
    }

    #[test]
    fn test_tick_with_step_reports_evaluated_step() {
        let engine = RhythmEngine::with_composition(&composition(
            3,
            [channel(1, 0, pitch("A4")), None, None, None],
        ))
        .unwrap();

        let (step, triggers) = engine.tick_with_step();
        assert_eq!(step, 0);
        assert_eq!(triggers.pitches, vec!["A4"]);
        let (step, triggers) = engine.tick_with_step();
        assert_eq!(step, 1);
        assert!(triggers.is_empty());
        assert_eq!(engine.step_counter(), 2);
    }

    #[test]
    fn test_step_counter_wraps_at_max() {
        // u64::MAX % 3 == 0, so the last step before wrapping is a hit on a 3-step pattern
        let engine = RhythmEngine::with_composition(&composition(
            3,
            [channel(1, 0, pitch("A4")), None, None, None],
        ))
        .unwrap();
        engine.state.lock().step_counter = u64::MAX;

        let (step, triggers) = engine.tick_with_step();
        assert_eq!(step, u64::MAX);
        assert_eq!(triggers.pitches, vec!["A4"]);
        assert_eq!(engine.step_counter(), 0);

        let (step, triggers) = engine.tick_with_step();
        assert_eq!(step, 0);
        assert_eq!(triggers.pitches, vec!["A4"]);
        assert_eq!(engine.step_counter(), 1);
    }

    #[test]
    fn test_tick_sees_whole_configurations() {
        // Every slot carries the same pitch within one configuration, so a mixed
        // read would show up as two different pitches in one trigger set.
        let config = |name: &str| {
            let note = || channel(1, 0, pitch(name));
            composition(1, [note(), note(), note(), note()])
        };
        let engine = Arc::new(RhythmEngine::with_composition(&config("C4")).unwrap());

        let writer = {
            let engine = Arc::clone(&engine);
            let a = config("C4");
            let b = config("D4");
            thread::spawn(move || {
                for i in 0..2000 {
                    let next = if i % 2 == 0 { &b } else { &a };
                    engine.reconfigure(next).unwrap();
                }
            })
        };

        for _ in 0..2000 {
            let triggers = engine.tick();
            assert_eq!(triggers.pitches.len(), 4);
            assert!(triggers.pitches.iter().all(|p| p == &triggers.pitches[0]));
        }
        writer.join().unwrap();
        assert_eq!(engine.step_counter(), 2000);
    }
}
