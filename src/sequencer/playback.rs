/// Playback engine - the transport clock that drives the rhythm engine
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{info, warn};

use super::{RhythmEngine, TriggerSet};
use crate::midi::parse_note_name;
use crate::samples::SampleTable;

/// Ticks per beat; the engine steps on eighth notes.
pub const SUBDIVISIONS_PER_BEAT: f64 = 2.0;

const VELOCITY: u8 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    StepAdvanced(u64),
    NoteOn(u8, u8), // note, velocity
    NoteOff(u8),    // note
    SampleHit { name: String, note: u8 },
}

pub fn step_duration(tempo: f64) -> Duration {
    Duration::try_from_secs_f64(60.0 / tempo / SUBDIVISIONS_PER_BEAT).unwrap_or(Duration::MAX)
}

/// Turn one tick's triggers into playback events. Nothing is emitted when
/// muted; the step itself is always reported.
pub fn step_events(
    step: u64,
    triggers: &TriggerSet,
    muted: bool,
    samples: &SampleTable,
) -> Vec<PlaybackEvent> {
    let mut events = vec![PlaybackEvent::StepAdvanced(step)];
    if muted {
        return events;
    }

    for pitch in &triggers.pitches {
        match parse_note_name(pitch) {
            Some(note) => events.push(PlaybackEvent::NoteOn(note, VELOCITY)),
            None => warn!(pitch = %pitch, "Skipping unplayable pitch"),
        }
    }
    for reference in &triggers.samples {
        match samples.resolve(reference) {
            Some(note) => events.push(PlaybackEvent::SampleHit {
                name: reference.clone(),
                note,
            }),
            None => warn!(sample = %reference, "Skipping unknown sample"),
        }
    }
    events
}

pub struct PlaybackEngine {
    sender: Sender<PlaybackEvent>,
    receiver: Receiver<PlaybackEvent>,
    is_running: Arc<AtomicBool>,
    tempo: Arc<Mutex<f64>>,
    clock: Option<JoinHandle<()>>,
}

impl PlaybackEngine {
    pub fn new(tempo: f64) -> Self {
        let (sender, receiver) = channel();

        Self {
            sender,
            receiver,
            is_running: Arc::new(AtomicBool::new(false)),
            tempo: Arc::new(Mutex::new(tempo)),
            clock: None,
        }
    }

    pub fn tempo(&self) -> f64 {
        *self.tempo.lock()
    }

    /// Takes effect from the next step.
    pub fn set_tempo(&self, tempo: f64) {
        if tempo.is_finite() && tempo > 0.0 {
            *self.tempo.lock() = tempo;
        } else {
            warn!(tempo, "Ignoring invalid tempo");
        }
    }

    pub fn start(&mut self, engine: Arc<RhythmEngine>, samples: Arc<SampleTable>) {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return;
        }

        let is_running = Arc::clone(&self.is_running);
        let tempo = Arc::clone(&self.tempo);
        let sender = self.sender.clone();
        info!(tempo = self.tempo(), "Starting transport");

        self.clock = Some(thread::spawn(move || {
            let mut last_step_time: Option<Instant> = None;

            while is_running.load(Ordering::SeqCst) {
                let now = Instant::now();
                let interval = step_duration(*tempo.lock());

                if last_step_time.map_or(true, |t| now.duration_since(t) >= interval) {
                    let (step, triggers) = engine.tick_with_step();
                    let events = step_events(step, &triggers, engine.is_muted(), &samples);

                    // Release pitches after half a step
                    let notes: Vec<u8> = events
                        .iter()
                        .filter_map(|e| match e {
                            PlaybackEvent::NoteOn(note, _) => Some(*note),
                            _ => None,
                        })
                        .collect();

                    for event in events {
                        let _ = sender.send(event);
                    }

                    if !notes.is_empty() {
                        let sender_clone = sender.clone();
                        let note_duration = interval / 2;
                        thread::spawn(move || {
                            thread::sleep(note_duration);
                            for note in notes {
                                let _ = sender_clone.send(PlaybackEvent::NoteOff(note));
                            }
                        });
                    }

                    last_step_time = Some(now);
                }

                thread::sleep(Duration::from_millis(1));
            }
        }));
    }

    /// Returns once the clock thread has exited, so no tick lands after this.
    pub fn stop(&mut self) {
        if self.is_running.swap(false, Ordering::SeqCst) {
            info!("Stopping transport");
        }
        if let Some(clock) = self.clock.take() {
            if clock.join().is_err() {
                warn!("Transport thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn poll_events(&self) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        Self::new(120.0)
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
