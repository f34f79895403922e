/// Audio output using cpal - a small polyphonic sine synth for pitches
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::midi::midi_note_to_frequency;

const VOICE_GAIN: f32 = 0.15;

#[derive(Debug, Clone, Copy)]
struct Voice {
    note: u8,
    frequency: f32,
    phase: f32,
}

pub struct AudioOutput {
    _stream: Option<cpal::Stream>,
    voices: Arc<Mutex<Vec<Voice>>>,
}

impl AudioOutput {
    pub fn new() -> Option<Self> {
        let voices = Arc::new(Mutex::new(Vec::new()));
        let stream = Self::setup_audio_stream(Arc::clone(&voices))?;

        Some(Self {
            _stream: Some(stream),
            voices,
        })
    }

    /// Output that tracks voices without a device, e.g. when no sound card is present.
    pub fn silent() -> Self {
        Self {
            _stream: None,
            voices: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn setup_audio_stream(voices: Arc<Mutex<Vec<Voice>>>) -> Option<cpal::Stream> {
        let host = cpal::default_host();
        let device = host.default_output_device()?;
        let config = device.default_output_config().ok()?;

        let sample_rate = config.sample_rate().0 as f32;
        let channels = config.channels() as usize;

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => device.build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut voices = voices.lock();
                    for frame in data.chunks_mut(channels) {
                        let value = render_frame(&mut voices, sample_rate);
                        for sample in frame.iter_mut() {
                            *sample = value;
                        }
                    }
                },
                |err| error!("Audio stream error: {}", err),
                None,
            ),
            format => {
                warn!(?format, "Unsupported output sample format");
                return None;
            }
        };

        match stream {
            Ok(stream) => {
                if let Err(e) = stream.play() {
                    error!("Failed to start audio stream: {}", e);
                    return None;
                }
                info!(sample_rate, channels, "Audio output started");
                Some(stream)
            }
            Err(e) => {
                error!("Failed to build audio stream: {}", e);
                None
            }
        }
    }

    pub fn trigger_note(&mut self, note: u8) {
        let mut voices = self.voices.lock();
        if !voices.iter().any(|v| v.note == note) {
            voices.push(Voice {
                note,
                frequency: midi_note_to_frequency(note),
                phase: 0.0,
            });
        }
    }

    pub fn stop_note(&mut self, note: u8) {
        self.voices.lock().retain(|v| v.note != note);
    }

    pub fn stop_all(&mut self) {
        self.voices.lock().clear();
    }

    pub fn active_notes(&self) -> Vec<u8> {
        self.voices.lock().iter().map(|v| v.note).collect()
    }
}

impl Default for AudioOutput {
    fn default() -> Self {
        Self::new().unwrap_or_else(Self::silent)
    }
}

fn render_frame(voices: &mut [Voice], sample_rate: f32) -> f32 {
    let mut value = 0.0;
    for voice in voices.iter_mut() {
        value += (voice.phase * 2.0 * std::f32::consts::PI).sin() * VOICE_GAIN;
        voice.phase += voice.frequency / sample_rate;
        if voice.phase >= 1.0 {
            voice.phase -= 1.0;
        }
    }
    value.clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voices_follow_note_on_off() {
        let mut output = AudioOutput::silent();
        output.trigger_note(60);
        output.trigger_note(64);
        output.trigger_note(60);
        assert_eq!(output.active_notes(), vec![60, 64]);

        output.stop_note(60);
        assert_eq!(output.active_notes(), vec![64]);

        output.stop_all();
        assert!(output.active_notes().is_empty());
    }

    #[test]
    fn test_render_frame() {
        assert_eq!(render_frame(&mut [], 48_000.0), 0.0);

        let mut voices = [Voice {
            note: 69,
            frequency: 12_000.0,
            phase: 0.25,
        }];
        let value = render_frame(&mut voices, 48_000.0);
        assert!((value - VOICE_GAIN).abs() < 1e-6);
        assert!((voices[0].phase - 0.5).abs() < 1e-6);
    }
}
