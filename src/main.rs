#[cfg(feature = "gui")]
use std::path::PathBuf;
#[cfg(feature = "gui")]
use std::sync::Arc;

#[cfg(feature = "gui")]
use clap::Parser;
#[cfg(feature = "gui")]
use eframe::egui;
#[cfg(feature = "gui")]
use tracing::{debug, error, warn};

#[cfg(feature = "gui")]
use eucseq::{
    AudioOutput, Composition, CompositionError, MidiOutputDevice, PlaybackEngine, PlaybackEvent,
    RhythmEngine, SampleTable,
};

#[cfg(feature = "gui")]
#[derive(Parser)]
#[clap(version, about = "A Euclidean step sequencer.")]
struct Cli {
    /// JSON composition to play. The built-in default is used when omitted.
    #[clap(long)]
    composition: Option<PathBuf>,
    /// Index of the MIDI output port to connect on startup.
    #[clap(long)]
    midi_port: Option<usize>,
}

#[cfg(feature = "gui")]
fn main() -> Result<(), eframe::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([900.0, 420.0])
            .with_title("EUCSEQ - Euclidean Sequencer"),
        ..Default::default()
    };

    eframe::run_native(
        "EUCSEQ",
        options,
        Box::new(move |_cc| Ok(Box::new(SequencerApp::new(cli)))),
    )
}

#[cfg(not(feature = "gui"))]
fn main() {
    eprintln!("This binary requires the 'gui' feature to be enabled");
    std::process::exit(1);
}

#[cfg(feature = "gui")]
struct SequencerApp {
    engine: Arc<RhythmEngine>,
    samples: Arc<SampleTable>,
    composition: Composition,
    composition_path: Option<PathBuf>,
    audio_output: AudioOutput,
    midi_output: MidiOutputDevice,
    playback_engine: PlaybackEngine,

    // UI state
    available_midi_ports: Vec<String>,
    selected_port: Option<usize>,
    current_visual_step: Option<u64>,
    status: Option<String>,
}

#[cfg(feature = "gui")]
impl SequencerApp {
    fn new(cli: Cli) -> Self {
        let available_midi_ports = MidiOutputDevice::available_ports();
        let engine = Arc::new(RhythmEngine::new());

        let mut app = Self {
            engine,
            samples: Arc::new(SampleTable::default()),
            composition: Composition::default(),
            composition_path: cli.composition,
            audio_output: AudioOutput::default(),
            midi_output: MidiOutputDevice::new(),
            playback_engine: PlaybackEngine::default(),
            available_midi_ports,
            selected_port: None,
            current_visual_step: None,
            status: None,
        };

        if app.engine.reconfigure(&app.composition).is_err() {
            error!("Default composition was rejected");
        }
        if app.composition_path.is_some() {
            app.reload();
        }
        if let Some(port) = cli.midi_port {
            app.connect_midi(port);
        }
        app
    }

    fn reload(&mut self) {
        let Some(path) = self.composition_path.clone() else {
            return;
        };

        let result = Composition::load(&path).and_then(|composition| {
            self.engine.reconfigure(&composition)?;
            Ok(composition)
        });

        match result {
            Ok(composition) => {
                self.playback_engine.set_tempo(composition.tempo);
                self.composition = composition;
                self.status = Some(format!("Loaded {}", path.display()));
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Keeping previous composition");
                self.status = Some(describe_error(&e));
            }
        }
    }

    fn connect_midi(&mut self, port: usize) {
        match self.midi_output.connect(port) {
            Ok(()) => self.selected_port = Some(port),
            Err(e) => {
                warn!("MIDI connection failed: {}", e);
                self.status = Some(e.to_string());
            }
        }
    }

    fn handle_playback_events(&mut self) {
        let events = self.playback_engine.poll_events();

        for event in events {
            let result = match event {
                PlaybackEvent::StepAdvanced(step) => {
                    self.current_visual_step = Some(step);
                    Ok(())
                }
                PlaybackEvent::NoteOn(note, velocity) => {
                    self.audio_output.trigger_note(note);
                    self.midi_output.send_note_on(note, velocity)
                }
                PlaybackEvent::NoteOff(note) => {
                    self.audio_output.stop_note(note);
                    self.midi_output.send_note_off(note)
                }
                PlaybackEvent::SampleHit { name, note } => {
                    if !self.midi_output.is_connected() {
                        debug!(sample = %name, "No MIDI output for sample");
                    }
                    self.midi_output.send_drum_hit(note, 100)
                }
            };
            if let Err(e) = result {
                warn!("MIDI send failed: {}", e);
            }
        }
    }

    fn start_playback(&mut self) {
        self.playback_engine.set_tempo(self.composition.tempo);
        self.playback_engine
            .start(Arc::clone(&self.engine), Arc::clone(&self.samples));
    }

    fn stop_playback(&mut self) {
        self.playback_engine.stop();
        self.release_all();
        self.current_visual_step = None;
    }

    fn toggle_mute(&mut self) {
        if self.engine.toggle_mute() {
            self.release_all();
        }
    }

    fn release_all(&mut self) {
        for note in self.audio_output.active_notes() {
            if let Err(e) = self.midi_output.send_note_off(note) {
                warn!("MIDI send failed: {}", e);
            }
        }
        self.audio_output.stop_all();
    }
}

#[cfg(feature = "gui")]
fn describe_error(e: &CompositionError) -> String {
    match e {
        CompositionError::Validation(v) => format!("Rejected: {}", v),
        other => other.to_string(),
    }
}

#[cfg(feature = "gui")]
impl eframe::App for SequencerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint();

        self.handle_playback_events();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("EUCSEQ - Euclidean Sequencer");
            ui.add_space(10.0);

            // MIDI Port Selection
            let mut selected_port_changed = None;
            ui.horizontal(|ui| {
                ui.label("MIDI Output:");
                if self.available_midi_ports.is_empty() {
                    ui.label("No MIDI ports available");
                } else {
                    egui::ComboBox::from_label("")
                        .selected_text(
                            self.selected_port
                                .and_then(|i| self.available_midi_ports.get(i))
                                .map(String::as_str)
                                .unwrap_or("Select port..."),
                        )
                        .show_ui(ui, |ui| {
                            for (i, port_name) in self.available_midi_ports.iter().enumerate() {
                                if ui
                                    .selectable_label(self.selected_port == Some(i), port_name)
                                    .clicked()
                                {
                                    selected_port_changed = Some(i);
                                }
                            }
                        });
                }
            });

            if let Some(port_idx) = selected_port_changed {
                self.connect_midi(port_idx);
            }

            ui.add_space(10.0);

            // Transport controls
            ui.horizontal(|ui| {
                if self.playback_engine.is_running() {
                    if ui.button("⏸ Stop").clicked() {
                        self.stop_playback();
                    }
                } else if ui.button("▶ Play").clicked() {
                    self.start_playback();
                }

                let mute_label = if self.engine.is_muted() { "Unmute" } else { "Mute" };
                if ui.button(mute_label).clicked() {
                    self.toggle_mute();
                }

                if self.composition_path.is_some() && ui.button("⟳ Reload").clicked() {
                    self.reload();
                }

                ui.add_space(20.0);
                ui.label(format!(
                    "{} BPM, {} steps",
                    self.composition.tempo, self.composition.step_count
                ));
                if !self.composition.chord.is_empty() {
                    ui.label(format!("chord: {}", self.composition.chord.join(" ")));
                }
            });

            ui.add_space(20.0);

            // One row of steps per channel
            let channels = self.engine.channels();
            for (slot, channel) in channels.iter().enumerate() {
                ui.horizontal(|ui| {
                    ui.add_sized([60.0, 30.0], egui::Label::new(format!("seq{}", slot + 1)));
                    let Some(channel) = channel else {
                        ui.label("off");
                        return;
                    };
                    ui.add_sized([70.0, 30.0], egui::Label::new(channel.note.to_string()));

                    let current = self
                        .current_visual_step
                        .map(|step| (step % channel.pattern.len() as u64) as usize);
                    for (i, &hit) in channel.pattern.steps().iter().enumerate() {
                        let fill = if current == Some(i) {
                            egui::Color32::from_rgb(100, 200, 100)
                        } else if hit {
                            egui::Color32::from_rgb(60, 60, 200)
                        } else {
                            egui::Color32::from_rgb(40, 40, 40)
                        };
                        ui.add(egui::Button::new("").min_size(egui::vec2(24.0, 24.0)).fill(fill));
                    }
                });
            }

            // Info
            ui.separator();
            if let Some(status) = &self.status {
                ui.label(status);
            }
            if !self.midi_output.is_connected() {
                ui.colored_label(
                    egui::Color32::YELLOW,
                    "⚠ No MIDI output connected - samples are silent, pitches play through audio only",
                );
            }
        });
    }
}
