#[cfg(feature = "gui")]
use eframe::egui;

#[cfg(feature = "gui")]
use jamgrid::{
    AudioOutput, EngineConfig, FanOut, Group, InputFrame, MidiOutputDevice, Point, Session, Step,
};

#[cfg(feature = "gui")]
use clap::Parser;

/// Screen units are scaled by this much in the window
#[cfg(feature = "gui")]
const SCALE: f32 = 3.0;
#[cfg(feature = "gui")]
const GRID_SIZE: [f32; 2] = [320.0, 70.0];

#[cfg(feature = "gui")]
#[derive(Parser)]
#[command(name = "jamgrid", about = "Step sequencer with hidden play-count challenges")]
struct Args {
    /// Starting tempo
    #[arg(short, long)]
    bpm: Option<f32>,

    /// Seed for the hidden challenges (defaults to the wall clock)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Don't open an audio output
    #[arg(long)]
    no_audio: bool,

    /// MIDI output port to connect at startup
    #[arg(long)]
    midi_port: Option<usize>,
}

#[cfg(feature = "gui")]
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let mut config = EngineConfig::default();
    if let Some(bpm) = args.bpm {
        config = config.with_bpm(bpm);
    }
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }

    let mut sinks = FanOut::new();
    let audio_output = if args.no_audio {
        None
    } else {
        match AudioOutput::new() {
            Ok(audio) => {
                sinks.push(audio.sink());
                Some(audio)
            }
            Err(e) => {
                tracing::warn!("audio output unavailable: {}", e);
                None
            }
        }
    };
    let mut midi_output = MidiOutputDevice::new()?;
    sinks.push(midi_output.sink());
    if let Some(port) = args.midi_port {
        midi_output.connect(port)?;
    }

    let session = Session::new(config, sinks)?;
    let app = JamGridApp::new(session, audio_output, midi_output);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([GRID_SIZE[0] * SCALE + 20.0, 420.0])
            .with_title("JamGrid"),
        ..Default::default()
    };
    eframe::run_native("JamGrid", options, Box::new(|_cc| Ok(Box::new(app))))
        .map_err(|e| anyhow::anyhow!("{e}"))
}

#[cfg(not(feature = "gui"))]
fn main() {
    eprintln!("This binary requires the 'gui' feature to be enabled");
    std::process::exit(1);
}

#[cfg(feature = "gui")]
struct JamGridApp {
    session: Session,
    _audio_output: Option<AudioOutput>,
    midi_output: MidiOutputDevice,

    // UI state
    available_midi_ports: Vec<String>,
    selected_port: Option<usize>,
    notices: Vec<String>,
}

#[cfg(feature = "gui")]
impl JamGridApp {
    fn new(session: Session, audio_output: Option<AudioOutput>, midi_output: MidiOutputDevice) -> Self {
        let selected_port = midi_output.port_name().and_then(|name| {
            MidiOutputDevice::available_ports()
                .iter()
                .position(|p| p == name)
        });
        Self {
            session,
            _audio_output: audio_output,
            midi_output,
            available_midi_ports: MidiOutputDevice::available_ports(),
            selected_port,
            notices: vec![
                "Click a band member to write music.".into(),
                "Sequence notes with your mouse, ENTER plays/pauses, arrows change tempo.".into(),
            ],
        }
    }

    fn select_group(&mut self, group: Group) {
        if self.session.select_group(group) {
            self.notices.clear();
            for (lane, count) in self.session.rules(group).iter() {
                self.notices.push(format!(
                    "I remember {} being played at least {} times",
                    group.lane_label(lane),
                    count
                ));
            }
        }
    }

    fn to_layout(&self, origin: egui::Pos2, pos: egui::Pos2) -> Point {
        Point::new((pos.x - origin.x) / SCALE, (pos.y - origin.y) / SCALE)
    }

    fn to_screen(&self, origin: egui::Pos2, x: f32, y: f32) -> egui::Pos2 {
        egui::pos2(origin.x + x * SCALE, origin.y + y * SCALE)
    }

    fn draw_grid(&self, painter: &egui::Painter, origin: egui::Pos2, group: Group) {
        let layout = *self.session.layout();
        let lanes = group.lane_count();
        let bottom = layout.origin_y + (lanes as f32 - 0.5) * layout.row_spacing;

        for step in Step::all() {
            let x = layout.column_x(step);
            let color = if step.index() % 4 == 0 {
                egui::Color32::from_rgba_unmultiplied(100, 255, 0, 150)
            } else {
                egui::Color32::WHITE
            };
            painter.line_segment(
                [self.to_screen(origin, x, 0.0), self.to_screen(origin, x, bottom)],
                egui::Stroke::new(1.0, color),
            );
        }

        let last_x = layout.column_x(Step::LAST);
        for lane in group.lanes() {
            let y = layout.row_y(lane);
            painter.line_segment(
                [
                    self.to_screen(origin, layout.origin_x, y),
                    self.to_screen(origin, last_x, y),
                ],
                egui::Stroke::new(1.0, egui::Color32::WHITE),
            );

            let mut label = group.lane_label(lane).to_string();
            if let Some(count) = self.session.requirement_for(group, lane) {
                label = format!("({}) {}", count, label);
            }
            painter.text(
                self.to_screen(origin, layout.origin_x - 8.0, y),
                egui::Align2::RIGHT_CENTER,
                label,
                egui::FontId::monospace(12.0),
                egui::Color32::WHITE,
            );
        }

        let beat = self.session.current_beat();
        for step in Step::all() {
            for lane in self.session.step_lanes(group, step).iter() {
                let alpha = if beat == Some(step) { 255 } else { 150 };
                let rect = layout.cell_rect(jamgrid::Cell { step, lane });
                painter.rect_filled(
                    self.scaled_rect(origin, rect),
                    0.0,
                    egui::Color32::from_rgba_unmultiplied(255, 0, 255, alpha),
                );
            }
        }

        if let Some(cursor) = self.session.cursor() {
            painter.rect_filled(
                self.scaled_rect(origin, layout.cell_rect(cursor)),
                0.0,
                egui::Color32::from_rgba_unmultiplied(255, 255, 0, 150),
            );
        }

        if let Some(step) = beat {
            let x = layout.column_x(step);
            painter.rect_filled(
                self.scaled_rect(origin, jamgrid::Rect::new(x - 2.5, bottom + 5.0, 5.0, 5.0)),
                0.0,
                egui::Color32::from_rgba_unmultiplied(255, 255, 0, 150),
            );
        }
    }

    fn scaled_rect(&self, origin: egui::Pos2, rect: jamgrid::Rect) -> egui::Rect {
        egui::Rect::from_min_size(
            self.to_screen(origin, rect.x, rect.y),
            egui::vec2(rect.width * SCALE, rect.height * SCALE),
        )
    }
}

#[cfg(feature = "gui")]
impl eframe::App for JamGridApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("JamGrid");
            ui.add_space(10.0);

            // Band members
            ui.horizontal(|ui| {
                for group in Group::ALL {
                    let sounding = self.session.group_sounding(group);
                    let text = if sounding {
                        format!("♪ {}", group)
                    } else {
                        group.to_string()
                    };
                    let selected = self.session.selected_group() == Some(group);
                    if ui.selectable_label(selected, text).clicked() {
                        self.select_group(group);
                    }
                }
            });

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
                match self.midi_output.connect(port_idx) {
                    Ok(()) => self.selected_port = Some(port_idx),
                    Err(e) => tracing::warn!("{}", e),
                }
            }

            ui.add_space(10.0);

            // Transport controls
            let mut tempo_delta = 0.0;
            ui.horizontal(|ui| {
                let has_group = self.session.selected_group().is_some();
                let label = if self.session.is_playing() { "⏸ Stop" } else { "▶ Play" };
                if ui.add_enabled(has_group, egui::Button::new(label)).clicked() {
                    self.session.toggle_play();
                }

                ui.add_space(20.0);
                ui.label(format!("BPM: {:.0}", self.session.bpm()));
                if ui.button("-").clicked() {
                    tempo_delta -= self.session.tempo_step();
                }
                if ui.button("+").clicked() {
                    tempo_delta += self.session.tempo_step();
                }

                ui.add_space(20.0);
                if self.session.record_available() && ui.button("⏺ REC").clicked() {
                    self.session.record();
                    self.notices = vec![
                        "Yeah, this sounds right. Let's record!".into(),
                        "[You win! Does your jam sound good?]".into(),
                    ];
                }
            });

            ui.add_space(20.0);

            let (response, painter) = ui.allocate_painter(
                egui::vec2(GRID_SIZE[0] * SCALE, GRID_SIZE[1] * SCALE),
                egui::Sense::click(),
            );
            let origin = response.rect.min;

            let (pressed, enter, up, down) = ctx.input(|i| {
                (
                    i.pointer.primary_pressed(),
                    i.key_pressed(egui::Key::Enter),
                    i.key_pressed(egui::Key::ArrowUp),
                    i.key_pressed(egui::Key::ArrowDown),
                )
            });
            if up {
                tempo_delta += self.session.tempo_step();
            }
            if down {
                tempo_delta -= self.session.tempo_step();
            }

            let input = InputFrame {
                pointer: response.hover_pos().map(|pos| self.to_layout(origin, pos)),
                primary_pressed: pressed,
                toggle_play_pressed: enter,
                tempo_delta,
            };
            let report = self.session.tick(&input);
            if report.evaluation.just_met {
                self.notices = vec![
                    "[You're hitting all the right notes!]".into(),
                    "[Press the \"REC\" button when you're done.]".into(),
                ];
            }

            match self.session.selected_group() {
                Some(group) => self.draw_grid(&painter, origin, group),
                None => {
                    painter.text(
                        response.rect.center(),
                        egui::Align2::CENTER_CENTER,
                        "Click a band member!",
                        egui::FontId::proportional(18.0),
                        egui::Color32::GRAY,
                    );
                }
            }

            // Info
            ui.separator();
            for notice in &self.notices {
                ui.label(notice);
            }
            if !self.midi_output.is_connected() {
                ui.colored_label(
                    egui::Color32::YELLOW,
                    "⚠ No MIDI output connected - audio playback only",
                );
            }
        });
    }
}
