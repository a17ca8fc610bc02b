//! Drift-A-Tone - hold the digit keys and let the circles drift.
//!
//! Every circle is a voice whose waveform comes from its own Lorenz
//! attractor; the longer a voice sounds, the further it wanders.

use clap::Parser;
use std::process::ExitCode;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use driftatone::audio::{list_output_devices, render_offline, AudioSystem};
use driftatone::cli::{parse_hold, Args};
use driftatone::config::InstrumentConfig;
use driftatone::controls::{control_for_key, Control};
use driftatone::error::{DriftError, Result};
use driftatone::instrument::Instrument;
use driftatone::logging;
use driftatone::rendering::{build_uniforms, RenderSystem};
use driftatone::style::Autoplayer;

/// Main application state
struct App {
    // Window and rendering
    window: Option<Arc<Window>>,
    render_system: Option<RenderSystem>,

    // Sound
    instrument: Arc<Mutex<Instrument>>,
    audio: AudioSystem,
    autoplayer: Autoplayer,

    // Configuration
    config: InstrumentConfig,

    // Time tracking
    start_time: Instant,

    /// First fatal error seen inside the event loop
    error: Option<DriftError>,
}

impl App {
    fn new(
        config: InstrumentConfig,
        instrument: Arc<Mutex<Instrument>>,
        audio: AudioSystem,
        autoplayer: Autoplayer,
    ) -> Self {
        Self {
            window: None,
            render_system: None,
            instrument,
            audio,
            autoplayer,
            config,
            start_time: Instant::now(),
            error: None,
        }
    }

    fn now_s(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: DriftError) {
        tracing::error!("{}", error);
        self.error.get_or_insert(error);
        event_loop.exit();
    }

    fn init_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window_attributes = Window::default_attributes()
            .with_title("Drift-A-Tone")
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.config.display.window_width,
                self.config.display.window_height,
            ));

        let window = Arc::new(
            event_loop
                .create_window(window_attributes)
                .map_err(|e| DriftError::Window(e.to_string()))?,
        );

        let render_system = pollster::block_on(RenderSystem::new(Arc::clone(&window)))?;

        let voices = self.config.voices.count();
        tracing::info!(
            "Hold 1-{} to play, {} merges, Up/Down transposes, Esc quits",
            voices,
            voices + 1
        );

        self.window = Some(window);
        self.render_system = Some(render_system);
        Ok(())
    }

    /// Route a key to the instrument. Returns false when the app should quit.
    fn handle_key(&mut self, code: KeyCode, state: ElementState, repeat: bool) -> bool {
        let Some(control) = control_for_key(code, self.config.voices.count()) else {
            return true;
        };
        let now_s = self.now_s();
        let mut instrument = self
            .instrument
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match (control, state) {
            (Control::Quit, ElementState::Pressed) => return false,
            (Control::Voice(voice), ElementState::Pressed) if !repeat => {
                self.autoplayer.user_press(voice, now_s, &mut instrument);
                instrument.press(voice);
            }
            (Control::Voice(voice), ElementState::Released) => {
                self.autoplayer.user_release(voice, now_s, &mut instrument);
                instrument.release(voice);
            }
            (Control::Merge, ElementState::Pressed) if !repeat => {
                self.autoplayer.user_activity(now_s, &mut instrument);
                if let Some(target) = instrument.merge() {
                    tracing::debug!(voice = target + 1, "Merged sounding pulses");
                }
            }
            (Control::PitchUp, ElementState::Pressed) => {
                self.autoplayer.user_activity(now_s, &mut instrument);
                instrument.pitch_up();
                tracing::debug!(octaves = instrument.pitch_shift(), "Pitch shift");
            }
            (Control::PitchDown, ElementState::Pressed) => {
                self.autoplayer.user_activity(now_s, &mut instrument);
                instrument.pitch_down();
                tracing::debug!(octaves = instrument.pitch_shift(), "Pitch shift");
            }
            _ => {}
        }
        true
    }

    /// Render a single frame
    fn render_frame(&mut self) {
        let (Some(window), Some(render_system)) = (&self.window, &mut self.render_system) else {
            return;
        };

        let snapshot = self
            .instrument
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot();
        let spectrum = self.audio.spectrum();

        let uniforms = build_uniforms(
            &snapshot,
            &spectrum,
            &self.config.display,
            render_system.size(),
            window.scale_factor() as f32,
            render_system.is_srgb(),
        );
        render_system.update_uniforms(&uniforms);

        match render_system.render() {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = window.inner_size();
                render_system.resize(size.width, size.height);
            }
            Err(e) => tracing::warn!("Render error: {:?}", e),
        }
    }
}

impl ApplicationHandler for App {
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        let now_s = self.now_s();
        {
            let mut instrument = self
                .instrument
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            self.autoplayer.tick(now_s, &mut instrument);
        }

        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return; // Already initialized
        }
        if let Err(e) = self.init_window(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(render_system) = &mut self.render_system {
                    render_system.resize(size.width, size.height);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        repeat,
                        ..
                    },
                ..
            } => {
                if !self.handle_key(code, state, repeat) {
                    event_loop.exit();
                }
            }
            WindowEvent::Focused(false) => {
                // Key releases are not delivered to an unfocused window
                let now_s = self.now_s();
                let mut instrument = self
                    .instrument
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                let held: Vec<usize> = instrument.active_voices().collect();
                for voice in held {
                    self.autoplayer.user_release(voice, now_s, &mut instrument);
                }
                instrument.release_all();
            }
            WindowEvent::RedrawRequested => {
                self.render_frame();
            }
            _ => {}
        }
    }
}

/// Headless mode: hold voices for a fixed time and write a WAV
fn run_offline(args: &Args, config: &InstrumentConfig, seconds: f64) -> Result<()> {
    let voices = parse_hold(&args.hold, config.voices.count())?;
    let recording = args.recording_config();
    recording.ensure_dir()?;

    let mut instrument = Instrument::new(config, config.audio.sample_rate_hz as f32);
    render_offline(&mut instrument, seconds, &voices, &recording.render_path())?;
    Ok(())
}

fn run(args: Args) -> Result<()> {
    if args.list_devices {
        for name in list_output_devices()? {
            println!("{}", name);
        }
        return Ok(());
    }

    let config = args.load_config()?;
    config.validate()?;

    if let Some(seconds) = args.render_seconds()? {
        return run_offline(&args, &config, seconds);
    }

    let instrument = Arc::new(Mutex::new(Instrument::new(
        &config,
        config.audio.sample_rate_hz as f32,
    )));
    let recording = args.record.then(|| args.recording_config());
    let audio = AudioSystem::new(
        Arc::clone(&instrument),
        config.analysis.clone(),
        args.device.as_deref(),
        recording.as_ref(),
    )?;
    let autoplayer = Autoplayer::new(config.style.clone(), config.voices.count(), args.seed);
    if config.style.enabled {
        tracing::info!(
            "Autoplay enabled after {:.1}s of idle time",
            config.style.idle_secs
        );
    }

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config, instrument, audio, autoplayer);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init_logger(args.verbose);

    tracing::info!("Drift-A-Tone starting");
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
