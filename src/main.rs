//! Command-line front end: loads a ROM, wires up a `Bus`+`Cpu`, and either
//! drives it headlessly (test-harness / benchmarking use) or opens a window
//! when the `display` feature is enabled.

use std::path::PathBuf;
use std::process::ExitCode;

use arness::error::EmuError;
use arness::harness::{self, BlarggStatus};
use arness::{Bus, Cartridge, Cpu};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "arness", version, about = "An NES emulation core", long_about = None)]
struct Opts {
    /// The NES ROM (.nes, iNES format) to load.
    rom: PathBuf,

    /// Log every retired instruction at debug level.
    #[arg(long)]
    log_instructions: bool,

    /// Run in Nestest automation mode (reset PC adjusted by -4, no display).
    #[arg(long)]
    nestest: bool,

    /// Run a Blargg-style test ROM headlessly until it reports a result.
    #[arg(long)]
    blargh: bool,

    /// Renderer backend name (currently only "pixels" when the `display`
    /// feature is built in; ignored otherwise).
    #[arg(long)]
    renderer: Option<String>,

    /// Start the display window fullscreen (only meaningful with `display`).
    #[arg(long)]
    fullscreen: bool,
}

/// Plain startup configuration threaded into the emulator; not a global.
struct Config {
    rom: PathBuf,
    log_instructions: bool,
    nestest: bool,
    blargh: bool,
    #[allow(dead_code)]
    renderer: Option<String>,
    #[allow(dead_code)]
    fullscreen: bool,
}

impl From<Opts> for Config {
    fn from(opts: Opts) -> Self {
        Self {
            rom: opts.rom,
            log_instructions: opts.log_instructions,
            nestest: opts.nestest,
            blargh: opts.blargh,
            renderer: opts.renderer,
            fullscreen: opts.fullscreen,
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let config: Config = Opts::parse().into();

    match run(config) {
        Ok(code) => code,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: Config) -> Result<ExitCode, EmuError> {
    log::info!("loading {}", config.rom.display());
    let cart = Cartridge::from_ines_file(&config.rom)?;
    log::info!(
        "mapper {} loaded, prg={}KB chr={}KB mirroring={:?}",
        cart.mapper_id(),
        cart.prg_rom_len() / 1024,
        cart.chr_len() / 1024,
        cart.mirroring(),
    );

    let mut bus = Bus::new();
    bus.attach_cartridge(cart);
    bus.reset();

    let mut cpu = Cpu::new();
    cpu.reset(&mut bus);
    if config.nestest {
        cpu.apply_nestest_pc_quirk();
    }

    if config.blargh {
        return Ok(run_blargg(&mut cpu, &mut bus));
    }

    #[cfg(feature = "display")]
    {
        if let Err(err) = display::run(cpu, bus, &config) {
            log::error!("display init failed: {err}");
            return Err(EmuError::RendererInit(err.to_string()));
        }
        return Ok(ExitCode::SUCCESS);
    }

    #[cfg(not(feature = "display"))]
    {
        run_headless(&mut cpu, &mut bus, config.log_instructions);
        Ok(ExitCode::SUCCESS)
    }
}

/// Step until the Blargg test ROM status protocol reports a terminal code,
/// printing its message and mapping 0x00 to success.
fn run_blargg(cpu: &mut Cpu, bus: &mut Bus) -> ExitCode {
    const MAX_STEPS: u64 = 200_000_000;
    let mut steps = 0u64;
    loop {
        if cpu.is_halted() || steps >= MAX_STEPS {
            log::error!("blargg harness: emulation halted without a result");
            return ExitCode::FAILURE;
        }
        cpu.step(bus);
        steps += 1;

        match harness::poll_status(bus) {
            Some(BlarggStatus::Running) | None => continue,
            Some(BlarggStatus::NeedsReset) => {
                bus.reset();
                cpu.reset(bus);
            }
            Some(BlarggStatus::Done(code)) => {
                let message = harness::read_message(bus);
                log::info!("blargg result {code}: {message}");
                return if code == 0 {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::FAILURE
                };
            }
        }
    }
}

#[cfg(not(feature = "display"))]
fn run_headless(cpu: &mut Cpu, bus: &mut Bus, log_instructions: bool) {
    const MAX_FRAMES: u32 = 600;
    let mut frames = 0u32;
    while !cpu.is_halted() && frames < MAX_FRAMES {
        cpu.step(bus);
        if log_instructions {
            log::debug!(
                "PC={:04X} A={:02X} X={:02X} Y={:02X} SP={:02X} P={:02X}",
                cpu.pc(),
                cpu.a(),
                cpu.x(),
                cpu.y(),
                cpu.sp(),
                cpu.status(),
            );
        }
        if bus.ppu_mut().take_frame_complete() {
            frames += 1;
        }
    }
    log::info!("ran {frames} frames headlessly");
}

#[cfg(feature = "display")]
mod display {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use arness::controller::Button;
    use arness::render::{InputSource, Layer, Renderer};
    use arness::{Bus, Cpu};
    use pixels::{Pixels, SurfaceTexture};
    use winit::application::ApplicationHandler;
    use winit::dpi::LogicalSize;
    use winit::event::{ElementState, KeyEvent, WindowEvent};
    use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
    use winit::keyboard::{KeyCode, PhysicalKey};
    use winit::window::{Window, WindowId};

    use crate::Config;

    const SCALE: u32 = 3;
    const WIDTH: u32 = 256;
    const HEIGHT: u32 = 240;

    /// Tracks which NES buttons are currently held, driven by WASD/arrows +
    /// Z/X/Enter/RShift; implements the core's `InputSource` contract.
    #[derive(Default)]
    struct Keyboard {
        pending: Vec<(Button, bool)>,
    }

    impl Keyboard {
        fn handle(&mut self, code: KeyCode, pressed: bool) {
            let button = match code {
                KeyCode::KeyZ => Button::A,
                KeyCode::KeyX => Button::B,
                KeyCode::ShiftRight | KeyCode::ShiftLeft => Button::Select,
                KeyCode::Enter => Button::Start,
                KeyCode::ArrowUp => Button::Up,
                KeyCode::ArrowDown => Button::Down,
                KeyCode::ArrowLeft => Button::Left,
                KeyCode::ArrowRight => Button::Right,
                _ => return,
            };
            self.pending.push((button, pressed));
        }
    }

    impl InputSource for Keyboard {
        fn poll(&mut self) -> Vec<(Button, bool)> {
            std::mem::take(&mut self.pending)
        }
    }

    /// Adapts a `pixels::Pixels` surface to the core's `Renderer` contract.
    struct PixelsRenderer<'a> {
        pixels: &'a mut Pixels<'static>,
        transparent: Vec<bool>,
    }

    impl<'a> Renderer for PixelsRenderer<'a> {
        fn init(&mut self) -> Result<(), arness::error::EmuError> {
            Ok(())
        }

        fn cleanup(&mut self) {}

        fn update(&mut self) {
            if let Err(err) = self.pixels.render() {
                log::error!("present failed: {err}");
            }
        }

        fn clear(&mut self, bg_color: (u8, u8, u8)) {
            let frame = self.pixels.frame_mut();
            for px in frame.chunks_exact_mut(4) {
                px[0] = bg_color.0;
                px[1] = bg_color.1;
                px[2] = bg_color.2;
                px[3] = 0xFF;
            }
        }

        fn set_pixel(&mut self, _layer: Layer, x: u32, y: u32, rgb: (u8, u8, u8)) {
            let idx = (y as usize * WIDTH as usize + x as usize) * 4;
            let frame = self.pixels.frame_mut();
            if idx + 3 < frame.len() {
                frame[idx] = rgb.0;
                frame[idx + 1] = rgb.1;
                frame[idx + 2] = rgb.2;
                frame[idx + 3] = 0xFF;
            }
        }

        fn set_transparent_pixel(&mut self, x: u32, y: u32) {
            let idx = y as usize * WIDTH as usize + x as usize;
            if idx < self.transparent.len() {
                self.transparent[idx] = true;
            }
        }

        fn is_transparent_pixel(&self, x: u32, y: u32) -> bool {
            let idx = y as usize * WIDTH as usize + x as usize;
            self.transparent.get(idx).copied().unwrap_or(false)
        }
    }

    struct App {
        cpu: Cpu,
        bus: Bus,
        keyboard: Keyboard,
        window: Option<Arc<Window>>,
        pixels: Option<Pixels<'static>>,
        fullscreen: bool,
        last_frame: Instant,
    }

    impl ApplicationHandler for App {
        fn resumed(&mut self, event_loop: &ActiveEventLoop) {
            if self.window.is_some() {
                return;
            }
            let mut attrs = Window::default_attributes()
                .with_title("arness")
                .with_inner_size(LogicalSize::new(WIDTH * SCALE, HEIGHT * SCALE))
                .with_resizable(false);
            if self.fullscreen {
                attrs = attrs.with_fullscreen(Some(winit::window::Fullscreen::Borderless(None)));
            }
            let window = Arc::new(
                event_loop
                    .create_window(attrs)
                    .expect("failed to create window"),
            );
            let size = window.inner_size();
            let surface = SurfaceTexture::new(size.width, size.height, window.clone());
            let pixels =
                Pixels::new(WIDTH, HEIGHT, surface).expect("failed to create pixel buffer");
            self.window = Some(window);
            self.pixels = Some(pixels);
        }

        fn window_event(
            &mut self,
            event_loop: &ActiveEventLoop,
            _window_id: WindowId,
            event: WindowEvent,
        ) {
            match event {
                WindowEvent::CloseRequested => event_loop.exit(),
                WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            physical_key: PhysicalKey::Code(code),
                            state,
                            ..
                        },
                    ..
                } => {
                    self.keyboard.handle(code, state == ElementState::Pressed);
                }
                WindowEvent::RedrawRequested => {
                    self.bus.apply_input(&mut self.keyboard, 0);

                    // Run CPU cycles until a frame finishes, capped so a
                    // stalled CPU can't spin this handler forever.
                    let mut guard = 0;
                    while !self.bus.ppu_mut().take_frame_complete() {
                        if self.cpu.is_halted() || guard > 300_000 {
                            break;
                        }
                        self.cpu.step(&mut self.bus);
                        guard += 1;
                    }

                    if let Some(pixels) = &mut self.pixels {
                        let mut renderer = PixelsRenderer {
                            pixels,
                            transparent: vec![false; (WIDTH * HEIGHT) as usize],
                        };
                        self.bus.present(&mut renderer);
                    }

                    let target = Duration::from_micros(16_667);
                    let elapsed = self.last_frame.elapsed();
                    if elapsed < target {
                        std::thread::sleep(target - elapsed);
                    }
                    self.last_frame = Instant::now();

                    if let Some(window) = &self.window {
                        window.request_redraw();
                    }
                }
                _ => {}
            }
        }

        fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
        }
    }

    pub fn run(cpu: Cpu, bus: Bus, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = App {
            cpu,
            bus,
            keyboard: Keyboard::default(),
            window: None,
            pixels: None,
            fullscreen: config.fullscreen,
            last_frame: Instant::now(),
        };

        event_loop.run_app(&mut app)?;
        Ok(())
    }
}
