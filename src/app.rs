use crate::config::{Config, EngineMode};
use crate::fractal::presets::{find_preset, make_presets};
use crate::fractal::random::{fitted, random_flame, random_ifs};
use crate::fractal::FractalSystem;
use crate::look::Look;
use crate::render::{Frame, HalfBlockRenderer, Renderer};
use crate::terminal::TerminalGuard;
use crate::visual::{
    CpuSurface, FractalEngine, FrameConfig, FrameStats, MorphTarget, Scene, Surface, ViewTransform,
};
use anyhow::Context;
use crossterm::event::{
    self, Event, KeyCode, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use std::io::BufWriter;
use std::time::{Duration, Instant};

const ZOOM_STEP: f64 = 1.25;
const WHEEL_ZOOM_STEP: f64 = 1.1;
const BRIGHTNESS_STEP: f64 = 1.25;
const PAN_STEP: f64 = 0.1;

/// Everything the key and mouse handlers can change between frames.
struct HostState {
    presets: Vec<FractalSystem>,
    active: usize,
    scene: Scene,
    frame: FrameConfig,
    morph_seconds: f32,
    show_hud: bool,
    show_help: bool,
    drag_from: Option<(u16, u16)>,
    rng: fastrand::Rng,
    clear_requested: bool,
}

impl HostState {
    fn switch_to(&mut self, next: FractalSystem) {
        // A switch during a morph starts from where the morph was heading.
        if let Some(target) = self.scene.morph.take() {
            self.scene.system = target.to;
        }
        if self.frame.toggles.morph && self.morph_seconds > 0.0 {
            tracing::debug!(from = self.scene.system.name(), to = next.name(), "morph started");
            self.scene.morph = Some(MorphTarget { to: next, t: 0.0 });
        } else {
            self.scene = Scene::new(next);
        }
    }

    fn step_preset(&mut self, forward: bool) {
        let n = self.presets.len();
        if n == 0 {
            return;
        }
        self.active = if forward {
            (self.active + 1) % n
        } else {
            (self.active + n - 1) % n
        };
        let next = self.presets[self.active].clone();
        self.switch_to(next);
    }

    fn random_system(&mut self) {
        let sys: FractalSystem = if self.rng.bool() {
            let maps = self.rng.usize(2..=5);
            random_ifs(&mut self.rng, maps).into()
        } else {
            random_flame(&mut self.rng).into()
        };
        let sys = fitted(sys, &mut self.rng);
        tracing::info!(system = sys.name(), "random system");
        self.switch_to(sys);
    }

    fn advance_morph(&mut self, dt: f32) {
        let Some(target) = self.scene.morph.as_mut() else {
            return;
        };
        target.t += f64::from(dt / self.morph_seconds.max(1e-3));
        if target.t >= 1.0 || !self.frame.toggles.morph {
            if let Some(target) = self.scene.morph.take() {
                self.scene.system = target.to;
            }
        }
    }

    fn pan_by(&mut self, dx: f64, dy: f64) {
        let z = self.frame.zoom.max(1e-6);
        self.frame.pan[0] += dx / z;
        self.frame.pan[1] += dy / z;
    }

    fn handle_key(&mut self, code: KeyCode, mods: KeyModifiers) -> bool {
        if mods.contains(KeyModifiers::CONTROL) && matches!(code, KeyCode::Char('c')) {
            return true;
        }
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('n') => self.step_preset(true),
            KeyCode::Char('p') => self.step_preset(false),
            KeyCode::Char('g') => self.random_system(),
            KeyCode::Left => self.pan_by(-PAN_STEP, 0.0),
            KeyCode::Right => self.pan_by(PAN_STEP, 0.0),
            KeyCode::Up => self.pan_by(0.0, PAN_STEP),
            KeyCode::Down => self.pan_by(0.0, -PAN_STEP),
            KeyCode::Char('+') | KeyCode::Char('=') => self.frame.zoom *= ZOOM_STEP,
            KeyCode::Char('-') | KeyCode::Char('_') => {
                self.frame.zoom = (self.frame.zoom / ZOOM_STEP).max(0.05)
            }
            KeyCode::Char('0') => {
                self.frame.zoom = 1.0;
                self.frame.pan = [0.0, 0.0];
            }
            KeyCode::Char(']') => self.frame.brightness *= BRIGHTNESS_STEP,
            KeyCode::Char('[') => {
                self.frame.brightness = (self.frame.brightness / BRIGHTNESS_STEP).max(0.01)
            }
            KeyCode::Char('b') => self.frame.toggles.bloom ^= true,
            KeyCode::Char('k') => self.frame.toggles.kaleidoscope ^= true,
            KeyCode::Char('t') => self.frame.toggles.trails ^= true,
            KeyCode::Char('i') => self.frame.toggles.infinite_accumulation ^= true,
            KeyCode::Char('a') => self.frame.toggles.adaptive_detail ^= true,
            KeyCode::Char('r') => self.frame.toggles.rotation ^= true,
            KeyCode::Char('m') => self.frame.toggles.morph ^= true,
            KeyCode::Char('c') => self.clear_requested = true,
            KeyCode::Char('h') => self.show_hud = !self.show_hud,
            KeyCode::Char('?') => self.show_help = !self.show_help,
            _ => {}
        }
        false
    }

    fn handle_mouse(&mut self, ev: MouseEvent, pixel_size: (usize, usize)) {
        match ev.kind {
            MouseEventKind::Down(MouseButton::Left) => self.drag_from = Some((ev.column, ev.row)),
            MouseEventKind::Up(MouseButton::Left) => self.drag_from = None,
            MouseEventKind::Drag(MouseButton::Left) => {
                let Some((c0, r0)) = self.drag_from else {
                    self.drag_from = Some((ev.column, ev.row));
                    return;
                };
                let (w, h) = pixel_size;
                let view = ViewTransform::new(&self.frame, w, h);
                // One column is one pixel wide; one row is two pixels tall.
                let dx_clip = (f64::from(ev.column) - f64::from(c0)) * 2.0 / w.max(1) as f64;
                let dy_clip = (f64::from(ev.row) - f64::from(r0)) * 4.0 / h.max(1) as f64;
                self.pan_by(
                    -dx_clip / f64::from(view.aspect[0]),
                    dy_clip / f64::from(view.aspect[1]),
                );
                self.drag_from = Some((ev.column, ev.row));
            }
            MouseEventKind::ScrollUp => self.frame.zoom *= WHEEL_ZOOM_STEP,
            MouseEventKind::ScrollDown => {
                self.frame.zoom = (self.frame.zoom / WHEEL_ZOOM_STEP).max(0.05)
            }
            _ => {}
        }
    }
}

pub fn run(cfg: Config) -> anyhow::Result<()> {
    let presets = make_presets();
    let active = match cfg.preset.as_deref() {
        Some(q) => find_preset(&presets, q).with_context(|| format!("no preset matches `{q}`"))?,
        None => 0,
    };

    let mut frame = cfg.frame_config();
    if let Some(path) = cfg.look.as_deref() {
        let look = Look::load(path).with_context(|| format!("load look {}", path.display()))?;
        look.apply(&mut frame);
        tracing::info!(path = %path.display(), settings = look.settings.len(), "look applied");
    }

    let seed = cfg.seed.unwrap_or_else(|| fastrand::u64(..));
    let _term = TerminalGuard::new()?;
    let mut out = BufWriter::new(TerminalGuard::stdout());
    let mut renderer = HalfBlockRenderer::new();

    let mut last_size = crossterm::terminal::size().context("get terminal size")?;
    if last_size.1 < 2 || last_size.0 < 4 {
        return Err(anyhow::anyhow!(
            "terminal too small (need at least 4x2, got {}x{})",
            last_size.0,
            last_size.1
        ));
    }

    let mut state = HostState {
        scene: Scene::new(presets[active].clone()),
        presets,
        active,
        frame,
        morph_seconds: cfg.morph_seconds,
        show_hud: true,
        show_help: false,
        drag_from: None,
        rng: fastrand::Rng::with_seed(seed.rotate_left(17)),
        clear_requested: false,
    };

    let (w, h) = pixel_size(last_size, hud_rows_for_size(last_size, state.show_hud));
    let surface = make_surface(cfg.engine, w, h)?;
    let mut engine = FractalEngine::new(surface, seed);

    let start = Instant::now();
    let mut last_frame = start;
    let mut fps = FpsCounter::new();
    let mut last_engine_ms = 0.0f32;

    loop {
        let now = Instant::now();

        while event::poll(Duration::from_millis(0))? {
            match event::read()? {
                Event::Key(k) if k.kind != KeyEventKind::Release => {
                    if state.handle_key(k.code, k.modifiers) {
                        return Ok(());
                    }
                }
                Event::Mouse(m) => state.handle_mouse(m, engine.size()),
                _ => {}
            }
        }

        // Size is re-read every frame; resize events can be missed in some terminals.
        last_size = crossterm::terminal::size()?;
        let (term_cols, term_rows) = last_size;
        let hud_rows = hud_rows_for_size(last_size, state.show_hud);
        let visual_rows = term_rows.saturating_sub(hud_rows).max(1);
        let (w, h) = HalfBlockRenderer::pixel_size(term_cols, visual_rows);
        engine
            .resize(w, h)
            .with_context(|| format!("resize surface to {w}x{h}"))?;

        let dt = now.duration_since(last_frame).as_secs_f32().max(1e-6);
        last_frame = now;
        state.advance_morph(dt);
        state.frame.time = now.duration_since(start).as_secs_f64();

        if std::mem::take(&mut state.clear_requested) {
            engine.clear();
        }

        let engine_start = Instant::now();
        let stats = engine
            .render_frame(&state.scene, &state.frame)
            .context("render frame")?;
        last_engine_ms = 0.8 * last_engine_ms + 0.2 * engine_start.elapsed().as_secs_f32() * 1000.0;

        let hud = if state.show_hud {
            build_hud(&state, &stats, fps.fps(), last_engine_ms, engine.surface_name())
        } else {
            String::new()
        };

        let frame = Frame {
            term_cols,
            term_rows,
            visual_rows,
            pixel_width: w,
            pixel_height: h,
            pixels_rgba: engine.pixels(),
            hud: &hud,
            hud_rows,
            overlay: state.show_help.then_some(help_popup_text()),
            sync_updates: cfg.sync_updates,
        };
        renderer.render(&frame, &mut out)?;
        fps.tick();

        // Frame pacing.
        let target = Duration::from_secs_f32(1.0 / cfg.fps.max(1) as f32);
        let elapsed = now.elapsed();
        if elapsed < target {
            std::thread::sleep(target - elapsed);
        }
    }
}

fn make_surface(mode: EngineMode, w: usize, h: usize) -> anyhow::Result<Box<dyn Surface>> {
    match mode {
        EngineMode::Cpu => Ok(Box::new(CpuSurface::new(w, h))),
        EngineMode::Metal => metal_surface(w, h),
    }
}

#[cfg(target_os = "macos")]
fn metal_surface(w: usize, h: usize) -> anyhow::Result<Box<dyn Surface>> {
    let surface = crate::visual::MetalSurface::new(w, h).context("create Metal surface")?;
    Ok(Box::new(surface))
}

#[cfg(not(target_os = "macos"))]
fn metal_surface(_w: usize, _h: usize) -> anyhow::Result<Box<dyn Surface>> {
    anyhow::bail!("--engine metal is only supported on macOS")
}

fn hud_rows_for_size(size: (u16, u16), show_hud: bool) -> u16 {
    if !show_hud || size.1 <= 3 {
        return 0;
    }
    2
}

fn pixel_size(size: (u16, u16), hud_rows: u16) -> (usize, usize) {
    let visual_rows = size.1.saturating_sub(hud_rows).max(1);
    HalfBlockRenderer::pixel_size(size.0, visual_rows)
}

fn on_off(v: bool) -> &'static str {
    if v { "on" } else { "off" }
}

fn build_hud(
    state: &HostState,
    stats: &FrameStats,
    fps: f32,
    engine_ms: f32,
    surface: &str,
) -> String {
    let f = &state.frame;
    let t = &f.toggles;
    let (name, points, requested) = (stats.system.as_str(), stats.points, stats.requested);
    let morph = match &state.scene.morph {
        Some(m) => format!(" | morph {:>3.0}%", m.t * 100.0),
        None => String::new(),
    };
    let line1 = format!(
        "{name} [{}]{morph} | pts {points}/{requested} | zoom {:.2} | bright {:.2} | fps {fps:.0} | {engine_ms:.1} ms {surface}",
        state.scene.system.kind().label(),
        f.zoom,
        f.brightness,
    );
    let line2 = format!(
        "bloom {} | kaleido {} | trails {} | infinite {} | adaptive {} | rotate {} | morph {} | frames {} | ? help",
        on_off(t.bloom),
        on_off(t.kaleidoscope),
        on_off(t.trails),
        on_off(t.infinite_accumulation),
        on_off(t.adaptive_detail),
        on_off(t.rotation),
        on_off(t.morph),
        stats.frame,
    );
    format!("{line1}\n{line2}")
}

fn help_popup_text() -> &'static str {
    "Keys\n\
     q / Esc    quit\n\
     n / p      next / previous preset\n\
     g          random system\n\
     arrows     pan (mouse drag also pans)\n\
     + / -      zoom (mouse wheel also zooms)\n\
     0          reset view\n\
     [ / ]      brightness\n\
     b k r      bloom, kaleidoscope, rotation\n\
     t i        trails, infinite accumulation\n\
     a          adaptive detail\n\
     m          morph between presets\n\
     c          clear accumulation\n\
     h / ?      HUD / this help"
}

struct FpsCounter {
    last: Instant,
    frames: u32,
    fps: f32,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            last: Instant::now(),
            frames: 0,
            fps: 0.0,
        }
    }

    fn tick(&mut self) {
        self.frames += 1;
        let now = Instant::now();
        let dt = now.duration_since(self.last).as_secs_f32();
        if dt >= 0.5 {
            self.fps = self.frames as f32 / dt;
            self.frames = 0;
            self.last = now;
        }
    }

    fn fps(&self) -> f32 {
        self.fps
    }
}
