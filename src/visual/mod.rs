//! Two-pass accumulation renderer.
//!
//! Pass 1 scatters a frame's point batch additively into a float target owned by a `Surface`.
//! Pass 2 tone-maps that target into RGBA8 pixels. `FractalEngine` drives one
//! generate → accumulate → display cycle per call and owns the accumulation lifecycle.

mod cpu;
pub mod display;
#[cfg(target_os = "macos")]
mod metal;

use std::borrow::Cow;

use crate::fractal::morph::morph;
use crate::fractal::sampler::{fill_point_batch, PointBatch};
use crate::fractal::{FractalSystem, Rgb};

pub use cpu::CpuSurface;
pub use display::DisplayParams;
#[cfg(target_os = "macos")]
pub use metal::MetalSurface;

pub const DEFAULT_CLEAR_INTERVAL: u32 = 300;
pub const DEFAULT_TRAIL_DECAY: f32 = 0.92;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Toggles {
    pub bloom: bool,
    pub kaleidoscope: bool,
    pub trails: bool,
    pub infinite_accumulation: bool,
    pub adaptive_detail: bool,
    pub rotation: bool,
    pub morph: bool,
}

/// Numeric effect amounts. Zero is the no-op value for every field.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Effects {
    pub tunnel: f32,
    pub spiral: f32,
    pub wave: f32,
    pub radial_pulse: f32,
    pub ripple: f32,
    pub rotation_speed: f32,
    pub kaleidoscope_segments: f32,
    pub feedback_zoom: f32,
    pub noise_warp: f32,
    pub pixelate: f32,
    pub chromatic_aberration: f32,
    pub prism: f32,
    pub bloom_strength: f32,
    pub edge_glow: f32,
    pub posterize: f32,
    pub hue_shift: f32,
}

/// Per-frame snapshot handed to the engine. The host builds a new one each tick.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameConfig {
    pub iterations: usize,
    pub max_points: usize,
    pub zoom: f64,
    pub pan: [f64; 2],
    pub brightness: f64,
    pub color_low: Rgb,
    pub color_high: Rgb,
    pub background: Rgb,
    /// Seconds since the host started; drives every animated effect.
    pub time: f64,
    pub toggles: Toggles,
    pub effects: Effects,
    pub clear_interval: u32,
    pub trail_decay: f32,
    pub point_size: f32,
    pub point_intensity: f32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            iterations: 20_000,
            max_points: 400_000,
            zoom: 1.0,
            pan: [0.0, 0.0],
            brightness: 4.0,
            color_low: [0.10, 0.05, 0.30],
            color_high: [1.00, 0.85, 0.55],
            background: [0.03, 0.03, 0.06],
            time: 0.0,
            toggles: Toggles::default(),
            effects: Effects::default(),
            clear_interval: DEFAULT_CLEAR_INTERVAL,
            trail_decay: DEFAULT_TRAIL_DECAY,
            point_size: 1.0,
            point_intensity: 0.02,
        }
    }
}

/// Points to generate this frame. Adaptive detail scales by `zoom^2.5` so zoomed views keep
/// their apparent density; both paths are capped at `max_points`.
pub fn points_for_frame(config: &FrameConfig) -> usize {
    let base = config.iterations as f64;
    let n = if config.toggles.adaptive_detail {
        let zoom = if config.zoom.is_finite() { config.zoom.max(1.0) } else { 1.0 };
        base * zoom.powf(2.5)
    } else {
        base
    };
    n.min(config.max_points as f64).max(0.0) as usize
}

#[derive(Clone, Debug, PartialEq)]
pub struct MorphTarget {
    pub to: FractalSystem,
    pub t: f64,
}

/// What to draw: the active system and, while morphing, where it is heading.
#[derive(Clone, Debug, PartialEq)]
pub struct Scene {
    pub system: FractalSystem,
    pub morph: Option<MorphTarget>,
}

impl Scene {
    pub fn new(system: FractalSystem) -> Self {
        Self { system, morph: None }
    }

    /// The system actually sampled this frame. The morph target only applies while the morph
    /// toggle is on.
    pub fn effective_system(&self, toggles: &Toggles) -> Cow<'_, FractalSystem> {
        match &self.morph {
            Some(target) if toggles.morph => Cow::Owned(morph(&self.system, &target.to, target.t)),
            _ => Cow::Borrowed(&self.system),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClearReason {
    Initial,
    SystemChanged,
    ModeChanged,
    Periodic,
}

impl ClearReason {
    pub fn label(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::SystemChanged => "system changed",
            Self::ModeChanged => "mode changed",
            Self::Periodic => "periodic",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameAction {
    pub clear: Option<ClearReason>,
    pub fade: Option<f32>,
}

/// Accumulation lifecycle.
///
/// Starts cleared. Clears every `clear_interval` frames unless trails or infinite accumulation
/// is on; trails fade by `trail_decay` each frame instead. Force-clears when the system name
/// changes or either mode toggles. Zoom, pan and iteration changes never clear.
#[derive(Clone, Debug, Default)]
pub struct AccumulationPolicy {
    frames_since_clear: u32,
    last_system: Option<String>,
    last_mode: (bool, bool),
}

impl AccumulationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_since_clear(&self) -> u32 {
        self.frames_since_clear
    }

    /// Record an external clear (manual clear, surface resize).
    pub fn note_cleared(&mut self) {
        self.frames_since_clear = 0;
    }

    pub fn advance(&mut self, system_name: &str, config: &FrameConfig) -> FrameAction {
        let trails = config.toggles.trails;
        let infinite = config.toggles.infinite_accumulation;
        let mode = (trails, infinite);

        let clear = match self.last_system.as_deref() {
            None => Some(ClearReason::Initial),
            Some(prev) if prev != system_name => Some(ClearReason::SystemChanged),
            _ if mode != self.last_mode => Some(ClearReason::ModeChanged),
            _ if !trails
                && !infinite
                && config.clear_interval > 0
                && self.frames_since_clear >= config.clear_interval =>
            {
                Some(ClearReason::Periodic)
            }
            _ => None,
        };

        if self.last_system.as_deref() != Some(system_name) {
            self.last_system = Some(system_name.to_string());
        }
        self.last_mode = mode;
        if clear.is_some() {
            self.frames_since_clear = 0;
        }
        self.frames_since_clear = self.frames_since_clear.saturating_add(1);

        let fade = (trails && clear.is_none()).then_some(config.trail_decay.clamp(0.0, 1.0));
        FrameAction { clear, fade }
    }
}

/// World → clip transform for the accumulation pass: `screen = (world − pan) · zoom`, then the
/// wider axis is squeezed so the unit square stays square.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    pub zoom: f32,
    pub pan: [f32; 2],
    pub aspect: [f32; 2],
    pub point_size: f32,
    pub intensity: f32,
}

impl ViewTransform {
    pub fn new(config: &FrameConfig, w: usize, h: usize) -> Self {
        let (w, h) = (w.max(1) as f32, h.max(1) as f32);
        let aspect = if w >= h { [h / w, 1.0] } else { [1.0, w / h] };
        let zoom = if config.zoom.is_finite() && config.zoom > 0.0 {
            config.zoom as f32
        } else {
            1.0
        };
        Self {
            zoom,
            pan: [config.pan[0] as f32, config.pan[1] as f32],
            aspect,
            point_size: config.point_size.max(1.0),
            intensity: config.point_intensity.max(0.0),
        }
    }

    /// Clip-space position in `[-1, 1]²` (y up) for a batch position.
    #[inline]
    pub fn to_clip(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.pan[0]) * self.zoom * self.aspect[0],
            (y - self.pan[1]) * self.zoom * self.aspect[1],
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("no GPU device available")]
    DeviceUnavailable,
    #[error("shader compile failed: {0}")]
    ShaderCompile(String),
    #[error("pipeline creation failed: {0}")]
    Pipeline(String),
    #[error("could not allocate render targets ({w}x{h})")]
    Allocation { w: usize, h: usize },
    #[error("surface size {w}x{h} is not drawable")]
    InvalidSize { w: usize, h: usize },
}

/// The canvas contract: a float accumulation target with additive point draws, a full-screen
/// display pass and RGBA8 readback.
pub trait Surface {
    fn name(&self) -> &'static str;
    fn resize(&mut self, w: usize, h: usize) -> Result<(), SurfaceError>;
    fn size(&self) -> (usize, usize);
    fn clear_accumulation(&mut self);
    /// Multiply every accumulated value by `decay`.
    fn fade_accumulation(&mut self, decay: f32);
    fn accumulate(&mut self, batch: &PointBatch, view: &ViewTransform) -> Result<(), SurfaceError>;
    fn display(&mut self, params: &DisplayParams) -> Result<(), SurfaceError>;
    /// Last displayed frame, tightly packed RGBA8 rows.
    fn pixels(&self) -> &[u8];
}

impl<S: Surface + ?Sized> Surface for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }
    fn resize(&mut self, w: usize, h: usize) -> Result<(), SurfaceError> {
        (**self).resize(w, h)
    }
    fn size(&self) -> (usize, usize) {
        (**self).size()
    }
    fn clear_accumulation(&mut self) {
        (**self).clear_accumulation()
    }
    fn fade_accumulation(&mut self, decay: f32) {
        (**self).fade_accumulation(decay)
    }
    fn accumulate(&mut self, batch: &PointBatch, view: &ViewTransform) -> Result<(), SurfaceError> {
        (**self).accumulate(batch, view)
    }
    fn display(&mut self, params: &DisplayParams) -> Result<(), SurfaceError> {
        (**self).display(params)
    }
    fn pixels(&self) -> &[u8] {
        (**self).pixels()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FrameStats {
    pub frame: u64,
    pub system: String,
    pub requested: usize,
    pub points: usize,
    pub cleared: Option<ClearReason>,
    pub faded: bool,
}

pub struct FractalEngine<S: Surface> {
    surface: S,
    rng: fastrand::Rng,
    policy: AccumulationPolicy,
    batch: PointBatch,
    frame: u64,
}

impl<S: Surface> FractalEngine<S> {
    pub fn new(surface: S, seed: u64) -> Self {
        tracing::info!(surface = surface.name(), seed, "fractal engine ready");
        Self {
            surface,
            rng: fastrand::Rng::with_seed(seed),
            policy: AccumulationPolicy::new(),
            batch: PointBatch::default(),
            frame: 0,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_name(&self) -> &'static str {
        self.surface.name()
    }

    pub fn size(&self) -> (usize, usize) {
        self.surface.size()
    }

    pub fn resize(&mut self, w: usize, h: usize) -> Result<(), SurfaceError> {
        if self.surface.size() == (w, h) {
            return Ok(());
        }
        self.surface.resize(w, h)?;
        self.policy.note_cleared();
        tracing::debug!(w, h, "surface resized");
        Ok(())
    }

    pub fn clear(&mut self) {
        self.surface.clear_accumulation();
        self.policy.note_cleared();
    }

    pub fn policy(&self) -> &AccumulationPolicy {
        &self.policy
    }

    pub fn pixels(&self) -> &[u8] {
        self.surface.pixels()
    }

    pub fn render_frame(&mut self, scene: &Scene, config: &FrameConfig) -> Result<FrameStats, SurfaceError> {
        let system = scene.effective_system(&config.toggles);
        let (w, h) = self.surface.size();
        if w == 0 || h == 0 {
            return Err(SurfaceError::InvalidSize { w, h });
        }

        let action = self.policy.advance(system.name(), config);
        if let Some(reason) = action.clear {
            tracing::debug!(system = system.name(), reason = reason.label(), "accumulation cleared");
            self.surface.clear_accumulation();
        }
        if let Some(decay) = action.fade {
            self.surface.fade_accumulation(decay);
        }

        let requested = points_for_frame(config);
        fill_point_batch(&system, requested, &mut self.rng, &mut self.batch);
        let view = ViewTransform::new(config, w, h);
        self.surface.accumulate(&self.batch, &view)?;

        let params = DisplayParams::from_config(config, system.has_colors(), w, h);
        self.surface.display(&params)?;

        self.frame += 1;
        let stats = FrameStats {
            frame: self.frame,
            system: system.name().to_string(),
            requested,
            points: self.batch.len(),
            cleared: action.clear,
            faded: action.fade.is_some(),
        };
        tracing::trace!(frame = stats.frame, points = stats.points, "frame rendered");
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_keeps_unit_square_square() {
        let cfg = FrameConfig::default();
        let v = ViewTransform::new(&cfg, 200, 100);
        let (x, y) = v.to_clip(1.0, 1.0);
        assert!((x - 0.5).abs() < 1e-6);
        assert!((y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn morph_target_ignored_when_toggle_off() {
        let a: FractalSystem = crate::fractal::presets::sierpinski().into();
        let b: FractalSystem = crate::fractal::presets::levy_c().into();
        let scene = Scene {
            system: a.clone(),
            morph: Some(MorphTarget { to: b, t: 0.5 }),
        };
        assert_eq!(scene.effective_system(&Toggles::default()).name(), a.name());
        let on = Toggles { morph: true, ..Toggles::default() };
        assert!(scene.effective_system(&on).name().contains('→'));
    }
}
