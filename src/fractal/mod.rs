//! Iterated function systems: data model, samplers, variations and morphing.
//!
//! Every system type is an immutable value. Constructors run a single normalisation step that
//! resolves optional defaults, so samplers and the renderer never re-check them.

pub mod math;
pub mod morph;
pub mod presets;
pub mod random;
pub mod sampler;
pub mod variation;

use num_complex::Complex64;

pub use math::Affine;
pub use variation::{VariationKind, WeightedVariation};

pub type Rgb = [f64; 3];

pub const WHITE: Rgb = [1.0, 1.0, 1.0];
pub const DEFAULT_COLOR_SPEED: f64 = 0.5;

/// Used when a flame is built without control points.
pub const DEFAULT_PALETTE: [Rgb; 5] = [
    [0.05, 0.02, 0.20],
    [0.55, 0.05, 0.45],
    [0.95, 0.35, 0.10],
    [1.00, 0.80, 0.25],
    [1.00, 1.00, 0.90],
];

/// Anything the chaos game can pick by probability.
pub trait Weighted {
    fn probability(&self) -> f64;
}

fn clamp_probability(p: f64) -> f64 {
    if p.is_finite() { p.max(0.0) } else { 0.0 }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 }
}

fn clamp_rgb(c: Rgb) -> Rgb {
    [clamp_unit(c[0]), clamp_unit(c[1]), clamp_unit(c[2])]
}

fn finite_or(v: f64, fallback: f64) -> f64 {
    if v.is_finite() { v } else { fallback }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AffineMap {
    pub matrix: [f64; 4],
    pub translation: [f64; 2],
    pub probability: f64,
    pub color: Option<Rgb>,
}

impl AffineMap {
    pub fn new(matrix: [f64; 4], translation: [f64; 2], probability: f64) -> Self {
        Self {
            matrix,
            translation,
            probability,
            color: None,
        }
    }

    pub fn with_color(mut self, color: Rgb) -> Self {
        self.color = Some(color);
        self
    }

    pub fn affine(&self) -> Affine {
        Affine::from_parts(self.matrix, self.translation)
    }

    fn normalized(mut self) -> Self {
        self.probability = clamp_probability(self.probability);
        self.color = self.color.map(clamp_rgb);
        self
    }
}

impl Weighted for AffineMap {
    fn probability(&self) -> f64 {
        self.probability
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct IfsSystem {
    pub name: String,
    pub maps: Vec<AffineMap>,
    pub scale: f64,
    pub center: [f64; 2],
}

impl IfsSystem {
    /// Callers guarantee `maps` is non-empty; the samplers emit nothing for an empty list.
    pub fn new(name: impl Into<String>, maps: Vec<AffineMap>) -> Self {
        Self {
            name: name.into(),
            maps,
            scale: 1.0,
            center: [0.0, 0.0],
        }
        .normalized()
    }

    pub fn with_view(mut self, scale: f64, center: [f64; 2]) -> Self {
        self.scale = scale;
        self.center = center;
        self.normalized()
    }

    pub fn normalized(mut self) -> Self {
        self.maps = self.maps.into_iter().map(AffineMap::normalized).collect();
        self.scale = finite_or(self.scale, 1.0);
        self.center = [finite_or(self.center[0], 0.0), finite_or(self.center[1], 0.0)];
        self
    }

    pub fn has_colors(&self) -> bool {
        self.maps.iter().any(|m| m.color.is_some())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MobiusMap {
    pub a: Complex64,
    pub b: Complex64,
    pub c: Complex64,
    pub d: Complex64,
    pub probability: f64,
    pub color: Option<Rgb>,
}

impl MobiusMap {
    pub fn new(a: Complex64, b: Complex64, c: Complex64, d: Complex64, probability: f64) -> Self {
        Self {
            a,
            b,
            c,
            d,
            probability,
            color: None,
        }
    }

    pub fn with_color(mut self, color: Rgb) -> Self {
        self.color = Some(color);
        self
    }

    #[inline]
    pub fn apply(&self, z: Complex64) -> Complex64 {
        math::apply_mobius(z, self.a, self.b, self.c, self.d)
    }

    fn normalized(mut self) -> Self {
        self.probability = clamp_probability(self.probability);
        self.color = self.color.map(clamp_rgb);
        self
    }
}

impl Weighted for MobiusMap {
    fn probability(&self) -> f64 {
        self.probability
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MobiusSystem {
    pub name: String,
    pub maps: Vec<MobiusMap>,
    pub scale: f64,
    pub center: [f64; 2],
}

impl MobiusSystem {
    pub fn new(name: impl Into<String>, maps: Vec<MobiusMap>) -> Self {
        Self {
            name: name.into(),
            maps,
            scale: 1.0,
            center: [0.0, 0.0],
        }
        .normalized()
    }

    pub fn with_view(mut self, scale: f64, center: [f64; 2]) -> Self {
        self.scale = scale;
        self.center = center;
        self.normalized()
    }

    pub fn normalized(mut self) -> Self {
        self.maps = self.maps.into_iter().map(MobiusMap::normalized).collect();
        self.scale = finite_or(self.scale, 1.0);
        self.center = [finite_or(self.center[0], 0.0), finite_or(self.center[1], 0.0)];
        self
    }

    pub fn has_colors(&self) -> bool {
        self.maps.iter().any(|m| m.color.is_some())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FlameTransform {
    pub coefs: Affine,
    pub post: Option<Affine>,
    pub variations: Vec<WeightedVariation>,
    pub probability: f64,
    pub color_index: f64,
    pub color_speed: f64,
}

impl FlameTransform {
    pub fn new(coefs: Affine, variations: Vec<WeightedVariation>, probability: f64, color_index: f64) -> Self {
        Self {
            coefs,
            post: None,
            variations,
            probability,
            color_index,
            color_speed: DEFAULT_COLOR_SPEED,
        }
        .normalized()
    }

    /// Identity pre-affine, linear variation, neutral colour. Stand-in for a missing final
    /// transform while morphing.
    pub fn identity() -> Self {
        Self::new(
            Affine::IDENTITY,
            vec![WeightedVariation::new(VariationKind::Linear, 1.0)],
            1.0,
            0.0,
        )
        .with_color_speed(0.0)
    }

    pub fn with_post(mut self, post: Affine) -> Self {
        self.post = Some(post);
        self
    }

    pub fn with_color_speed(mut self, speed: f64) -> Self {
        self.color_speed = speed;
        self.normalized()
    }

    pub fn normalized(mut self) -> Self {
        self.probability = clamp_probability(self.probability);
        self.color_index = clamp_unit(self.color_index);
        self.color_speed = if self.color_speed.is_finite() {
            self.color_speed.clamp(0.0, 1.0)
        } else {
            DEFAULT_COLOR_SPEED
        };
        self
    }
}

impl Weighted for FlameTransform {
    fn probability(&self) -> f64 {
        self.probability
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FlameSystem {
    pub name: String,
    pub transforms: Vec<FlameTransform>,
    pub final_transform: Option<FlameTransform>,
    pub scale: f64,
    pub center: [f64; 2],
    pub rotate: f64,
    pub palette: Vec<Rgb>,
}

impl FlameSystem {
    pub fn new(name: impl Into<String>, transforms: Vec<FlameTransform>) -> Self {
        Self {
            name: name.into(),
            transforms,
            final_transform: None,
            scale: 1.0,
            center: [0.0, 0.0],
            rotate: 0.0,
            palette: Vec::new(),
        }
        .normalized()
    }

    pub fn with_view(mut self, scale: f64, center: [f64; 2]) -> Self {
        self.scale = scale;
        self.center = center;
        self.normalized()
    }

    pub fn with_rotate(mut self, radians: f64) -> Self {
        self.rotate = radians;
        self.normalized()
    }

    pub fn with_palette(mut self, palette: Vec<Rgb>) -> Self {
        self.palette = palette;
        self.normalized()
    }

    pub fn with_final(mut self, final_transform: FlameTransform) -> Self {
        self.final_transform = Some(final_transform);
        self
    }

    pub fn normalized(mut self) -> Self {
        self.transforms = self
            .transforms
            .into_iter()
            .map(FlameTransform::normalized)
            .collect();
        self.final_transform = self.final_transform.map(FlameTransform::normalized);
        self.scale = finite_or(self.scale, 1.0);
        self.center = [finite_or(self.center[0], 0.0), finite_or(self.center[1], 0.0)];
        self.rotate = finite_or(self.rotate, 0.0);
        if self.palette.is_empty() {
            self.palette = DEFAULT_PALETTE.to_vec();
        } else {
            self.palette = self.palette.into_iter().map(clamp_rgb).collect();
        }
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SystemKind {
    Ifs,
    Flame,
    Mobius,
}

impl SystemKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Ifs => "IFS",
            Self::Flame => "Flame",
            Self::Mobius => "Möbius",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FractalSystem {
    Ifs(IfsSystem),
    Flame(FlameSystem),
    Mobius(MobiusSystem),
}

impl FractalSystem {
    pub fn name(&self) -> &str {
        match self {
            Self::Ifs(s) => &s.name,
            Self::Flame(s) => &s.name,
            Self::Mobius(s) => &s.name,
        }
    }

    pub fn kind(&self) -> SystemKind {
        match self {
            Self::Ifs(_) => SystemKind::Ifs,
            Self::Flame(_) => SystemKind::Flame,
            Self::Mobius(_) => SystemKind::Mobius,
        }
    }

    /// Whether batches carry meaningful per-point colour. Flames always do (palette).
    pub fn has_colors(&self) -> bool {
        match self {
            Self::Ifs(s) => s.has_colors(),
            Self::Flame(_) => true,
            Self::Mobius(s) => s.has_colors(),
        }
    }

    pub fn map_count(&self) -> usize {
        match self {
            Self::Ifs(s) => s.maps.len(),
            Self::Flame(s) => s.transforms.len(),
            Self::Mobius(s) => s.maps.len(),
        }
    }

    pub fn view(&self) -> (f64, [f64; 2]) {
        match self {
            Self::Ifs(s) => (s.scale, s.center),
            Self::Flame(s) => (s.scale, s.center),
            Self::Mobius(s) => (s.scale, s.center),
        }
    }

    pub fn with_view(self, scale: f64, center: [f64; 2]) -> Self {
        match self {
            Self::Ifs(s) => s.with_view(scale, center).into(),
            Self::Flame(s) => s.with_view(scale, center).into(),
            Self::Mobius(s) => s.with_view(scale, center).into(),
        }
    }
}

impl From<IfsSystem> for FractalSystem {
    fn from(s: IfsSystem) -> Self {
        Self::Ifs(s)
    }
}

impl From<FlameSystem> for FractalSystem {
    fn from(s: FlameSystem) -> Self {
        Self::Flame(s)
    }
}

impl From<MobiusSystem> for FractalSystem {
    fn from(s: MobiusSystem) -> Self {
        Self::Mobius(s)
    }
}
