use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Added to denominators so the warps stay finite at the origin.
pub const EPS: f64 = 1e-10;

pub type VariationParams = BTreeMap<String, f64>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VariationKind {
    Linear,
    Sinusoidal,
    Spherical,
    Swirl,
    Horseshoe,
    Polar,
    Handkerchief,
    Heart,
    Disc,
    Spiral,
    Hyperbolic,
    Diamond,
    Ex,
    Julia,
    Bent,
    Waves,
    Fisheye,
    Popcorn,
    Exponential,
    Power,
    Cosine,
    Rings,
    Fan,
    Blob,
    Pdj,
    Fan2,
    Rings2,
    Eyefish,
    Bubble,
    Cylinder,
    Tangent,
    Cross,
    Noise,
    Curl,
    Rectangles,
    Arch,
}

impl VariationKind {
    pub const ALL: [Self; 36] = [
        Self::Linear,
        Self::Sinusoidal,
        Self::Spherical,
        Self::Swirl,
        Self::Horseshoe,
        Self::Polar,
        Self::Handkerchief,
        Self::Heart,
        Self::Disc,
        Self::Spiral,
        Self::Hyperbolic,
        Self::Diamond,
        Self::Ex,
        Self::Julia,
        Self::Bent,
        Self::Waves,
        Self::Fisheye,
        Self::Popcorn,
        Self::Exponential,
        Self::Power,
        Self::Cosine,
        Self::Rings,
        Self::Fan,
        Self::Blob,
        Self::Pdj,
        Self::Fan2,
        Self::Rings2,
        Self::Eyefish,
        Self::Bubble,
        Self::Cylinder,
        Self::Tangent,
        Self::Cross,
        Self::Noise,
        Self::Curl,
        Self::Rectangles,
        Self::Arch,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Sinusoidal => "sinusoidal",
            Self::Spherical => "spherical",
            Self::Swirl => "swirl",
            Self::Horseshoe => "horseshoe",
            Self::Polar => "polar",
            Self::Handkerchief => "handkerchief",
            Self::Heart => "heart",
            Self::Disc => "disc",
            Self::Spiral => "spiral",
            Self::Hyperbolic => "hyperbolic",
            Self::Diamond => "diamond",
            Self::Ex => "ex",
            Self::Julia => "julia",
            Self::Bent => "bent",
            Self::Waves => "waves",
            Self::Fisheye => "fisheye",
            Self::Popcorn => "popcorn",
            Self::Exponential => "exponential",
            Self::Power => "power",
            Self::Cosine => "cosine",
            Self::Rings => "rings",
            Self::Fan => "fan",
            Self::Blob => "blob",
            Self::Pdj => "pdj",
            Self::Fan2 => "fan2",
            Self::Rings2 => "rings2",
            Self::Eyefish => "eyefish",
            Self::Bubble => "bubble",
            Self::Cylinder => "cylinder",
            Self::Tangent => "tangent",
            Self::Cross => "cross",
            Self::Noise => "noise",
            Self::Curl => "curl",
            Self::Rectangles => "rectangles",
            Self::Arch => "arch",
        }
    }

    /// Named free parameters this variation reads.
    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            Self::Waves => &["b", "c", "e", "f"],
            Self::Popcorn | Self::Fan => &["c", "f"],
            Self::Rings => &["c"],
            Self::Blob => &["high", "low", "waves"],
            Self::Pdj => &["a", "b", "c", "d"],
            Self::Fan2 | Self::Rectangles => &["x", "y"],
            Self::Rings2 => &["val"],
            Self::Curl => &["c1", "c2"],
            _ => &[],
        }
    }

    /// Value used when a transform does not set `name` explicitly. Unknown names read as 0.
    pub fn default_param(self, name: &str) -> f64 {
        match (self, name) {
            (Self::Waves, "b") | (Self::Waves, "c") => 1.0,
            (Self::Waves, "e") | (Self::Waves, "f") => 0.1,
            (Self::Popcorn, "c") | (Self::Popcorn, "f") => 0.1,
            (Self::Rings, "c") => 0.5,
            (Self::Fan, "c") => 0.5,
            (Self::Fan, "f") => 0.2,
            (Self::Blob, "high") => 1.0,
            (Self::Blob, "low") => 0.5,
            (Self::Blob, "waves") => 3.0,
            (Self::Pdj, "a") => 1.5,
            (Self::Pdj, "b") => -1.8,
            (Self::Pdj, "c") => 1.6,
            (Self::Pdj, "d") => 2.1,
            (Self::Fan2, "x") => 0.5,
            (Self::Fan2, "y") => 0.2,
            (Self::Rings2, "val") => 0.5,
            (Self::Curl, "c1") => 0.5,
            (Self::Curl, "c2") => 0.1,
            (Self::Rectangles, "x") | (Self::Rectangles, "y") => 0.5,
            _ => 0.0,
        }
    }

    /// Julia, Noise and Arch draw from the RNG on every application.
    pub fn is_stochastic(self) -> bool {
        matches!(self, Self::Julia | Self::Noise | Self::Arch)
    }
}

impl fmt::Display for VariationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown variation: {0}")]
pub struct UnknownVariation(pub String);

impl FromStr for VariationKind {
    type Err = UnknownVariation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name() == needle)
            .ok_or_else(|| UnknownVariation(s.trim().to_string()))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct WeightedVariation {
    pub kind: VariationKind,
    pub weight: f64,
    pub params: VariationParams,
}

impl WeightedVariation {
    pub fn new(kind: VariationKind, weight: f64) -> Self {
        Self {
            kind,
            weight,
            params: VariationParams::new(),
        }
    }

    pub fn with_param(mut self, name: &str, value: f64) -> Self {
        self.params.insert(name.to_string(), value);
        self
    }

    pub fn param(&self, name: &str) -> f64 {
        param(self.kind, &self.params, name)
    }
}

#[inline]
fn param(kind: VariationKind, params: &VariationParams, name: &str) -> f64 {
    params
        .get(name)
        .copied()
        .unwrap_or_else(|| kind.default_param(name))
}

/// Apply one unweighted variation to `(x, y)`.
pub fn variation(
    kind: VariationKind,
    x: f64,
    y: f64,
    params: &VariationParams,
    rng: &mut fastrand::Rng,
) -> (f64, f64) {
    let r2 = x * x + y * y;
    let r = r2.sqrt();
    let theta = y.atan2(x);
    let p = |name: &str| param(kind, params, name);

    match kind {
        VariationKind::Linear => (x, y),
        VariationKind::Sinusoidal => (x.sin(), y.sin()),
        VariationKind::Spherical => {
            let k = 1.0 / (r2 + EPS);
            (x * k, y * k)
        }
        VariationKind::Swirl => {
            let (s, c) = r2.sin_cos();
            (x * s - y * c, x * c + y * s)
        }
        VariationKind::Horseshoe => {
            let k = 1.0 / (r + EPS);
            ((x - y) * (x + y) * k, 2.0 * x * y * k)
        }
        VariationKind::Polar => (theta / PI, r - 1.0),
        VariationKind::Handkerchief => (r * (theta + r).sin(), r * (theta - r).cos()),
        VariationKind::Heart => {
            let (s, c) = (theta * r).sin_cos();
            (r * s, -r * c)
        }
        VariationKind::Disc => {
            let k = theta / PI;
            let (s, c) = (PI * r).sin_cos();
            (k * s, k * c)
        }
        VariationKind::Spiral => {
            let k = 1.0 / (r + EPS);
            let (s, c) = r.sin_cos();
            (k * (theta.cos() + s), k * (theta.sin() - c))
        }
        VariationKind::Hyperbolic => (theta.sin() / (r + EPS), r * theta.cos()),
        VariationKind::Diamond => (theta.sin() * r.cos(), theta.cos() * r.sin()),
        VariationKind::Ex => {
            let p0 = (theta + r).sin();
            let p1 = (theta - r).cos();
            let p0c = p0 * p0 * p0;
            let p1c = p1 * p1 * p1;
            (r * (p0c + p1c), r * (p0c - p1c))
        }
        VariationKind::Julia => {
            let omega = if rng.bool() { PI } else { 0.0 };
            let k = r.sqrt();
            let (s, c) = (theta * 0.5 + omega).sin_cos();
            (k * c, k * s)
        }
        VariationKind::Bent => {
            let nx = if x < 0.0 { 2.0 * x } else { x };
            let ny = if y < 0.0 { y * 0.5 } else { y };
            (nx, ny)
        }
        VariationKind::Waves => {
            let (b, c, e, f) = (p("b"), p("c"), p("e"), p("f"));
            (
                x + b * (y / (c * c + EPS)).sin(),
                y + e * (x / (f * f + EPS)).sin(),
            )
        }
        VariationKind::Fisheye => {
            let k = 2.0 / (r + 1.0);
            (k * y, k * x)
        }
        VariationKind::Popcorn => {
            let (c, f) = (p("c"), p("f"));
            (x + c * (3.0 * y).tan().sin(), y + f * (3.0 * x).tan().sin())
        }
        VariationKind::Exponential => {
            let k = (x - 1.0).exp();
            let (s, c) = (PI * y).sin_cos();
            (k * c, k * s)
        }
        VariationKind::Power => {
            let (s, c) = theta.sin_cos();
            let k = r.powf(s);
            (k * c, k * s)
        }
        VariationKind::Cosine => {
            let (s, c) = (PI * x).sin_cos();
            (c * y.cosh(), -s * y.sinh())
        }
        VariationKind::Rings => {
            let c = p("c");
            let dx = c * c + EPS;
            let k = (r + dx).rem_euclid(2.0 * dx) - dx + r * (1.0 - dx);
            (k * theta.cos(), k * theta.sin())
        }
        VariationKind::Fan => {
            let (c, f) = (p("c"), p("f"));
            let t = PI * (c * c + EPS);
            let half = t * 0.5;
            let a = if (theta + f).rem_euclid(t) > half {
                theta - half
            } else {
                theta + half
            };
            (r * a.cos(), r * a.sin())
        }
        VariationKind::Blob => {
            let (high, low, waves) = (p("high"), p("low"), p("waves"));
            let k = r * (low + (high - low) * (0.5 + 0.5 * (waves * theta).sin()));
            (k * theta.cos(), k * theta.sin())
        }
        VariationKind::Pdj => {
            let (a, b, c, d) = (p("a"), p("b"), p("c"), p("d"));
            ((a * y).sin() - (b * x).cos(), (c * x).sin() - (d * y).cos())
        }
        VariationKind::Fan2 => {
            let (px, py) = (p("x"), p("y"));
            let dx = PI * (px * px + EPS);
            let half = dx * 0.5;
            let t = theta + py - dx * ((theta + py) / dx).trunc();
            let a = if t > half { theta - half } else { theta + half };
            (r * a.sin(), r * a.cos())
        }
        VariationKind::Rings2 => {
            let v = p("val");
            let dx = v * v + EPS;
            let k = r - 2.0 * dx * ((r + dx) / (2.0 * dx)).trunc() + r * (1.0 - dx);
            (k * theta.sin(), k * theta.cos())
        }
        VariationKind::Eyefish => {
            let k = 2.0 / (r + 1.0);
            (k * x, k * y)
        }
        VariationKind::Bubble => {
            let k = 4.0 / (r2 + 4.0);
            (k * x, k * y)
        }
        VariationKind::Cylinder => (x.sin(), y),
        VariationKind::Tangent => (x.sin() / (y.cos() + EPS), y.tan()),
        VariationKind::Cross => {
            let s = x * x - y * y;
            let k = (1.0 / (s * s + EPS)).sqrt();
            (k * x, k * y)
        }
        VariationKind::Noise => {
            let psi1 = rng.f64();
            let psi2 = rng.f64();
            let (s, c) = (2.0 * PI * psi2).sin_cos();
            (psi1 * x * c, psi1 * y * s)
        }
        VariationKind::Curl => {
            let (c1, c2) = (p("c1"), p("c2"));
            let re = 1.0 + c1 * x + c2 * (x * x - y * y);
            let im = c1 * y + 2.0 * c2 * x * y;
            let k = 1.0 / (re * re + im * im + EPS);
            ((x * re + y * im) * k, (y * re - x * im) * k)
        }
        VariationKind::Rectangles => {
            let (px, py) = (p("x"), p("y"));
            let nx = if px == 0.0 {
                x
            } else {
                (2.0 * (x / px).floor() + 1.0) * px - x
            };
            let ny = if py == 0.0 {
                y
            } else {
                (2.0 * (y / py).floor() + 1.0) * py - y
            };
            (nx, ny)
        }
        VariationKind::Arch => {
            let ang = rng.f64() * PI;
            let (s, c) = ang.sin_cos();
            (s, s * s / (c + EPS))
        }
    }
}

/// Weighted sum of every listed variation. An empty list is plain linear.
pub fn apply_variations(
    variations: &[WeightedVariation],
    x: f64,
    y: f64,
    rng: &mut fastrand::Rng,
) -> (f64, f64) {
    if variations.is_empty() {
        return (x, y);
    }
    let mut sx = 0.0;
    let mut sy = 0.0;
    for v in variations {
        let (vx, vy) = variation(v.kind, x, y, &v.params, rng);
        sx += v.weight * vx;
        sy += v.weight * vy;
    }
    (sx, sy)
}
