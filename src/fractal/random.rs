//! Random system generation and automatic framing.

use crate::fractal::math::Affine;
use crate::fractal::presets::{FIRE, NEON, OCEAN};
use crate::fractal::sampler::{fill_point_batch, PointBatch};
use crate::fractal::variation::{VariationKind, WeightedVariation};
use crate::fractal::{AffineMap, FlameSystem, FlameTransform, FractalSystem, IfsSystem, Rgb};

/// Sample size used to measure an attractor's extent.
pub const FIT_SAMPLES: usize = 4_000;
/// Fraction of the `[-1, 1]` square a fitted attractor should span.
pub const FIT_FILL: f64 = 0.9;
/// Quantile trimmed from each side when measuring extent.
const FIT_TRIM: f64 = 0.01;

fn range(rng: &mut fastrand::Rng, lo: f64, hi: f64) -> f64 {
    lo + (hi - lo) * rng.f64()
}

/// A random affine with spectral norm comfortably below 1.
fn contractive(rng: &mut fastrand::Rng, max_scale: f64) -> ([f64; 4], [f64; 2]) {
    let angle = range(rng, 0.0, std::f64::consts::TAU);
    let shear = range(rng, -0.3, 0.3);
    let sx = range(rng, 0.25, max_scale);
    let sy = range(rng, 0.25, max_scale) * if rng.bool() { 1.0 } else { -1.0 };
    let (s, c) = angle.sin_cos();
    let matrix = [c * sx, -s * sy + shear * c * sx, s * sx, c * sy + shear * s * sx];
    // Shear can push the norm past `max_scale`; the Frobenius norm bounds the spectral one.
    let norm = matrix.iter().map(|v| v * v).sum::<f64>().sqrt();
    let k = if norm > max_scale { max_scale / norm } else { 1.0 };
    let matrix = matrix.map(|v| v * k);
    let translation = [range(rng, -1.0, 1.0), range(rng, -1.0, 1.0)];
    (matrix, translation)
}

pub fn random_ifs(rng: &mut fastrand::Rng, maps: usize) -> IfsSystem {
    let n = maps.clamp(2, 8);
    let mut list = Vec::with_capacity(n);
    for i in 0..n {
        let (matrix, translation) = contractive(rng, 0.7);
        let det = (matrix[0] * matrix[3] - matrix[1] * matrix[2]).abs();
        let hue = i as f64 / n as f64;
        list.push(
            AffineMap::new(matrix, translation, det.max(0.02)).with_color([
                0.5 + 0.5 * (std::f64::consts::TAU * hue).cos(),
                0.5 + 0.5 * (std::f64::consts::TAU * (hue + 0.33)).cos(),
                0.5 + 0.5 * (std::f64::consts::TAU * (hue + 0.66)).cos(),
            ]),
        );
    }
    let total: f64 = list.iter().map(|m| m.probability).sum();
    for m in &mut list {
        m.probability /= total;
    }
    IfsSystem::new(format!("Random IFS #{:04}", rng.u32(0..10_000)), list)
}

const FLAME_VARIATION_POOL: [VariationKind; 14] = [
    VariationKind::Linear,
    VariationKind::Sinusoidal,
    VariationKind::Spherical,
    VariationKind::Swirl,
    VariationKind::Horseshoe,
    VariationKind::Polar,
    VariationKind::Handkerchief,
    VariationKind::Heart,
    VariationKind::Disc,
    VariationKind::Spiral,
    VariationKind::Hyperbolic,
    VariationKind::Julia,
    VariationKind::Bubble,
    VariationKind::Eyefish,
];

pub fn random_flame(rng: &mut fastrand::Rng) -> FlameSystem {
    let n = rng.usize(2..=4);
    let mut transforms = Vec::with_capacity(n);
    for i in 0..n {
        let (m, t) = contractive(rng, 0.8);
        let count = rng.usize(1..=2);
        let mut variations = Vec::with_capacity(count);
        for _ in 0..count {
            let kind = FLAME_VARIATION_POOL[rng.usize(..FLAME_VARIATION_POOL.len())];
            if variations.iter().any(|v: &WeightedVariation| v.kind == kind) {
                continue;
            }
            variations.push(WeightedVariation::new(kind, range(rng, 0.3, 1.0)));
        }
        let ci = if n > 1 { i as f64 / (n - 1) as f64 } else { 0.5 };
        transforms.push(FlameTransform::new(
            Affine::from_parts(m, t),
            variations,
            range(rng, 0.2, 1.0),
            ci,
        ));
    }
    let palettes: [&[Rgb]; 3] = [&FIRE, &OCEAN, &NEON];
    let palette = palettes[rng.usize(..palettes.len())].to_vec();
    let total: f64 = transforms.iter().map(|x| x.probability).sum();
    for xf in &mut transforms {
        xf.probability /= total;
    }
    FlameSystem::new(format!("Random Flame #{:04}", rng.u32(0..10_000)), transforms)
        .with_palette(palette)
}

fn quantile(sorted: &[f32], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() - 1) as f64 * q).round() as usize;
    f64::from(sorted[idx.min(sorted.len() - 1)])
}

/// Scale and center that frame `system` so its trimmed extent spans `FIT_FILL` of the view.
/// Falls back to the system's current view when the sample is empty or degenerate.
pub fn fit_to_view(system: &FractalSystem, rng: &mut fastrand::Rng) -> (f64, [f64; 2]) {
    let raw = system.clone().with_view(1.0, [0.0, 0.0]);
    let mut batch = PointBatch::with_capacity(FIT_SAMPLES);
    fill_point_batch(&raw, FIT_SAMPLES, rng, &mut batch);
    if batch.len() < 16 {
        return system.view();
    }

    let mut xs: Vec<f32> = batch.positions.iter().step_by(2).copied().collect();
    let mut ys: Vec<f32> = batch.positions.iter().skip(1).step_by(2).copied().collect();
    xs.sort_by(f32::total_cmp);
    ys.sort_by(f32::total_cmp);

    let (x0, x1) = (quantile(&xs, FIT_TRIM), quantile(&xs, 1.0 - FIT_TRIM));
    let (y0, y1) = (quantile(&ys, FIT_TRIM), quantile(&ys, 1.0 - FIT_TRIM));
    let extent = (x1 - x0).max(y1 - y0);
    if !extent.is_finite() || extent < 1e-9 {
        return system.view();
    }
    let scale = 2.0 * FIT_FILL / extent;
    (scale, [(x0 + x1) * 0.5, (y0 + y1) * 0.5])
}

/// Apply `fit_to_view` to `system`.
pub fn fitted(system: FractalSystem, rng: &mut fastrand::Rng) -> FractalSystem {
    let (scale, center) = fit_to_view(&system, rng);
    system.with_view(scale, center)
}
