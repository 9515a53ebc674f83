//! Chaos-game samplers.
//!
//! Each sampler is a self-contained call: seed a random point in `[-1,1]²`, iterate `burn_in`
//! times without emitting, then emit up to `count` points into a fresh buffer. Nothing survives
//! between calls except what the caller keeps.

use num_complex::Complex64;

use crate::fractal::math::{self, rotate2};
use crate::fractal::variation::apply_variations;
use crate::fractal::{
    FlameSystem, FlameTransform, FractalSystem, IfsSystem, MobiusSystem, Rgb, WHITE, Weighted,
};

pub const IFS_BURN_IN: usize = 100;
pub const MOBIUS_BURN_IN: usize = 100;
pub const FLAME_BURN_IN: usize = 20;

/// Flame orbits beyond this radius are treated as diverged.
pub const FLAME_ESCAPE_RADIUS: f64 = 100.0;
/// Möbius orbits beyond this radius are pulled back to [`MOBIUS_RESCALE_TARGET`].
pub const MOBIUS_RESCALE_RADIUS: f64 = 10.0;
pub const MOBIUS_RESCALE_TARGET: f64 = 2.0;

/// Upper bound on flame iterations per requested point.
const FLAME_ATTEMPT_FACTOR: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampledPoint {
    pub x: f64,
    pub y: f64,
    pub color: Option<Rgb>,
}

/// Cumulative-probability scan. A draw that falls past the last cumulative value (rounding, or
/// probabilities summing below 1) selects the last item.
pub fn select_index<T: Weighted>(items: &[T], r: f64) -> usize {
    let mut acc = 0.0;
    for (i, item) in items.iter().enumerate() {
        acc += item.probability();
        if r < acc {
            return i;
        }
    }
    items.len().saturating_sub(1)
}

#[inline]
fn seed_point(rng: &mut fastrand::Rng) -> (f64, f64) {
    (rng.f64() * 2.0 - 1.0, rng.f64() * 2.0 - 1.0)
}

/// Control point at `u ∈ [0,1]` with linear interpolation and no wrap.
pub fn palette_at(palette: &[Rgb], u: f64) -> Rgb {
    match palette.len() {
        0 => WHITE,
        1 => palette[0],
        n => {
            let pos = u.clamp(0.0, 1.0) * (n - 1) as f64;
            let i = (pos.floor() as usize).min(n - 1);
            let j = (i + 1).min(n - 1);
            let f = pos - i as f64;
            let (a, b) = (palette[i], palette[j]);
            [
                math::lerp(a[0], b[0], f),
                math::lerp(a[1], b[1], f),
                math::lerp(a[2], b[2], f),
            ]
        }
    }
}

/// Palette lookup by colour index. The index wraps into `[0,1)` first, so `1.0` reads the first
/// control point again.
pub fn sample_palette(palette: &[Rgb], index: f64) -> Rgb {
    let mut u = if index.is_finite() { index.rem_euclid(1.0) } else { 0.0 };
    if u >= 1.0 {
        u = 0.0;
    }
    palette_at(palette, u)
}

pub fn sample_ifs(
    system: &IfsSystem,
    count: usize,
    burn_in: usize,
    rng: &mut fastrand::Rng,
) -> Vec<SampledPoint> {
    let mut out = Vec::with_capacity(count);
    if system.maps.is_empty() {
        return out;
    }

    let (mut x, mut y) = seed_point(rng);
    for _ in 0..burn_in {
        let map = &system.maps[select_index(&system.maps, rng.f64())];
        (x, y) = map.affine().apply(x, y);
    }

    for _ in 0..count {
        let map = &system.maps[select_index(&system.maps, rng.f64())];
        (x, y) = map.affine().apply(x, y);
        if !x.is_finite() || !y.is_finite() {
            (x, y) = seed_point(rng);
            continue;
        }
        out.push(SampledPoint {
            x,
            y,
            color: map.color,
        });
    }
    out
}

pub fn sample_mobius(
    system: &MobiusSystem,
    count: usize,
    burn_in: usize,
    rng: &mut fastrand::Rng,
) -> Vec<SampledPoint> {
    let mut out = Vec::with_capacity(count);
    if system.maps.is_empty() {
        return out;
    }

    let seed = |rng: &mut fastrand::Rng| {
        let (x, y) = seed_point(rng);
        Complex64::new(x, y)
    };

    let mut z = seed(rng);
    let total = burn_in.saturating_add(count);
    for step in 0..total {
        let map = &system.maps[select_index(&system.maps, rng.f64())];
        z = map.apply(z);
        let mag = z.norm();
        if mag > MOBIUS_RESCALE_RADIUS {
            z = z / mag * MOBIUS_RESCALE_TARGET;
        }
        if !z.re.is_finite() || !z.im.is_finite() {
            // Dropped, not emitted; the orbit restarts from a fresh seed.
            z = seed(rng);
            continue;
        }
        if step < burn_in {
            continue;
        }
        out.push(SampledPoint {
            x: z.re,
            y: z.im,
            color: map.color,
        });
    }
    out
}

#[inline]
fn diverged(x: f64, y: f64) -> bool {
    !x.is_finite() || !y.is_finite() || (x * x + y * y).sqrt() > FLAME_ESCAPE_RADIUS
}

/// Pre-affine, weighted variation sum, then the optional post-affine.
#[inline]
pub fn flame_step(xf: &FlameTransform, x: f64, y: f64, rng: &mut fastrand::Rng) -> (f64, f64) {
    let (ax, ay) = xf.coefs.apply(x, y);
    let (vx, vy) = apply_variations(&xf.variations, ax, ay, rng);
    match &xf.post {
        Some(post) => post.apply(vx, vy),
        None => (vx, vy),
    }
}

#[inline]
fn blend_color_index(xf: &FlameTransform, prev: f64) -> f64 {
    xf.color_index * xf.color_speed + (1.0 - xf.color_speed) * prev
}

/// Flame sampler. Emits exactly `count` points unless the system diverges on nearly every
/// step, in which case it stops after a bounded number of attempts.
pub fn sample_flame(
    system: &FlameSystem,
    count: usize,
    burn_in: usize,
    rng: &mut fastrand::Rng,
) -> Vec<SampledPoint> {
    let mut out = Vec::with_capacity(count);
    if system.transforms.is_empty() || count == 0 {
        return out;
    }

    let (mut x, mut y) = seed_point(rng);
    let mut ci = rng.f64();
    let mut burned = 0usize;
    let max_steps = burn_in.saturating_add(count.saturating_mul(FLAME_ATTEMPT_FACTOR));
    let mut steps = 0usize;

    while out.len() < count && steps < max_steps {
        steps += 1;
        let xf = &system.transforms[select_index(&system.transforms, rng.f64())];
        let (nx, ny) = flame_step(xf, x, y, rng);
        if diverged(nx, ny) {
            (x, y) = seed_point(rng);
            continue;
        }
        (x, y) = (nx, ny);
        ci = blend_color_index(xf, ci);

        if burned < burn_in {
            burned += 1;
            continue;
        }

        let (mut px, mut py, mut pci) = (x, y, ci);
        if let Some(fin) = &system.final_transform {
            let (fx, fy) = flame_step(fin, x, y, rng);
            if diverged(fx, fy) {
                (x, y) = seed_point(rng);
                continue;
            }
            (px, py) = (fx, fy);
            pci = blend_color_index(fin, ci);
        }

        let (rx, ry) = rotate2(px, py, system.rotate);
        out.push(SampledPoint {
            x: rx,
            y: ry,
            color: Some(sample_palette(&system.palette, pci)),
        });
    }

    if out.len() < count {
        tracing::warn!(
            system = %system.name,
            requested = count,
            emitted = out.len(),
            "flame orbit kept diverging; batch truncated"
        );
    }
    out
}

/// Flat upload buffers for one frame: `positions` holds x,y pairs and `colors` r,g,b triples.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointBatch {
    pub positions: Vec<f32>,
    pub colors: Vec<f32>,
}

impl PointBatch {
    pub fn with_capacity(points: usize) -> Self {
        Self {
            positions: Vec::with_capacity(points * 2),
            colors: Vec::with_capacity(points * 3),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn clear(&mut self) {
        self.positions.clear();
        self.colors.clear();
    }

    pub fn position(&self, i: usize) -> (f32, f32) {
        (self.positions[i * 2], self.positions[i * 2 + 1])
    }

    pub fn color(&self, i: usize) -> [f32; 3] {
        [self.colors[i * 3], self.colors[i * 3 + 1], self.colors[i * 3 + 2]]
    }

    fn extend_normalized(&mut self, points: &[SampledPoint], scale: f64, center: [f64; 2]) {
        for p in points {
            let nx = ((p.x - center[0]) * scale) as f32;
            let ny = ((p.y - center[1]) * scale) as f32;
            if !nx.is_finite() || !ny.is_finite() {
                continue;
            }
            let c = p.color.unwrap_or(WHITE);
            self.positions.extend_from_slice(&[nx, ny]);
            self.colors
                .extend_from_slice(&[c[0] as f32, c[1] as f32, c[2] as f32]);
        }
    }
}

pub fn generate_ifs_point_batch(system: &IfsSystem, count: usize, rng: &mut fastrand::Rng) -> PointBatch {
    let mut batch = PointBatch::with_capacity(count);
    let points = sample_ifs(system, count, IFS_BURN_IN, rng);
    batch.extend_normalized(&points, system.scale, system.center);
    batch
}

pub fn generate_mobius_point_batch(
    system: &MobiusSystem,
    count: usize,
    rng: &mut fastrand::Rng,
) -> PointBatch {
    let mut batch = PointBatch::with_capacity(count);
    let points = sample_mobius(system, count, MOBIUS_BURN_IN, rng);
    batch.extend_normalized(&points, system.scale, system.center);
    batch
}

pub fn generate_flame_point_batch(
    system: &FlameSystem,
    count: usize,
    rng: &mut fastrand::Rng,
) -> PointBatch {
    let mut batch = PointBatch::with_capacity(count);
    let points = sample_flame(system, count, FLAME_BURN_IN, rng);
    batch.extend_normalized(&points, system.scale, system.center);
    batch
}

/// Refill `batch` in place with up to `count` points for `system`.
pub fn fill_point_batch(
    system: &FractalSystem,
    count: usize,
    rng: &mut fastrand::Rng,
    batch: &mut PointBatch,
) {
    batch.clear();
    let (scale, center) = system.view();
    let points = match system {
        FractalSystem::Ifs(s) => sample_ifs(s, count, IFS_BURN_IN, rng),
        FractalSystem::Flame(s) => sample_flame(s, count, FLAME_BURN_IN, rng),
        FractalSystem::Mobius(s) => sample_mobius(s, count, MOBIUS_BURN_IN, rng),
    };
    batch.extend_normalized(&points, scale, center);
}

pub fn generate_point_batch(system: &FractalSystem, count: usize, rng: &mut fastrand::Rng) -> PointBatch {
    let mut batch = PointBatch::with_capacity(count);
    fill_point_batch(system, count, rng, &mut batch);
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fractal::AffineMap;

    #[test]
    fn zero_probabilities_fall_through_to_last_map() {
        let maps = vec![
            AffineMap::new([1.0, 0.0, 0.0, 1.0], [0.0, 0.0], 0.0),
            AffineMap::new([1.0, 0.0, 0.0, 1.0], [0.0, 0.0], 0.0),
            AffineMap::new([1.0, 0.0, 0.0, 1.0], [0.0, 0.0], 0.0),
        ];
        assert_eq!(select_index(&maps, 0.0), 2);
        assert_eq!(select_index(&maps, 0.99), 2);
    }

    #[test]
    fn single_color_palette_is_constant() {
        let pal = [[0.2, 0.4, 0.6]];
        assert_eq!(sample_palette(&pal, 0.37), [0.2, 0.4, 0.6]);
        assert_eq!(sample_palette(&[], 0.5), WHITE);
    }

    #[test]
    fn negative_index_wraps_instead_of_clamping() {
        let pal = [[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]];
        let c = sample_palette(&pal, -0.25);
        assert!((c[0] - 0.75).abs() < 1e-12);
    }
}
