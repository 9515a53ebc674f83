//! Display pass: a pure function of `(uv, accumulation, time, config)`.
//!
//! `CpuSurface` calls these directly. `MetalSurface` carries the same formulas in MSL and
//! receives `DisplayParams` as its uniform block, so the field order here is the GPU layout.

use crate::visual::FrameConfig;

/// Pixels whose density stays below this show the background.
pub const DENSITY_THRESHOLD: f32 = 1e-4;
/// Floor for every background channel so an empty pixel is never literal black.
pub const MIN_BACKGROUND: f32 = 0.015;

const DEFAULT_KALEIDOSCOPE_SEGMENTS: f32 = 6.0;
const DEFAULT_BLOOM: f32 = 0.6;
const DEFAULT_ROTATION_SPEED: f32 = 0.2;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DisplayParams {
    pub texel: [f32; 2],
    pub time: f32,
    pub brightness: f32,

    pub color_low: [f32; 4],
    pub color_high: [f32; 4],
    pub background: [f32; 4],

    pub tunnel: f32,
    pub spiral: f32,
    pub wave: f32,
    pub radial_pulse: f32,
    pub ripple: f32,
    pub rotation: f32,
    pub kaleidoscope: f32,
    pub feedback_zoom: f32,
    pub noise_warp: f32,
    pub pixelate: f32,

    pub chromatic_aberration: f32,
    pub prism: f32,

    pub bloom: f32,
    pub edge_glow: f32,
    pub posterize: f32,
    pub hue_shift: f32,

    /// 1 when per-point colours were accumulated, 0 for monochrome density.
    pub colored: u32,
    pub _pad: [u32; 3],
}

fn rgb4(c: [f64; 3]) -> [f32; 4] {
    [c[0] as f32, c[1] as f32, c[2] as f32, 1.0]
}

impl DisplayParams {
    /// Resolve toggles into concrete effect amounts. A toggle left off is always neutral.
    pub fn from_config(config: &FrameConfig, colored: bool, w: usize, h: usize) -> Self {
        let fx = &config.effects;
        let on = &config.toggles;
        let time = config.time as f32;

        let kaleidoscope = if on.kaleidoscope {
            if fx.kaleidoscope_segments >= 2.0 {
                fx.kaleidoscope_segments
            } else {
                DEFAULT_KALEIDOSCOPE_SEGMENTS
            }
        } else {
            0.0
        };
        let bloom = if on.bloom {
            if fx.bloom_strength > 0.0 { fx.bloom_strength } else { DEFAULT_BLOOM }
        } else {
            0.0
        };
        let rotation = if on.rotation {
            let speed = if fx.rotation_speed != 0.0 {
                fx.rotation_speed
            } else {
                DEFAULT_ROTATION_SPEED
            };
            time * speed
        } else {
            0.0
        };

        Self {
            texel: [1.0 / w.max(1) as f32, 1.0 / h.max(1) as f32],
            time,
            brightness: config.brightness as f32,
            color_low: rgb4(config.color_low),
            color_high: rgb4(config.color_high),
            background: rgb4(config.background),
            tunnel: fx.tunnel,
            spiral: fx.spiral,
            wave: fx.wave,
            radial_pulse: fx.radial_pulse,
            ripple: fx.ripple,
            rotation,
            kaleidoscope,
            feedback_zoom: fx.feedback_zoom,
            noise_warp: fx.noise_warp,
            pixelate: fx.pixelate,
            chromatic_aberration: fx.chromatic_aberration,
            prism: fx.prism,
            bloom,
            edge_glow: fx.edge_glow,
            posterize: fx.posterize,
            hue_shift: fx.hue_shift,
            colored: u32::from(colored),
            _pad: [0; 3],
        }
    }
}

/// `log(1 + d·b) / log(1 + b)`, clamped to `[0, 1]`.
#[inline]
pub fn tonemap(density: f32, brightness: f32) -> f32 {
    let d = density.max(0.0);
    if !(brightness > 0.0) {
        return d.min(1.0);
    }
    ((d * brightness).ln_1p() / brightness.ln_1p()).clamp(0.0, 1.0)
}

#[inline]
fn mix(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
fn rot(p: [f32; 2], a: f32) -> [f32; 2] {
    let (s, c) = a.sin_cos();
    [c * p[0] - s * p[1], s * p[0] + c * p[1]]
}

fn fbm(mut p: [f32; 2]) -> f32 {
    let mut f = 0.0;
    let mut a = 0.5;
    for _ in 0..5 {
        f += a * (p[0].sin() * p[1].cos());
        p = rot([p[0] * 1.7, p[1] * 1.7], 1.2);
        a *= 0.55;
    }
    f
}

/// Geometric distortions applied in a fixed order. Every amount is neutral at 0.
pub fn distort_uv(uv: [f32; 2], p: &DisplayParams) -> [f32; 2] {
    let t = p.time;
    let mut c = [uv[0] - 0.5, uv[1] - 0.5];
    let len = |c: [f32; 2]| (c[0] * c[0] + c[1] * c[1]).sqrt();

    if p.tunnel != 0.0 {
        let r = len(c);
        let k = 1.0 / (1.0 + p.tunnel * (0.5 - r).max(0.0) * 2.0);
        c = [c[0] * k, c[1] * k];
    }
    if p.spiral != 0.0 {
        c = rot(c, p.spiral * len(c) * std::f32::consts::TAU);
    }
    if p.wave != 0.0 {
        let (x, y) = (c[0], c[1]);
        c[0] = x + p.wave * 0.05 * (y * 12.0 + t * 2.0).sin();
        c[1] = y + p.wave * 0.05 * (x * 12.0 + t * 1.7).sin();
    }
    if p.radial_pulse != 0.0 {
        let k = 1.0 + p.radial_pulse * 0.08 * (t * 3.0 - len(c) * 10.0).sin();
        c = [c[0] * k, c[1] * k];
    }
    if p.ripple != 0.0 {
        let r = len(c);
        if r > 1e-6 {
            let k = p.ripple * 0.02 * (r * 40.0 - t * 4.0).sin() / r;
            c = [c[0] + c[0] * k, c[1] + c[1] * k];
        }
    }
    if p.rotation != 0.0 {
        c = rot(c, p.rotation);
    }
    if p.kaleidoscope >= 2.0 {
        let r = len(c);
        let seg = std::f32::consts::TAU / p.kaleidoscope;
        let mut a = c[1].atan2(c[0]).rem_euclid(seg);
        if a > seg * 0.5 {
            a = seg - a;
        }
        c = [r * a.cos(), r * a.sin()];
    }
    if p.feedback_zoom != 0.0 {
        let k = 1.0 - p.feedback_zoom * 0.25 * (0.5 + 0.5 * (t * 0.5).sin());
        c = [c[0] * k, c[1] * k];
    }
    if p.noise_warp != 0.0 {
        let q = [c[0] * 4.0 + t * 0.3, c[1] * 4.0 - t * 0.2];
        let dx = fbm(q);
        let dy = fbm([q[0] + 5.2, q[1] + 1.3]);
        c = [c[0] + p.noise_warp * 0.05 * dx, c[1] + p.noise_warp * 0.05 * dy];
    }

    let mut out = [c[0] + 0.5, c[1] + 0.5];
    if p.pixelate > 0.0 {
        let cells = (1.0 / (p.pixelate * 0.02)).max(2.0);
        out = [
            ((out[0] * cells).floor() + 0.5) / cells,
            ((out[1] * cells).floor() + 0.5) / cells,
        ];
    }
    out
}

fn hue_rotate(rgb: [f32; 3], angle: f32) -> [f32; 3] {
    let y = 0.299 * rgb[0] + 0.587 * rgb[1] + 0.114 * rgb[2];
    let i = 0.596 * rgb[0] - 0.274 * rgb[1] - 0.322 * rgb[2];
    let q = 0.211 * rgb[0] - 0.523 * rgb[1] + 0.312 * rgb[2];
    let (s, c) = angle.sin_cos();
    let (i, q) = (i * c - q * s, i * s + q * c);
    [
        y + 0.956 * i + 0.621 * q,
        y - 0.272 * i - 0.647 * q,
        y - 1.106 * i + 1.703 * q,
    ]
}

/// Background for pixels nobody visited: the configured colour with a soft vignette and a slow
/// shimmer, floored per channel.
pub fn background_fill(uv: [f32; 2], p: &DisplayParams) -> [f32; 3] {
    let dx = uv[0] - 0.5;
    let dy = uv[1] - 0.5;
    let vignette = 1.0 - 0.35 * (dx * dx + dy * dy).sqrt();
    let shimmer = 1.0 + 0.05 * (p.time * 0.3 + uv[1] * 3.0).sin();
    let mut out = [0.0; 3];
    for (k, o) in out.iter_mut().enumerate() {
        *o = (p.background[k] * vignette * shimmer).max(MIN_BACKGROUND);
    }
    out
}

/// Shade one output pixel. `sample` reads the accumulation target as `[r, g, b, density]`
/// and must return zeros outside `[0, 1]²`.
pub fn shade_pixel(uv: [f32; 2], p: &DisplayParams, sample: impl Fn([f32; 2]) -> [f32; 4]) -> [f32; 3] {
    let duv = distort_uv(uv, p);
    let center = sample(duv);

    // Channel offsets: chromatic aberration splits radially, prism along three rotating axes.
    let mut offs = [[0.0f32; 2]; 3];
    if p.chromatic_aberration != 0.0 {
        let dir = [duv[0] - 0.5, duv[1] - 0.5];
        let k = p.chromatic_aberration * 0.02;
        offs[0] = [dir[0] * k, dir[1] * k];
        offs[2] = [-dir[0] * k, -dir[1] * k];
    }
    if p.prism != 0.0 {
        let k = p.prism * 0.004;
        for (i, o) in offs.iter_mut().enumerate() {
            let a = p.time * 0.5 + i as f32 * std::f32::consts::TAU / 3.0;
            o[0] += a.cos() * k;
            o[1] += a.sin() * k;
        }
    }
    let split = offs.iter().any(|o| o[0] != 0.0 || o[1] != 0.0);
    let channel = |i: usize| -> [f32; 4] {
        if split {
            sample([duv[0] + offs[i][0], duv[1] + offs[i][1]])
        } else {
            center
        }
    };
    let (sr, sg, sb) = (channel(0), channel(1), channel(2));

    let density = center[3].max(sr[3]).max(sg[3]).max(sb[3]);
    if density < DENSITY_THRESHOLD {
        return background_fill(uv, p);
    }

    let b = p.brightness;
    let mut rgb = if p.colored != 0 {
        [tonemap(sr[0], b), tonemap(sg[1], b), tonemap(sb[2], b)]
    } else {
        [
            mix(p.color_low[0], p.color_high[0], tonemap(sr[3], b)),
            mix(p.color_low[1], p.color_high[1], tonemap(sg[3], b)),
            mix(p.color_low[2], p.color_high[2], tonemap(sb[3], b)),
        ]
    };

    if p.bloom > 0.0 {
        let luma = 0.2126 * rgb[0] + 0.7152 * rgb[1] + 0.0722 * rgb[2];
        for c in &mut rgb {
            *c += p.bloom * *c * luma;
        }
    }
    if p.edge_glow > 0.0 {
        let d = |dx: f32, dy: f32| tonemap(sample([duv[0] + dx, duv[1] + dy])[3], b);
        let (tx, ty) = (p.texel[0], p.texel[1]);
        let grad = (d(tx, 0.0) - d(-tx, 0.0)).abs() + (d(0.0, ty) - d(0.0, -ty)).abs();
        for (k, c) in rgb.iter_mut().enumerate() {
            *c += p.edge_glow * grad * p.color_high[k];
        }
    }
    if p.posterize >= 2.0 {
        let n = p.posterize.floor() - 1.0;
        for c in &mut rgb {
            *c = (c.clamp(0.0, 1.0) * n).round() / n;
        }
    }
    if p.hue_shift != 0.0 {
        rgb = hue_rotate(rgb, p.hue_shift);
    }
    rgb.map(|c| c.clamp(0.0, 1.0))
}

#[inline]
pub fn to_rgba8(rgb: [f32; 3]) -> [u8; 4] {
    let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    [q(rgb[0]), q(rgb[1]), q(rgb[2]), 255]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tonemap_endpoints() {
        assert_eq!(tonemap(0.0, 4.0), 0.0);
        assert!((tonemap(1.0, 4.0) - 1.0).abs() < 1e-6);
        assert_eq!(tonemap(3.0, 0.0), 1.0);
    }

    #[test]
    fn neutral_params_leave_uv_alone() {
        let p = DisplayParams::default();
        let uv = [0.3, 0.8];
        let out = distort_uv(uv, &p);
        assert!((out[0] - uv[0]).abs() < 1e-6 && (out[1] - uv[1]).abs() < 1e-6);
    }
}
