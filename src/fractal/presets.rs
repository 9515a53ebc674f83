use num_complex::Complex64;

use crate::fractal::math::Affine;
use crate::fractal::variation::{VariationKind::*, WeightedVariation};
use crate::fractal::{
    AffineMap, FlameSystem, FlameTransform, FractalSystem, IfsSystem, MobiusMap, MobiusSystem,
    Rgb,
};

pub const FIRE: [Rgb; 5] = [
    [0.02, 0.00, 0.00],
    [0.45, 0.04, 0.02],
    [0.92, 0.30, 0.04],
    [1.00, 0.72, 0.18],
    [1.00, 0.96, 0.80],
];

pub const OCEAN: [Rgb; 4] = [
    [0.00, 0.05, 0.15],
    [0.00, 0.35, 0.55],
    [0.20, 0.80, 0.85],
    [0.90, 1.00, 0.95],
];

pub const NEON: [Rgb; 6] = [
    [0.95, 0.10, 0.60],
    [0.55, 0.10, 0.95],
    [0.10, 0.45, 1.00],
    [0.10, 0.95, 0.80],
    [0.80, 1.00, 0.20],
    [0.95, 0.10, 0.60],
];

fn wv(kind: crate::fractal::VariationKind, weight: f64) -> WeightedVariation {
    WeightedVariation::new(kind, weight)
}

fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

pub fn sierpinski() -> IfsSystem {
    let m = [0.5, 0.0, 0.0, 0.5];
    let p = 1.0 / 3.0;
    IfsSystem::new(
        "Sierpinski Triangle",
        vec![
            AffineMap::new(m, [-0.4, -0.4], p),
            AffineMap::new(m, [0.4, -0.4], p),
            AffineMap::new(m, [0.0, 0.4], p),
        ],
    )
}

pub fn barnsley_fern() -> IfsSystem {
    IfsSystem::new(
        "Barnsley Fern",
        vec![
            AffineMap::new([0.0, 0.0, 0.0, 0.16], [0.0, 0.0], 0.01),
            AffineMap::new([0.85, 0.04, -0.04, 0.85], [0.0, 1.6], 0.85),
            AffineMap::new([0.2, -0.26, 0.23, 0.22], [0.0, 1.6], 0.07),
            AffineMap::new([-0.15, 0.28, 0.26, 0.24], [0.0, 0.44], 0.07),
        ],
    )
    .with_view(0.2, [0.0, 0.0])
}

pub fn heighway_dragon() -> IfsSystem {
    IfsSystem::new(
        "Heighway Dragon",
        vec![
            AffineMap::new([0.5, -0.5, 0.5, 0.5], [0.0, 0.0], 0.5),
            AffineMap::new([-0.5, -0.5, 0.5, -0.5], [1.0, 0.0], 0.5),
        ],
    )
    .with_view(1.2, [0.42, -0.17])
}

pub fn maple_leaf() -> IfsSystem {
    IfsSystem::new(
        "Maple Leaf",
        vec![
            AffineMap::new([0.14, 0.01, 0.0, 0.51], [-0.08, -1.31], 0.10),
            AffineMap::new([0.43, 0.52, -0.45, 0.50], [1.49, -0.75], 0.35),
            AffineMap::new([0.45, -0.49, 0.47, 0.47], [-1.62, -0.74], 0.35),
            AffineMap::new([0.49, 0.0, 0.0, 0.51], [0.02, 1.62], 0.20),
        ],
    )
    .with_view(0.3, [0.0, 0.2])
}

pub fn levy_c() -> IfsSystem {
    IfsSystem::new(
        "Levy C Curve",
        vec![
            AffineMap::new([0.5, -0.5, 0.5, 0.5], [0.0, 0.0], 0.5),
            AffineMap::new([0.5, 0.5, -0.5, 0.5], [0.5, 0.5], 0.5),
        ],
    )
    .with_view(1.1, [0.5, 0.25])
}

pub fn chromatic_carpet() -> IfsSystem {
    let m = [1.0 / 3.0, 0.0, 0.0, 1.0 / 3.0];
    let k = 2.0 / 3.0;
    let offsets = [
        [-k, -k],
        [0.0, -k],
        [k, -k],
        [-k, 0.0],
        [k, 0.0],
        [-k, k],
        [0.0, k],
        [k, k],
    ];
    let maps = offsets
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let hue = i as f64 / offsets.len() as f64;
            AffineMap::new(m, *t, 1.0 / offsets.len() as f64).with_color(hue_color(hue))
        })
        .collect();
    IfsSystem::new("Chromatic Carpet", maps).with_view(0.95, [0.0, 0.0])
}

fn hue_color(h: f64) -> Rgb {
    let tau = std::f64::consts::TAU;
    [
        0.5 + 0.5 * (tau * h).cos(),
        0.5 + 0.5 * (tau * (h - 1.0 / 3.0)).cos(),
        0.5 + 0.5 * (tau * (h - 2.0 / 3.0)).cos(),
    ]
}

pub fn swirl_bloom() -> FlameSystem {
    FlameSystem::new(
        "Swirl Bloom",
        vec![
            FlameTransform::new(
                Affine::new(0.56, -0.2, 0.2, 0.56, -0.3, 0.1),
                vec![wv(Swirl, 0.7), wv(Linear, 0.3)],
                0.40,
                0.0,
            ),
            FlameTransform::new(
                Affine::new(0.45, 0.3, -0.3, 0.45, 0.4, -0.2),
                vec![wv(Spherical, 0.5), wv(Julia, 0.5)],
                0.35,
                0.5,
            ),
            FlameTransform::new(
                Affine::new(0.3, 0.0, 0.0, 0.3, 0.0, 0.6),
                vec![wv(Linear, 1.0)],
                0.25,
                1.0,
            ),
        ],
    )
    .with_palette(FIRE.to_vec())
    .with_view(0.9, [0.0, 0.1])
}

pub fn julia_spiral() -> FlameSystem {
    FlameSystem::new(
        "Julia Spiral",
        vec![
            FlameTransform::new(
                Affine::new(0.8, -0.35, 0.35, 0.8, 0.0, 0.0),
                vec![wv(Julia, 1.0)],
                0.5,
                0.2,
            ),
            FlameTransform::new(
                Affine::new(0.4, 0.0, 0.0, 0.4, 0.5, 0.2),
                vec![wv(Spiral, 0.6), wv(Linear, 0.4)],
                0.5,
                0.9,
            )
            .with_color_speed(0.7),
        ],
    )
    .with_final(FlameTransform::new(
        Affine::IDENTITY,
        vec![wv(Bubble, 1.0)],
        1.0,
        0.5,
    )
    .with_color_speed(0.0))
    .with_palette(OCEAN.to_vec())
    .with_rotate(0.3)
    .with_view(0.55, [0.0, 0.0])
}

pub fn waves_silk() -> FlameSystem {
    FlameSystem::new(
        "Waves Silk",
        vec![
            FlameTransform::new(
                Affine::new(0.6, 0.1, -0.1, 0.6, 0.2, 0.0),
                vec![
                    wv(Waves, 0.8)
                        .with_param("b", 0.3)
                        .with_param("c", 0.8)
                        .with_param("e", 0.2)
                        .with_param("f", 0.6),
                    wv(Linear, 0.2),
                ],
                0.45,
                0.1,
            ),
            FlameTransform::new(
                Affine::new(0.5, -0.4, 0.4, 0.5, -0.3, 0.2),
                vec![wv(Sinusoidal, 1.0)],
                0.35,
                0.6,
            ),
            FlameTransform::new(
                Affine::new(0.35, 0.0, 0.0, -0.35, 0.0, -0.4),
                vec![wv(Heart, 0.5), wv(Disc, 0.5)],
                0.20,
                0.95,
            )
            .with_post(Affine::new(0.9, -0.1, 0.1, 0.9, 0.0, 0.0)),
        ],
    )
    .with_palette(NEON.to_vec())
    .with_view(0.8, [0.0, 0.0])
}

pub fn pdj_lace() -> FlameSystem {
    FlameSystem::new(
        "PDJ Lace",
        vec![
            FlameTransform::new(
                Affine::new(0.7, 0.0, 0.0, 0.7, 0.0, 0.0),
                vec![wv(Pdj, 0.6), wv(Linear, 0.4)],
                0.6,
                0.3,
            ),
            FlameTransform::new(
                Affine::new(0.25, -0.4, 0.4, 0.25, 0.3, 0.3),
                vec![wv(Eyefish, 0.7), wv(Curl, 0.3).with_param("c1", 0.3)],
                0.4,
                0.8,
            ),
        ],
    )
    .with_palette(vec![
        [0.08, 0.02, 0.12],
        [0.35, 0.10, 0.55],
        [0.90, 0.55, 0.95],
    ])
    .with_view(0.5, [0.0, 0.0])
}

pub fn mobius_spiral() -> MobiusSystem {
    MobiusSystem::new(
        "Mobius Spiral",
        vec![
            MobiusMap::new(c(0.6, 0.4), c(0.1, 0.0), c(0.0, 0.2), c(1.0, 0.0), 0.5)
                .with_color([0.95, 0.55, 0.20]),
            MobiusMap::new(c(0.5, -0.3), c(-0.3, 0.2), c(0.1, 0.0), c(1.0, 0.1), 0.5)
                .with_color([0.25, 0.60, 0.95]),
        ],
    )
    .with_view(0.9, [0.0, 0.0])
}

pub fn kleinian_dust() -> MobiusSystem {
    MobiusSystem::new(
        "Kleinian Dust",
        vec![
            MobiusMap::new(c(0.4, 0.0), c(0.5, 0.0), c(-0.2, 0.1), c(1.0, 0.0), 1.0 / 3.0),
            MobiusMap::new(c(0.4, 0.0), c(-0.25, 0.43), c(0.1, -0.2), c(1.0, 0.0), 1.0 / 3.0),
            MobiusMap::new(c(0.4, 0.0), c(-0.25, -0.43), c(0.1, 0.2), c(1.0, 0.0), 1.0 / 3.0),
        ],
    )
    .with_view(1.0, [0.0, 0.0])
}

pub fn make_presets() -> Vec<FractalSystem> {
    vec![
        sierpinski().into(),
        barnsley_fern().into(),
        heighway_dragon().into(),
        maple_leaf().into(),
        levy_c().into(),
        chromatic_carpet().into(),
        swirl_bloom().into(),
        julia_spiral().into(),
        waves_silk().into(),
        pdj_lace().into(),
        mobius_spiral().into(),
        kleinian_dust().into(),
    ]
}

/// Resolve `query` as a preset index first, then as a case-insensitive name substring.
pub fn find_preset(presets: &[FractalSystem], query: &str) -> Option<usize> {
    let q = query.trim();
    if q.is_empty() {
        return None;
    }
    if let Ok(idx) = q.parse::<usize>() {
        return (idx < presets.len()).then_some(idx);
    }
    let needle = q.to_ascii_lowercase();
    presets
        .iter()
        .position(|p| p.name().to_ascii_lowercase().contains(&needle))
}
