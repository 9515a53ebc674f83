//! Cross-fading between two systems.
//!
//! `morph(a, b, t)` builds a new synthetic system. Systems with different map counts are padded
//! by repeating their last map, probabilities are renormalised, and flame variations are unioned
//! by kind.

use std::collections::BTreeSet;

use crate::fractal::math::{lerp, lerp_complex, Affine};
use crate::fractal::sampler::palette_at;
use crate::fractal::variation::{VariationKind, VariationParams, WeightedVariation};
use crate::fractal::{
    AffineMap, FlameSystem, FlameTransform, FractalSystem, IfsSystem, MobiusMap, MobiusSystem,
    Rgb,
};

/// Variations whose interpolated weight falls below this are dropped.
pub const MIN_VARIATION_WEIGHT: f64 = 0.001;

pub fn morph_name(a: &str, b: &str) -> String {
    format!("{a} → {b}")
}

fn clamp_t(t: f64) -> f64 {
    if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 }
}

/// Item `i`, or the last item when the list is shorter.
fn paired<T>(items: &[T], i: usize) -> Option<&T> {
    items.get(i).or_else(|| items.last())
}

fn lerp_rgb(a: Rgb, b: Rgb, t: f64) -> Rgb {
    [lerp(a[0], b[0], t), lerp(a[1], b[1], t), lerp(a[2], b[2], t)]
}

fn lerp_color(a: Option<Rgb>, b: Option<Rgb>, t: f64) -> Option<Rgb> {
    match (a, b) {
        (Some(a), Some(b)) => Some(lerp_rgb(a, b, t)),
        _ => None,
    }
}

fn lerp_center(a: [f64; 2], b: [f64; 2], t: f64) -> [f64; 2] {
    [lerp(a[0], b[0], t), lerp(a[1], b[1], t)]
}

/// Rescale so the probabilities sum to exactly 1. A zero or non-finite total becomes uniform.
pub fn renormalize(probabilities: &mut [f64]) {
    if probabilities.is_empty() {
        return;
    }
    let sum: f64 = probabilities.iter().sum();
    if sum > 0.0 && sum.is_finite() {
        for p in probabilities.iter_mut() {
            *p /= sum;
        }
    } else {
        let uniform = 1.0 / probabilities.len() as f64;
        probabilities.fill(uniform);
    }
}

fn renormalize_maps<T>(maps: &mut [T], prob: impl Fn(&mut T) -> &mut f64) {
    let mut probs: Vec<f64> = maps.iter_mut().map(|m| *prob(m)).collect();
    renormalize(&mut probs);
    for (m, p) in maps.iter_mut().zip(probs) {
        *prob(m) = p;
    }
}

pub fn morph_ifs(a: &IfsSystem, b: &IfsSystem, t: f64) -> IfsSystem {
    let t = clamp_t(t);
    let name = morph_name(&a.name, &b.name);

    // The endpoints keep their own cardinality; padding only exists strictly between them.
    if t <= 0.0 || t >= 1.0 {
        let src = if t <= 0.0 { a } else { b };
        let mut out = src.clone();
        out.name = name;
        renormalize_maps(&mut out.maps, |m| &mut m.probability);
        return out;
    }

    let n = a.maps.len().max(b.maps.len());
    let mut maps = Vec::with_capacity(n);
    for i in 0..n {
        let (Some(ma), Some(mb)) = (paired(&a.maps, i), paired(&b.maps, i)) else {
            continue;
        };
        let mut matrix = [0.0; 4];
        for k in 0..4 {
            matrix[k] = lerp(ma.matrix[k], mb.matrix[k], t);
        }
        let translation = [
            lerp(ma.translation[0], mb.translation[0], t),
            lerp(ma.translation[1], mb.translation[1], t),
        ];
        maps.push(AffineMap {
            matrix,
            translation,
            probability: lerp(ma.probability, mb.probability, t),
            color: lerp_color(ma.color, mb.color, t),
        });
    }
    renormalize_maps(&mut maps, |m| &mut m.probability);

    IfsSystem {
        name,
        maps,
        scale: lerp(a.scale, b.scale, t),
        center: lerp_center(a.center, b.center, t),
    }
    .normalized()
}

pub fn morph_mobius(a: &MobiusSystem, b: &MobiusSystem, t: f64) -> MobiusSystem {
    let t = clamp_t(t);
    let name = morph_name(&a.name, &b.name);

    if t <= 0.0 || t >= 1.0 {
        let src = if t <= 0.0 { a } else { b };
        let mut out = src.clone();
        out.name = name;
        renormalize_maps(&mut out.maps, |m| &mut m.probability);
        return out;
    }

    let n = a.maps.len().max(b.maps.len());
    let mut maps = Vec::with_capacity(n);
    for i in 0..n {
        let (Some(ma), Some(mb)) = (paired(&a.maps, i), paired(&b.maps, i)) else {
            continue;
        };
        maps.push(MobiusMap {
            a: lerp_complex(ma.a, mb.a, t),
            b: lerp_complex(ma.b, mb.b, t),
            c: lerp_complex(ma.c, mb.c, t),
            d: lerp_complex(ma.d, mb.d, t),
            probability: lerp(ma.probability, mb.probability, t),
            color: lerp_color(ma.color, mb.color, t),
        });
    }
    renormalize_maps(&mut maps, |m| &mut m.probability);

    MobiusSystem {
        name,
        maps,
        scale: lerp(a.scale, b.scale, t),
        center: lerp_center(a.center, b.center, t),
    }
    .normalized()
}

fn find_variation(list: &[WeightedVariation], kind: VariationKind) -> Option<&WeightedVariation> {
    list.iter().find(|v| v.kind == kind)
}

fn lerp_params(
    a: Option<&VariationParams>,
    b: Option<&VariationParams>,
    t: f64,
) -> VariationParams {
    let mut keys = BTreeSet::new();
    for params in [a, b].into_iter().flatten() {
        keys.extend(params.keys().cloned());
    }
    let mut out = VariationParams::new();
    for key in keys {
        // A side that does not set a parameter contributes 0.
        let read = |p: Option<&VariationParams>| p.and_then(|p| p.get(&key).copied()).unwrap_or(0.0);
        out.insert(key.clone(), lerp(read(a), read(b), t));
    }
    out
}

/// Union of both variation lists by kind, weights lerped with an absent side read as 0.
pub fn morph_variations(
    a: &[WeightedVariation],
    b: &[WeightedVariation],
    t: f64,
) -> Vec<WeightedVariation> {
    let mut kinds: Vec<VariationKind> = Vec::with_capacity(a.len() + b.len());
    for v in a.iter().chain(b.iter()) {
        if !kinds.contains(&v.kind) {
            kinds.push(v.kind);
        }
    }

    let mut out = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let va = find_variation(a, kind);
        let vb = find_variation(b, kind);
        let weight = lerp(
            va.map_or(0.0, |v| v.weight),
            vb.map_or(0.0, |v| v.weight),
            t,
        );
        if weight.abs() < MIN_VARIATION_WEIGHT {
            continue;
        }
        out.push(WeightedVariation {
            kind,
            weight,
            params: lerp_params(va.map(|v| &v.params), vb.map(|v| &v.params), t),
        });
    }
    out
}

pub fn morph_transform(a: &FlameTransform, b: &FlameTransform, t: f64) -> FlameTransform {
    let post = match (&a.post, &b.post) {
        (None, None) => None,
        (pa, pb) => {
            let pa = pa.unwrap_or(Affine::IDENTITY);
            let pb = pb.unwrap_or(Affine::IDENTITY);
            Some(pa.lerp(&pb, t))
        }
    };
    FlameTransform {
        coefs: a.coefs.lerp(&b.coefs, t),
        post,
        variations: morph_variations(&a.variations, &b.variations, t),
        probability: lerp(a.probability, b.probability, t),
        color_index: lerp(a.color_index, b.color_index, t),
        color_speed: lerp(a.color_speed, b.color_speed, t),
    }
    .normalized()
}

/// Resample both palettes to the longer length in their own spacing, then cross-fade.
pub fn morph_palette(a: &[Rgb], b: &[Rgb], t: f64) -> Vec<Rgb> {
    let n = a.len().max(b.len());
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|k| {
            let u = if n > 1 { k as f64 / (n - 1) as f64 } else { 0.0 };
            lerp_rgb(palette_at(a, u), palette_at(b, u), t)
        })
        .collect()
}

pub fn morph_flame(a: &FlameSystem, b: &FlameSystem, t: f64) -> FlameSystem {
    let t = clamp_t(t);
    let name = morph_name(&a.name, &b.name);

    if t <= 0.0 || t >= 1.0 {
        let src = if t <= 0.0 { a } else { b };
        let mut out = src.clone();
        out.name = name;
        renormalize_maps(&mut out.transforms, |x| &mut x.probability);
        return out;
    }

    let n = a.transforms.len().max(b.transforms.len());
    let mut transforms = Vec::with_capacity(n);
    for i in 0..n {
        let (Some(xa), Some(xb)) = (paired(&a.transforms, i), paired(&b.transforms, i)) else {
            continue;
        };
        transforms.push(morph_transform(xa, xb, t));
    }
    renormalize_maps(&mut transforms, |x| &mut x.probability);

    let final_transform = match (&a.final_transform, &b.final_transform) {
        (None, None) => None,
        (fa, fb) => {
            let fa = fa.clone().unwrap_or_else(FlameTransform::identity);
            let fb = fb.clone().unwrap_or_else(FlameTransform::identity);
            Some(morph_transform(&fa, &fb, t))
        }
    };

    FlameSystem {
        name,
        transforms,
        final_transform,
        scale: lerp(a.scale, b.scale, t),
        center: lerp_center(a.center, b.center, t),
        rotate: lerp(a.rotate, b.rotate, t),
        palette: morph_palette(&a.palette, &b.palette, t),
    }
    .normalized()
}

/// Morph two systems of any kind. Systems of different kinds cannot be interpolated and snap
/// from `a` to `b` at the halfway point.
pub fn morph(a: &FractalSystem, b: &FractalSystem, t: f64) -> FractalSystem {
    let t = clamp_t(t);
    match (a, b) {
        (FractalSystem::Ifs(a), FractalSystem::Ifs(b)) => morph_ifs(a, b, t).into(),
        (FractalSystem::Flame(a), FractalSystem::Flame(b)) => morph_flame(a, b, t).into(),
        (FractalSystem::Mobius(a), FractalSystem::Mobius(b)) => morph_mobius(a, b, t).into(),
        _ => {
            if t < 0.5 {
                a.clone()
            } else {
                b.clone()
            }
        }
    }
}
