use ifs_flame::fractal::math::Affine;
use ifs_flame::fractal::morph::{
    morph, morph_flame, morph_ifs, morph_name, morph_palette, morph_variations,
};
use ifs_flame::fractal::presets::{
    barnsley_fern, chromatic_carpet, julia_spiral, mobius_spiral, sierpinski, swirl_bloom,
    waves_silk,
};
use ifs_flame::fractal::variation::{VariationKind, WeightedVariation};
use ifs_flame::fractal::{AffineMap, FlameSystem, FlameTransform, FractalSystem, IfsSystem, SystemKind};

fn prob_sum(sys: &FractalSystem) -> f64 {
    match sys {
        FractalSystem::Ifs(s) => s.maps.iter().map(|m| m.probability).sum(),
        FractalSystem::Flame(s) => s.transforms.iter().map(|x| x.probability).sum(),
        FractalSystem::Mobius(s) => s.maps.iter().map(|m| m.probability).sum(),
    }
}

// ── Endpoints ───────────────────────────────────────────────────────────────

#[test]
fn t_zero_reproduces_source_maps() {
    let a = sierpinski();
    let b = barnsley_fern();
    let m = morph_ifs(&a, &b, 0.0);
    assert_eq!(m.maps.len(), a.maps.len());
    for (got, want) in m.maps.iter().zip(&a.maps) {
        assert_eq!(got.matrix, want.matrix);
        assert_eq!(got.translation, want.translation);
    }
    assert_eq!(m.scale, a.scale);
    assert_eq!(m.name, morph_name(&a.name, &b.name));
}

#[test]
fn t_one_reproduces_target_maps() {
    let a = sierpinski();
    let b = barnsley_fern();
    let m = morph_ifs(&a, &b, 1.0);
    assert_eq!(m.maps.len(), b.maps.len());
    for (got, want) in m.maps.iter().zip(&b.maps) {
        assert_eq!(got.matrix, want.matrix);
        assert_eq!(got.translation, want.translation);
    }
    assert_eq!(m.scale, b.scale);
}

#[test]
fn out_of_range_t_is_clamped() {
    let a = sierpinski();
    let b = barnsley_fern();
    assert_eq!(morph_ifs(&a, &b, -3.0).maps, morph_ifs(&a, &b, 0.0).maps);
    assert_eq!(morph_ifs(&a, &b, 7.0).maps, morph_ifs(&a, &b, 1.0).maps);
}

// ── IFS interpolation ───────────────────────────────────────────────────────

#[test]
fn probabilities_renormalise_at_every_t() {
    let a: FractalSystem = sierpinski().into();
    let b: FractalSystem = barnsley_fern().into();
    for i in 0..=10 {
        let m = morph(&a, &b, i as f64 / 10.0);
        assert!((prob_sum(&m) - 1.0).abs() < 1e-9, "t={}", i as f64 / 10.0);
    }
}

#[test]
fn shorter_side_is_padded_with_last_map() {
    let a = sierpinski();
    let b = barnsley_fern();
    let m = morph_ifs(&a, &b, 0.5);
    assert_eq!(m.maps.len(), 4);
    // Map 3 pairs sierpinski's last map with the fern's fourth.
    let last = &a.maps[2];
    let fourth = &b.maps[3];
    for k in 0..4 {
        let want = 0.5 * (last.matrix[k] + fourth.matrix[k]);
        assert!((m.maps[3].matrix[k] - want).abs() < 1e-12);
    }
}

#[test]
fn colour_survives_only_when_both_sides_have_one() {
    let carpet = chromatic_carpet();
    let plain = sierpinski();
    let m = morph_ifs(&carpet, &plain, 0.5);
    assert!(m.maps.iter().all(|map| map.color.is_none()));

    let recoloured = IfsSystem::new(
        "recoloured",
        carpet
            .maps
            .iter()
            .map(|map| AffineMap::new(map.matrix, map.translation, map.probability).with_color([0.0, 0.0, 0.0]))
            .collect(),
    );
    let m = morph_ifs(&carpet, &recoloured, 0.5);
    assert!(m.maps.iter().all(|map| map.color.is_some()));
    let c0 = carpet.maps[0].color.unwrap_or_default();
    let got = m.maps[0].color.unwrap_or_default();
    for k in 0..3 {
        assert!((got[k] - c0[k] * 0.5).abs() < 1e-12);
    }
}

// ── Flame interpolation ─────────────────────────────────────────────────────

#[test]
fn variations_union_by_kind() {
    let a = vec![WeightedVariation::new(VariationKind::Swirl, 1.0)];
    let b = vec![WeightedVariation::new(VariationKind::Julia, 0.8)];
    let mid = morph_variations(&a, &b, 0.5);
    assert_eq!(mid.len(), 2);
    assert!((mid[0].weight - 0.5).abs() < 1e-12);
    assert!((mid[1].weight - 0.4).abs() < 1e-12);
}

#[test]
fn faded_variation_is_dropped() {
    let a = vec![
        WeightedVariation::new(VariationKind::Linear, 1.0),
        WeightedVariation::new(VariationKind::Bubble, 0.001),
    ];
    let b = vec![WeightedVariation::new(VariationKind::Linear, 1.0)];
    let mid = morph_variations(&a, &b, 0.5);
    assert_eq!(mid.len(), 1);
    assert_eq!(mid[0].kind, VariationKind::Linear);
}

#[test]
fn absent_param_interpolates_from_zero() {
    let a = vec![WeightedVariation::new(VariationKind::Waves, 1.0).with_param("b", 2.0)];
    let b = vec![WeightedVariation::new(VariationKind::Waves, 1.0)];
    let mid = morph_variations(&a, &b, 0.5);
    assert_eq!(mid.len(), 1);
    assert!((mid[0].param("b") - 1.0).abs() < 1e-12);

    let quarter = morph_variations(&b, &a, 0.25);
    assert!((quarter[0].param("b") - 0.5).abs() < 1e-12);
}

#[test]
fn palette_takes_longer_length() {
    let a = vec![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]];
    let b = vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
    let p = morph_palette(&a, &b, 0.5);
    assert_eq!(p.len(), 3);
    // a resampled at u=0.5 is mid-grey, b's middle entry is green.
    assert!((p[1][0] - 0.25).abs() < 1e-12);
    assert!((p[1][1] - 0.75).abs() < 1e-12);
}

#[test]
fn missing_final_transform_blends_toward_identity() {
    let a = julia_spiral();
    let b = swirl_bloom();
    assert!(a.final_transform.is_some());
    assert!(b.final_transform.is_none());
    let m = morph_flame(&a, &b, 0.5);
    let fin = m.final_transform.as_ref().map(|f| f.coefs);
    let want = a.final_transform.as_ref().map(|f| f.coefs.lerp(&Affine::IDENTITY, 0.5));
    assert_eq!(fin, want);
    let kinds: Vec<(VariationKind, f64)> = m
        .final_transform
        .iter()
        .flat_map(|f| f.variations.iter().map(|v| (v.kind, v.weight)))
        .collect();
    assert_eq!(kinds, vec![(VariationKind::Bubble, 0.5), (VariationKind::Linear, 0.5)]);
}

#[test]
fn post_transform_defaults_to_identity() {
    let a = waves_silk();
    let b = FlameSystem::new(
        "plain",
        vec![FlameTransform::new(
            Affine::IDENTITY,
            vec![WeightedVariation::new(VariationKind::Linear, 1.0)],
            1.0,
            0.0,
        )],
    );
    let m = morph_flame(&a, &b, 0.5);
    let Some(post_a) = a.transforms.iter().find_map(|x| x.post) else {
        panic!("waves preset carries a post transform");
    };
    let idx = a.transforms.iter().position(|x| x.post.is_some()).unwrap_or(0);
    assert_eq!(m.transforms[idx].post, Some(post_a.lerp(&Affine::IDENTITY, 0.5)));
}

#[test]
fn flame_probabilities_sum_to_one() {
    let a: FractalSystem = swirl_bloom().into();
    let b: FractalSystem = julia_spiral().into();
    let m = morph(&a, &b, 0.37);
    assert_eq!(m.kind(), SystemKind::Flame);
    assert!((prob_sum(&m) - 1.0).abs() < 1e-9);
}

// ── Cross-kind ──────────────────────────────────────────────────────────────

#[test]
fn different_kinds_snap_at_halfway() {
    let a: FractalSystem = sierpinski().into();
    let b: FractalSystem = mobius_spiral().into();
    assert_eq!(morph(&a, &b, 0.49).kind(), SystemKind::Ifs);
    assert_eq!(morph(&a, &b, 0.5).kind(), SystemKind::Mobius);
}
