use std::str::FromStr;

use ifs_flame::fractal::variation::{apply_variations, variation, VariationKind, WeightedVariation};

fn rng() -> fastrand::Rng {
    fastrand::Rng::with_seed(36)
}

// ── Names ───────────────────────────────────────────────────────────────────

#[test]
fn every_kind_round_trips_through_its_name() {
    for kind in VariationKind::ALL {
        assert_eq!(VariationKind::from_str(kind.name()).ok(), Some(kind), "{}", kind.name());
    }
}

#[test]
fn names_are_unique() {
    let mut names: Vec<&str> = VariationKind::ALL.iter().map(|k| k.name()).collect();
    names.sort_unstable();
    names.dedup();
    assert_eq!(names.len(), VariationKind::ALL.len());
}

#[test]
fn unknown_name_is_rejected() {
    let err = VariationKind::from_str(" not-a-variation ").unwrap_err();
    assert_eq!(err.to_string(), "unknown variation: not-a-variation");
    let boxed: Box<dyn std::error::Error> = Box::new(err);
    assert!(boxed.source().is_none());
}

// ── Evaluation ──────────────────────────────────────────────────────────────

#[test]
fn linear_is_identity() {
    let mut r = rng();
    let params = Default::default();
    assert_eq!(variation(VariationKind::Linear, 0.4, -0.2, &params, &mut r), (0.4, -0.2));
}

#[test]
fn every_kind_is_finite_on_ordinary_input() {
    let mut r = rng();
    let params = Default::default();
    for kind in VariationKind::ALL {
        for &(x, y) in &[(0.3, 0.2), (-0.7, 0.5), (1.2, -0.9), (0.0, 0.0)] {
            let (vx, vy) = variation(kind, x, y, &params, &mut r);
            assert!(vx.is_finite() && vy.is_finite(), "{} at ({x}, {y})", kind.name());
        }
    }
}

#[test]
fn spherical_inverts_radius() {
    let mut r = rng();
    let params = Default::default();
    let (x, y) = variation(VariationKind::Spherical, 2.0, 0.0, &params, &mut r);
    assert!((x - 0.5).abs() < 1e-6);
    assert!(y.abs() < 1e-9);
}

#[test]
fn weighted_sum_scales_each_term() {
    let mut r = rng();
    let list = vec![
        WeightedVariation::new(VariationKind::Linear, 0.25),
        WeightedVariation::new(VariationKind::Linear, 0.5),
    ];
    let (x, y) = apply_variations(&list, 1.0, -2.0, &mut r);
    assert!((x - 0.75).abs() < 1e-12);
    assert!((y + 1.5).abs() < 1e-12);
}

#[test]
fn empty_list_is_plain_linear() {
    let mut r = rng();
    assert_eq!(apply_variations(&[], 0.1, 0.2, &mut r), (0.1, 0.2));
}

#[test]
fn missing_param_reads_default() {
    let v = WeightedVariation::new(VariationKind::Pdj, 1.0);
    for name in VariationKind::Pdj.param_names() {
        assert_eq!(v.param(name), VariationKind::Pdj.default_param(name));
    }
    let v = v.with_param("a", 2.5);
    assert_eq!(v.param("a"), 2.5);
}
