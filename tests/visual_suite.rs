use ifs_flame::fractal::presets::{chromatic_carpet, levy_c, sierpinski};
use ifs_flame::fractal::sampler::PointBatch;
use ifs_flame::fractal::FractalSystem;
use ifs_flame::visual::display::{shade_pixel, tonemap, DisplayParams, MIN_BACKGROUND};
use ifs_flame::visual::{
    points_for_frame, AccumulationPolicy, ClearReason, CpuSurface, FractalEngine, FrameConfig,
    MorphTarget, Scene, Surface, SurfaceError, Toggles, ViewTransform,
};

fn small_config() -> FrameConfig {
    FrameConfig {
        iterations: 4_000,
        ..FrameConfig::default()
    }
}

// ── Accumulation policy ─────────────────────────────────────────────────────

#[test]
fn first_frame_clears() {
    let mut policy = AccumulationPolicy::new();
    let cfg = FrameConfig::default();
    assert_eq!(policy.advance("a", &cfg).clear, Some(ClearReason::Initial));
    assert_eq!(policy.advance("a", &cfg).clear, None);
}

#[test]
fn system_change_forces_clear() {
    let mut policy = AccumulationPolicy::new();
    let cfg = FrameConfig::default();
    policy.advance("a", &cfg);
    assert_eq!(policy.advance("b", &cfg).clear, Some(ClearReason::SystemChanged));
    assert_eq!(policy.frames_since_clear(), 1);
}

#[test]
fn mode_toggle_forces_clear() {
    let mut policy = AccumulationPolicy::new();
    let mut cfg = FrameConfig::default();
    policy.advance("a", &cfg);
    cfg.toggles.trails = true;
    assert_eq!(policy.advance("a", &cfg).clear, Some(ClearReason::ModeChanged));
    cfg.toggles.trails = false;
    cfg.toggles.infinite_accumulation = true;
    assert_eq!(policy.advance("a", &cfg).clear, Some(ClearReason::ModeChanged));
}

#[test]
fn periodic_clear_after_interval() {
    let mut policy = AccumulationPolicy::new();
    let cfg = FrameConfig {
        clear_interval: 3,
        ..FrameConfig::default()
    };
    let clears: Vec<Option<ClearReason>> = (0..5).map(|_| policy.advance("a", &cfg).clear).collect();
    assert_eq!(
        clears,
        vec![Some(ClearReason::Initial), None, None, Some(ClearReason::Periodic), None]
    );
}

#[test]
fn infinite_accumulation_never_clears_periodically() {
    let mut policy = AccumulationPolicy::new();
    let mut cfg = FrameConfig {
        clear_interval: 2,
        ..FrameConfig::default()
    };
    cfg.toggles.infinite_accumulation = true;
    policy.advance("a", &cfg);
    for _ in 0..10 {
        assert_eq!(policy.advance("a", &cfg).clear, None);
    }
}

#[test]
fn trails_fade_instead_of_clearing() {
    let mut policy = AccumulationPolicy::new();
    let mut cfg = FrameConfig {
        clear_interval: 2,
        trail_decay: 0.8,
        ..FrameConfig::default()
    };
    cfg.toggles.trails = true;
    let first = policy.advance("a", &cfg);
    assert_eq!(first.clear, Some(ClearReason::Initial));
    assert_eq!(first.fade, None);
    for _ in 0..5 {
        let action = policy.advance("a", &cfg);
        assert_eq!(action.clear, None);
        assert_eq!(action.fade, Some(0.8));
    }
}

#[test]
fn view_changes_do_not_clear() {
    let mut policy = AccumulationPolicy::new();
    let mut cfg = FrameConfig::default();
    policy.advance("a", &cfg);
    cfg.zoom = 3.0;
    cfg.pan = [0.5, -0.2];
    cfg.iterations = 100;
    assert_eq!(policy.advance("a", &cfg).clear, None);
}

// ── Adaptive detail ─────────────────────────────────────────────────────────

#[test]
fn point_count_without_adaptive_detail_ignores_zoom() {
    let cfg = FrameConfig {
        zoom: 4.0,
        ..FrameConfig::default()
    };
    assert_eq!(points_for_frame(&cfg), cfg.iterations);
}

#[test]
fn adaptive_detail_scales_with_zoom() {
    let mut cfg = FrameConfig {
        zoom: 2.0,
        ..FrameConfig::default()
    };
    cfg.toggles.adaptive_detail = true;
    let want = (20_000.0 * 2f64.powf(2.5)) as usize;
    assert_eq!(points_for_frame(&cfg), want);

    cfg.zoom = 0.25;
    assert_eq!(points_for_frame(&cfg), 20_000);
}

#[test]
fn adaptive_detail_is_capped() {
    let mut cfg = FrameConfig {
        zoom: 50.0,
        max_points: 100_000,
        ..FrameConfig::default()
    };
    cfg.toggles.adaptive_detail = true;
    assert_eq!(points_for_frame(&cfg), 100_000);
}

// ── Display pass ────────────────────────────────────────────────────────────

#[test]
fn tonemap_is_monotonic() {
    let mut prev = -1.0;
    for i in 0..=100 {
        let v = tonemap(i as f32 / 50.0, 4.0);
        assert!(v >= prev);
        prev = v;
    }
}

#[test]
fn empty_accumulation_is_never_black() {
    let mut surface = CpuSurface::new(8, 8);
    let cfg = FrameConfig {
        background: [0.0, 0.0, 0.0],
        ..FrameConfig::default()
    };
    let params = DisplayParams::from_config(&cfg, false, 8, 8);
    surface.display(&params).expect("display");
    let floor = (MIN_BACKGROUND * 255.0).round() as u8;
    for px in surface.pixels().chunks_exact(4) {
        assert!(px[0] >= floor && px[1] >= floor && px[2] >= floor, "{px:?}");
        assert_eq!(px[3], 255);
    }
}

#[test]
fn dense_monochrome_pixel_reaches_high_colour() {
    let cfg = FrameConfig::default();
    let params = DisplayParams::from_config(&cfg, false, 1, 1);
    let rgb = shade_pixel([0.5, 0.5], &params, |_| [0.0, 0.0, 0.0, 1.0]);
    for k in 0..3 {
        assert!((rgb[k] - cfg.color_high[k] as f32).abs() < 1e-5);
    }
}

#[test]
fn toggles_off_leave_effects_neutral() {
    let mut cfg = FrameConfig::default();
    cfg.effects.bloom_strength = 2.0;
    cfg.effects.kaleidoscope_segments = 8.0;
    let params = DisplayParams::from_config(&cfg, false, 4, 4);
    assert_eq!(params.bloom, 0.0);
    assert_eq!(params.kaleidoscope, 0.0);

    cfg.toggles = Toggles {
        bloom: true,
        kaleidoscope: true,
        ..Toggles::default()
    };
    let params = DisplayParams::from_config(&cfg, false, 4, 4);
    assert_eq!(params.bloom, 2.0);
    assert_eq!(params.kaleidoscope, 8.0);
}

#[test]
fn display_params_match_gpu_layout() {
    assert_eq!(std::mem::size_of::<DisplayParams>(), 144);
}

// ── CPU surface ─────────────────────────────────────────────────────────────

#[test]
fn points_outside_view_are_dropped() {
    let mut surface = CpuSurface::new(4, 4);
    let batch = PointBatch {
        positions: vec![5.0, 5.0, -3.0, 0.0],
        colors: vec![1.0; 6],
    };
    let view = ViewTransform::new(&FrameConfig::default(), 4, 4);
    surface.accumulate(&batch, &view).expect("accumulate");
    assert_eq!(surface.total_density(), 0.0);
}

#[test]
fn fade_scales_accumulation() {
    let mut surface = CpuSurface::new(4, 4);
    let batch = PointBatch {
        positions: vec![0.0, 0.0],
        colors: vec![1.0, 1.0, 1.0],
    };
    let view = ViewTransform::new(&FrameConfig::default(), 4, 4);
    surface.accumulate(&batch, &view).expect("accumulate");
    let before = surface.total_density();
    surface.fade_accumulation(0.5);
    assert!((surface.total_density() - before * 0.5).abs() < 1e-6);
    surface.clear_accumulation();
    assert_eq!(surface.total_density(), 0.0);
}

#[test]
fn zero_resize_is_rejected() {
    let mut surface = CpuSurface::new(4, 4);
    assert!(matches!(surface.resize(0, 3), Err(SurfaceError::InvalidSize { .. })));
    assert_eq!(surface.size(), (4, 4));
}

// ── Engine ──────────────────────────────────────────────────────────────────

#[test]
fn engine_renders_visible_structure() {
    let mut engine = FractalEngine::new(CpuSurface::new(48, 48), 11);
    let scene = Scene::new(sierpinski().into());
    let stats = engine.render_frame(&scene, &small_config()).expect("frame");
    assert_eq!(stats.cleared, Some(ClearReason::Initial));
    assert_eq!(stats.requested, 4_000);
    assert_eq!(stats.points, 4_000);
    assert!(engine.surface().total_density() > 0.0);

    let px = engine.pixels();
    let first = &px[..3];
    assert!(px.chunks_exact(4).any(|p| &p[..3] != first));
}

#[test]
fn engine_accumulates_between_clears() {
    let mut engine = FractalEngine::new(CpuSurface::new(32, 32), 3);
    let scene = Scene::new(levy_c().into());
    let cfg = small_config();
    engine.render_frame(&scene, &cfg).expect("frame 1");
    let d1 = engine.surface().total_density();
    let stats = engine.render_frame(&scene, &cfg).expect("frame 2");
    assert_eq!(stats.cleared, None);
    assert!(engine.surface().total_density() > d1);
}

#[test]
fn engine_clears_on_system_switch() {
    let mut engine = FractalEngine::new(CpuSurface::new(32, 32), 5);
    let cfg = small_config();
    engine.render_frame(&Scene::new(sierpinski().into()), &cfg).expect("frame");
    let stats = engine
        .render_frame(&Scene::new(chromatic_carpet().into()), &cfg)
        .expect("frame");
    assert_eq!(stats.cleared, Some(ClearReason::SystemChanged));
}

#[test]
fn engine_renders_morph_when_enabled() {
    let mut engine = FractalEngine::new(CpuSurface::new(32, 32), 9);
    let mut cfg = small_config();
    cfg.toggles.morph = true;
    let a: FractalSystem = sierpinski().into();
    let b: FractalSystem = levy_c().into();
    let scene = Scene {
        system: a.clone(),
        morph: Some(MorphTarget { to: b.clone(), t: 0.5 }),
    };
    let stats = engine.render_frame(&scene, &cfg).expect("frame");
    assert!(stats.system.contains(a.name()) && stats.system.contains(b.name()));
}

#[test]
fn engine_rejects_empty_surface() {
    let mut engine = FractalEngine::new(CpuSurface::new(0, 0), 1);
    let scene = Scene::new(sierpinski().into());
    let err = engine.render_frame(&scene, &small_config());
    assert!(matches!(err, Err(SurfaceError::InvalidSize { w: 0, h: 0 })));
}
