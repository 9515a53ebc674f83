use ifs_flame::config::{Config, EngineMode};
use ifs_flame::look::{parse_color, EffectKey, Look, LookError, Setting, ToggleKey};
use ifs_flame::visual::FrameConfig;

use clap::Parser;

// ── Look files ──────────────────────────────────────────────────────────────

#[test]
fn parses_colours_toggles_and_effects() {
    let look = Look::parse(
        "# warm look\n\
         brightness = 6\n\
         color_high = #ff8000\n\
         background = 0.1, 0.1, 0.2\n\
         \n\
         bloom = on\n\
         trails = off\n\
         kaleidoscope_segments = 8\n\
         hue_shift = -0.5\n",
    )
    .expect("valid look");
    assert_eq!(look.settings.len(), 7);

    let mut cfg = FrameConfig::default();
    look.apply(&mut cfg);
    assert_eq!(cfg.brightness, 6.0);
    assert_eq!(cfg.color_high, [1.0, 128.0 / 255.0, 0.0]);
    assert_eq!(cfg.background, [0.1, 0.1, 0.2]);
    assert!(cfg.toggles.bloom);
    assert!(!cfg.toggles.trails);
    assert_eq!(cfg.effects.kaleidoscope_segments, 8.0);
    assert_eq!(cfg.effects.hue_shift, -0.5);
}

#[test]
fn later_lines_override_earlier_ones() {
    let look = Look::parse("brightness=2\nbrightness=9\n").expect("valid look");
    let mut cfg = FrameConfig::default();
    look.apply(&mut cfg);
    assert_eq!(cfg.brightness, 9.0);
}

#[test]
fn unknown_key_reports_line() {
    let err = Look::parse("bloom=on\nsparkle=3\n").unwrap_err();
    match err {
        LookError::UnknownKey { line, key } => {
            assert_eq!(line, 2);
            assert_eq!(key, "sparkle");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn out_of_range_value_is_rejected() {
    assert!(matches!(
        Look::parse("trail_decay=1.5"),
        Err(LookError::Parse { line: 1, .. })
    ));
    assert!(matches!(
        Look::parse("point_size=0"),
        Err(LookError::Parse { line: 1, .. })
    ));
}

#[test]
fn missing_equals_is_a_parse_error() {
    assert!(matches!(Look::parse("bloom on"), Err(LookError::Parse { .. })));
}

#[test]
fn every_key_name_is_accepted() {
    for k in ToggleKey::ALL {
        let look = Look::parse(&format!("{}=yes", k.name())).expect("toggle key");
        assert_eq!(look.settings, vec![Setting::Toggle(k, true)]);
    }
    for k in EffectKey::ALL {
        let look = Look::parse(&format!("{}=0.25", k.name())).expect("effect key");
        assert_eq!(look.settings, vec![Setting::Effect(k, 0.25)]);
    }
}

#[test]
fn colour_formats() {
    assert_eq!(parse_color("#000000"), Some([0.0, 0.0, 0.0]));
    assert_eq!(parse_color(" 1, 0.5 ,0 "), Some([1.0, 0.5, 0.0]));
    assert_eq!(parse_color("#abc"), None);
    assert_eq!(parse_color("1,2,3"), None);
    assert_eq!(parse_color("red"), None);
}

#[test]
fn missing_file_is_io_error() {
    let path = std::env::temp_dir().join("ifs-flame-no-such-look.txt");
    assert!(matches!(Look::load(&path), Err(LookError::Io { .. })));
}

#[test]
fn look_file_round_trip_through_disk() {
    let path = std::env::temp_dir().join(format!("ifs-flame-look-{}.txt", std::process::id()));
    std::fs::write(&path, "posterize=4\nadaptive_detail=1\n").expect("write look");
    let look = Look::load(&path).expect("load look");
    let _ = std::fs::remove_file(&path);
    let mut cfg = FrameConfig::default();
    look.apply(&mut cfg);
    assert_eq!(cfg.effects.posterize, 4.0);
    assert!(cfg.toggles.adaptive_detail);
}

// ── Command line ────────────────────────────────────────────────────────────

#[test]
fn cli_defaults_build_default_frame() {
    let cfg = Config::try_parse_from(["ifs-flame", "--engine", "cpu"]).expect("parse");
    assert_eq!(cfg.engine, EngineMode::Cpu);
    let frame = cfg.frame_config();
    assert_eq!(frame.iterations, 20_000);
    assert_eq!(frame.max_points, 400_000);
    assert_eq!(frame.clear_interval, 300);
    assert!(frame.toggles.morph);
    assert!(!frame.toggles.adaptive_detail);
}

#[test]
fn cli_flags_reach_frame_config() {
    let cfg = Config::try_parse_from([
        "ifs-flame",
        "--engine",
        "gpu",
        "--zoom",
        "2.5",
        "--adaptive-detail",
        "--trails",
        "--morph-seconds",
        "0",
        "--seed",
        "42",
    ])
    .expect("parse");
    assert_eq!(cfg.engine, EngineMode::Metal);
    assert_eq!(cfg.seed, Some(42));
    let frame = cfg.frame_config();
    assert_eq!(frame.zoom, 2.5);
    assert!(frame.toggles.adaptive_detail);
    assert!(frame.toggles.trails);
    assert!(!frame.toggles.morph);
}
