//! Look files: `key = value` overrides for the display side of `FrameConfig`.
//!
//! ```text
//! # warm ember
//! color_low = #1a0500
//! color_high = 1.0, 0.8, 0.4
//! brightness = 6
//! bloom = on
//! hue_shift = 0.3
//! ```

use std::path::{Path, PathBuf};

use crate::fractal::Rgb;
use crate::visual::{Effects, FrameConfig, Toggles};

#[derive(Debug, thiserror::Error)]
pub enum LookError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("unknown key `{key}` at line {line}")]
    UnknownKey { line: usize, key: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToggleKey {
    Bloom,
    Kaleidoscope,
    Trails,
    InfiniteAccumulation,
    AdaptiveDetail,
    Rotation,
    Morph,
}

impl ToggleKey {
    pub const ALL: [Self; 7] = [
        Self::Bloom,
        Self::Kaleidoscope,
        Self::Trails,
        Self::InfiniteAccumulation,
        Self::AdaptiveDetail,
        Self::Rotation,
        Self::Morph,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Bloom => "bloom",
            Self::Kaleidoscope => "kaleidoscope",
            Self::Trails => "trails",
            Self::InfiniteAccumulation => "infinite",
            Self::AdaptiveDetail => "adaptive_detail",
            Self::Rotation => "rotation",
            Self::Morph => "morph",
        }
    }

    pub fn slot(self, t: &mut Toggles) -> &mut bool {
        match self {
            Self::Bloom => &mut t.bloom,
            Self::Kaleidoscope => &mut t.kaleidoscope,
            Self::Trails => &mut t.trails,
            Self::InfiniteAccumulation => &mut t.infinite_accumulation,
            Self::AdaptiveDetail => &mut t.adaptive_detail,
            Self::Rotation => &mut t.rotation,
            Self::Morph => &mut t.morph,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectKey {
    Tunnel,
    Spiral,
    Wave,
    RadialPulse,
    Ripple,
    RotationSpeed,
    KaleidoscopeSegments,
    FeedbackZoom,
    NoiseWarp,
    Pixelate,
    ChromaticAberration,
    Prism,
    BloomStrength,
    EdgeGlow,
    Posterize,
    HueShift,
}

impl EffectKey {
    pub const ALL: [Self; 16] = [
        Self::Tunnel,
        Self::Spiral,
        Self::Wave,
        Self::RadialPulse,
        Self::Ripple,
        Self::RotationSpeed,
        Self::KaleidoscopeSegments,
        Self::FeedbackZoom,
        Self::NoiseWarp,
        Self::Pixelate,
        Self::ChromaticAberration,
        Self::Prism,
        Self::BloomStrength,
        Self::EdgeGlow,
        Self::Posterize,
        Self::HueShift,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Tunnel => "tunnel",
            Self::Spiral => "spiral",
            Self::Wave => "wave",
            Self::RadialPulse => "radial_pulse",
            Self::Ripple => "ripple",
            Self::RotationSpeed => "rotation_speed",
            Self::KaleidoscopeSegments => "kaleidoscope_segments",
            Self::FeedbackZoom => "feedback_zoom",
            Self::NoiseWarp => "noise_warp",
            Self::Pixelate => "pixelate",
            Self::ChromaticAberration => "chromatic_aberration",
            Self::Prism => "prism",
            Self::BloomStrength => "bloom_strength",
            Self::EdgeGlow => "edge_glow",
            Self::Posterize => "posterize",
            Self::HueShift => "hue_shift",
        }
    }

    pub fn slot(self, e: &mut Effects) -> &mut f32 {
        match self {
            Self::Tunnel => &mut e.tunnel,
            Self::Spiral => &mut e.spiral,
            Self::Wave => &mut e.wave,
            Self::RadialPulse => &mut e.radial_pulse,
            Self::Ripple => &mut e.ripple,
            Self::RotationSpeed => &mut e.rotation_speed,
            Self::KaleidoscopeSegments => &mut e.kaleidoscope_segments,
            Self::FeedbackZoom => &mut e.feedback_zoom,
            Self::NoiseWarp => &mut e.noise_warp,
            Self::Pixelate => &mut e.pixelate,
            Self::ChromaticAberration => &mut e.chromatic_aberration,
            Self::Prism => &mut e.prism,
            Self::BloomStrength => &mut e.bloom_strength,
            Self::EdgeGlow => &mut e.edge_glow,
            Self::Posterize => &mut e.posterize,
            Self::HueShift => &mut e.hue_shift,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Setting {
    Brightness(f64),
    ColorLow(Rgb),
    ColorHigh(Rgb),
    Background(Rgb),
    PointSize(f32),
    PointIntensity(f32),
    TrailDecay(f32),
    ClearInterval(u32),
    Toggle(ToggleKey, bool),
    Effect(EffectKey, f32),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Look {
    pub settings: Vec<Setting>,
}

impl Look {
    pub fn load(path: &Path) -> Result<Self, LookError> {
        let text = std::fs::read_to_string(path).map_err(|source| LookError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, LookError> {
        let mut settings = Vec::new();
        for (line_idx, raw) in text.lines().enumerate() {
            let line_no = line_idx + 1;
            let line = raw.trim();
            // Whole-line comments only: `#rrggbb` values contain '#'.
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key_raw, value_raw)) = line.split_once('=') else {
                return Err(LookError::Parse {
                    line: line_no,
                    message: "expected <key>=<value>".to_string(),
                });
            };
            settings.push(parse_setting(line_no, key_raw.trim(), value_raw.trim())?);
        }
        Ok(Self { settings })
    }

    pub fn apply(&self, cfg: &mut FrameConfig) {
        for s in &self.settings {
            match *s {
                Setting::Brightness(v) => cfg.brightness = v,
                Setting::ColorLow(c) => cfg.color_low = c,
                Setting::ColorHigh(c) => cfg.color_high = c,
                Setting::Background(c) => cfg.background = c,
                Setting::PointSize(v) => cfg.point_size = v,
                Setting::PointIntensity(v) => cfg.point_intensity = v,
                Setting::TrailDecay(v) => cfg.trail_decay = v,
                Setting::ClearInterval(v) => cfg.clear_interval = v,
                Setting::Toggle(k, on) => *k.slot(&mut cfg.toggles) = on,
                Setting::Effect(k, v) => *k.slot(&mut cfg.effects) = v,
            }
        }
    }
}

fn parse_setting(line: usize, key: &str, value: &str) -> Result<Setting, LookError> {
    let err = |message: String| LookError::Parse { line, message };
    let number = |min: f64, max: f64| -> Result<f64, LookError> {
        let v: f64 = value
            .parse()
            .map_err(|_| err(format!("{key} expects a number, got `{value}`")))?;
        if !v.is_finite() || v < min || v > max {
            return Err(err(format!("{key} must be within {min}..={max}")));
        }
        Ok(v)
    };
    let color = || parse_color(value).ok_or_else(|| err(format!("{key} expects #rrggbb or r,g,b")));

    let setting = match key {
        "brightness" => Setting::Brightness(number(1e-3, 1e4)?),
        "color_low" => Setting::ColorLow(color()?),
        "color_high" => Setting::ColorHigh(color()?),
        "background" => Setting::Background(color()?),
        "point_size" => Setting::PointSize(number(1.0, 64.0)? as f32),
        "point_intensity" => Setting::PointIntensity(number(0.0, 10.0)? as f32),
        "trail_decay" => Setting::TrailDecay(number(0.0, 1.0)? as f32),
        "clear_interval" => Setting::ClearInterval(number(0.0, u32::MAX as f64)? as u32),
        _ => {
            if let Some(k) = ToggleKey::ALL.into_iter().find(|k| k.name() == key) {
                let on = parse_bool(value)
                    .ok_or_else(|| err(format!("{key} must be on/off")))?;
                Setting::Toggle(k, on)
            } else if let Some(k) = EffectKey::ALL.into_iter().find(|k| k.name() == key) {
                Setting::Effect(k, number(-1e3, 1e3)? as f32)
            } else {
                return Err(LookError::UnknownKey {
                    line,
                    key: key.to_string(),
                });
            }
        }
    };
    Ok(setting)
}

pub fn parse_color(raw: &str) -> Option<Rgb> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix('#') {
        if hex.len() != 6 {
            return None;
        }
        let v = u32::from_str_radix(hex, 16).ok()?;
        let ch = |shift: u32| f64::from((v >> shift) & 0xff) / 255.0;
        return Some([ch(16), ch(8), ch(0)]);
    }
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return None;
    }
    let mut out = [0.0; 3];
    for (o, p) in out.iter_mut().zip(parts) {
        let v: f64 = p.parse().ok()?;
        if !(0.0..=1.0).contains(&v) {
            return None;
        }
        *o = v;
    }
    Some(out)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
