use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::visual::{FrameConfig, Toggles, DEFAULT_CLEAR_INTERVAL};

#[derive(Parser, Debug, Clone)]
#[command(name = "ifs-flame", version, about = "Chaos-game IFS, flame and Möbius fractals in the terminal")]
pub struct Config {
    #[arg(long, value_enum, default_value_t = EngineMode::default_for_platform())]
    pub engine: EngineMode,

    /// Preset index or case-insensitive name fragment.
    #[arg(long)]
    pub preset: Option<String>,

    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// Points generated per frame before adaptive scaling.
    #[arg(long, default_value_t = 20_000)]
    pub iterations: usize,

    #[arg(long, default_value_t = 400_000)]
    pub max_points: usize,

    #[arg(long, default_value_t = 4.0)]
    pub brightness: f64,

    #[arg(long, default_value_t = 1.0)]
    pub zoom: f64,

    /// Frames between automatic accumulation clears; 0 disables.
    #[arg(long, default_value_t = DEFAULT_CLEAR_INTERVAL)]
    pub clear_interval: u32,

    #[arg(long, default_value_t = false)]
    pub adaptive_detail: bool,

    #[arg(long, default_value_t = false)]
    pub infinite: bool,

    #[arg(long, default_value_t = false)]
    pub trails: bool,

    /// Morph duration when switching presets with morph enabled; 0 switches instantly.
    #[arg(long, default_value_t = 4.0)]
    pub morph_seconds: f32,

    /// RNG seed; random when omitted.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Look file with colour and effect overrides.
    #[arg(long)]
    pub look: Option<PathBuf>,

    /// Write tracing output here; logging is off otherwise while the terminal UI runs.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub sync_updates: bool,

    #[arg(long, default_value_t = false)]
    pub list_presets: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EngineMode {
    Cpu,
    #[value(alias = "gpu")]
    Metal,
}

impl EngineMode {
    pub fn default_for_platform() -> Self {
        if cfg!(target_os = "macos") { Self::Metal } else { Self::Cpu }
    }
}

impl Config {
    /// Initial frame snapshot from the command line. Look files are applied on top by the host.
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            iterations: self.iterations.max(1),
            max_points: self.max_points.max(1),
            zoom: if self.zoom > 0.0 { self.zoom } else { 1.0 },
            brightness: self.brightness,
            clear_interval: self.clear_interval,
            toggles: Toggles {
                adaptive_detail: self.adaptive_detail,
                infinite_accumulation: self.infinite,
                trails: self.trails,
                morph: self.morph_seconds > 0.0,
                ..Toggles::default()
            },
            ..FrameConfig::default()
        }
    }
}
