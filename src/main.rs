use anyhow::{Context, Result};
use clap::Parser;

fn main() -> Result<()> {
    let cfg = ifs_flame::config::Config::parse();
    if cfg.list_presets {
        for (i, p) in ifs_flame::fractal::presets::make_presets().iter().enumerate() {
            println!("{i:>2}. {:<24} {:<6} maps={}", p.name(), p.kind().label(), p.map_count());
        }
        return Ok(());
    }

    // The terminal UI owns stdout and stderr, so logs only go to an explicit file.
    if let Some(path) = cfg.log_file.as_deref() {
        ifs_flame::telemetry::init_tracing(Some(path)).context("initialise logging")?;
    }

    ifs_flame::app::run(cfg)
}
