use std::time::{Duration, Instant};

use anyhow::Result;
use ifs_flame::fractal::morph::morph;
use ifs_flame::fractal::presets::make_presets;
use ifs_flame::fractal::sampler::{fill_point_batch, PointBatch};
use ifs_flame::visual::{CpuSurface, FractalEngine, FrameConfig, MorphTarget, Scene, Surface};

#[cfg(target_os = "macos")]
use ifs_flame::visual::MetalSurface;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Cpu,
    Metal,
    Both,
}

struct Args {
    mode: Mode,
    frames: usize,
    morph_frames: usize,
    w: usize,
    h: usize,
    iterations: usize,
    seed: u64,
    ci_smoke: bool,
    quick: bool,
    max_ms: f64,
}

fn parse_args() -> Args {
    let mut args = Args {
        mode: Mode::Cpu,
        frames: 120,
        morph_frames: 60,
        w: 160,
        h: 88,
        iterations: 20_000,
        seed: 7,
        ci_smoke: false,
        quick: false,
        max_ms: 25.0,
    };

    let argv = std::env::args().skip(1).collect::<Vec<_>>();
    let mut i = 0usize;
    while i < argv.len() {
        let k = argv[i].as_str();
        let v = argv.get(i + 1).map(|s| s.as_str());
        match (k, v) {
            ("--mode", Some("cpu")) => {
                args.mode = Mode::Cpu;
                i += 2;
            }
            ("--mode", Some("metal")) => {
                args.mode = Mode::Metal;
                i += 2;
            }
            ("--mode", Some("both")) => {
                args.mode = Mode::Both;
                i += 2;
            }
            ("--frames", Some(x)) => {
                if let Ok(n) = x.parse::<usize>() {
                    args.frames = n.max(1);
                }
                i += 2;
            }
            ("--morph-frames", Some(x)) => {
                if let Ok(n) = x.parse::<usize>() {
                    args.morph_frames = n.max(1);
                }
                i += 2;
            }
            ("--w", Some(x)) => {
                if let Ok(n) = x.parse::<usize>() {
                    args.w = n.max(1);
                }
                i += 2;
            }
            ("--h", Some(x)) => {
                if let Ok(n) = x.parse::<usize>() {
                    args.h = n.max(1);
                }
                i += 2;
            }
            ("--iterations", Some(x)) => {
                if let Ok(n) = x.parse::<usize>() {
                    args.iterations = n.max(1);
                }
                i += 2;
            }
            ("--seed", Some(x)) => {
                if let Ok(n) = x.parse::<u64>() {
                    args.seed = n;
                }
                i += 2;
            }
            ("--ci-smoke", Some(x)) if !x.starts_with("--") => {
                args.ci_smoke = parse_bool(x).unwrap_or(true);
                i += 2;
            }
            ("--ci-smoke", _) => {
                args.ci_smoke = true;
                i += 1;
            }
            ("--quick", Some(x)) if !x.starts_with("--") => {
                args.quick = parse_bool(x).unwrap_or(true);
                i += 2;
            }
            ("--quick", _) => {
                args.quick = true;
                i += 1;
            }
            ("--max-ms", Some(x)) => {
                if let Ok(v) = x.parse::<f64>() {
                    args.max_ms = v.max(0.1);
                }
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    if args.quick {
        args.frames = args.frames.min(30);
        args.morph_frames = args.morph_frames.min(20);
    }

    args
}

fn parse_bool(s: &str) -> Option<bool> {
    let v = s.trim().to_ascii_lowercase();
    match v.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// A frame shows structure when it is not one flat background colour.
fn has_structure(px: &[u8]) -> bool {
    let mut it = px.chunks_exact(4);
    let Some(first) = it.next() else {
        return false;
    };
    it.any(|p| p[..3] != first[..3])
}

fn frame_config(args: &Args) -> FrameConfig {
    FrameConfig {
        iterations: args.iterations,
        ..FrameConfig::default()
    }
}

fn bench_sampler(args: &Args) {
    let presets = make_presets();
    let mut rng = fastrand::Rng::with_seed(args.seed);
    let mut batch = PointBatch::default();
    println!("Sampler throughput: points/batch={}", args.iterations);
    for (idx, p) in presets.iter().enumerate() {
        let start = Instant::now();
        let rounds = args.frames.clamp(1, 20);
        let mut points = 0usize;
        for _ in 0..rounds {
            fill_point_batch(p, args.iterations, &mut rng, &mut batch);
            points += batch.len();
        }
        let secs = start.elapsed().as_secs_f64().max(1e-9);
        println!(
            "{:>2}. {:<24} {:>8.2} Mpts/s  [{}]",
            idx,
            p.name(),
            points as f64 / secs / 1e6,
            p.kind().label()
        );
    }
}

fn bench_morph(args: &Args) {
    let presets = make_presets();
    let frames = args.morph_frames.max(1);
    let start = Instant::now();
    let mut maps = 0usize;
    for pair in presets.windows(2) {
        for f in 0..=frames {
            let t = f as f64 / frames as f64;
            maps += morph(&pair[0], &pair[1], t).map_count();
        }
    }
    let n = (presets.len().saturating_sub(1) * (frames + 1)).max(1);
    let us = start.elapsed().as_secs_f64() * 1e6 / n as f64;
    println!("Morph: {:>8.3} us/interpolation  pairs={}  maps={}", us, presets.len().saturating_sub(1), maps);
}

fn run_engine<S: Surface>(
    label: &str,
    mut engine: FractalEngine<S>,
    args: &Args,
    black: &mut Vec<String>,
    slow: &mut Vec<(String, f64)>,
) -> Result<(Duration, usize)> {
    let presets = make_presets();
    let mut cfg = frame_config(args);
    let mut total_time = Duration::ZERO;
    let mut total_frames = 0usize;

    println!(
        "{label} benchmark: presets={} frames/preset={} size={}x{} iterations={}",
        presets.len(),
        args.frames,
        args.w,
        args.h,
        args.iterations
    );

    for (idx, p) in presets.iter().enumerate() {
        let scene = Scene::new(p.clone());
        let start = Instant::now();
        let mut lit = 0usize;
        for f in 0..args.frames {
            cfg.time = f as f64 / 60.0;
            engine.render_frame(&scene, &cfg)?;
            if has_structure(engine.pixels()) {
                lit += 1;
            }
        }
        let elapsed = start.elapsed();
        total_time += elapsed;
        total_frames += args.frames;
        let ms = elapsed.as_secs_f64() * 1000.0 / args.frames as f64;
        println!("{:>2}. {:<24} {:>8.3} ms/frame  lit={:>3}/{}", idx, p.name(), ms, lit, args.frames);
        if lit == 0 {
            black.push(p.name().to_string());
        }
        if args.ci_smoke && ms > args.max_ms {
            slow.push((p.name().to_string(), ms));
        }
    }

    // One morph sweep with the morph toggle on.
    if presets.len() >= 2 {
        cfg.toggles.morph = true;
        let start = Instant::now();
        let frames = args.morph_frames.max(1);
        for f in 0..frames {
            let scene = Scene {
                system: presets[0].clone(),
                morph: Some(MorphTarget {
                    to: presets[presets.len() - 1].clone(),
                    t: f as f64 / frames as f64,
                }),
            };
            engine.render_frame(&scene, &cfg)?;
        }
        let ms = start.elapsed().as_secs_f64() * 1000.0 / frames as f64;
        println!("{label} morph sweep: {:>8.3} ms/frame", ms);
    }

    Ok((total_time, total_frames))
}

fn summarize(label: &str, total_time: Duration, total_frames: usize) {
    let avg_ms = total_time.as_secs_f64() * 1000.0 / total_frames.max(1) as f64;
    let fps = if avg_ms > 0.0 { 1000.0 / avg_ms } else { 0.0 };
    println!("{label} summary: {:>8.3} ms/frame avg  {:>7.2} FPS", avg_ms, fps);
}

fn bench_cpu(args: &Args) -> Result<()> {
    let mut black_presets = Vec::<String>::new();
    let mut slow_presets = Vec::<(String, f64)>::new();

    bench_sampler(args);
    bench_morph(args);

    let engine = FractalEngine::new(CpuSurface::new(args.w, args.h), args.seed);
    let (total_time, total_frames) = run_engine("CPU", engine, args, &mut black_presets, &mut slow_presets)?;
    summarize("CPU", total_time, total_frames);

    if args.ci_smoke {
        if !black_presets.is_empty() || !slow_presets.is_empty() {
            eprintln!("CI smoke: FAIL");
            if !black_presets.is_empty() {
                eprintln!("  flat presets: {}", black_presets.join(", "));
            }
            for (name, ms) in slow_presets {
                eprintln!("  slow preset: {} ({:.3} ms/frame > {:.3})", name, ms, args.max_ms);
            }
            anyhow::bail!("ci smoke failed");
        }
        println!("CI smoke: PASS (max_ms={:.3})", args.max_ms);
    }

    Ok(())
}

#[cfg(target_os = "macos")]
fn bench_metal(args: &Args) -> Result<()> {
    let mut black_presets = Vec::<String>::new();
    let mut slow_presets = Vec::<(String, f64)>::new();
    let engine = FractalEngine::new(MetalSurface::new(args.w, args.h)?, args.seed);
    let (total_time, total_frames) = run_engine("Metal", engine, args, &mut black_presets, &mut slow_presets)?;
    summarize("Metal", total_time, total_frames);
    if !black_presets.is_empty() {
        eprintln!("  flat presets: {}", black_presets.join(", "));
    }
    Ok(())
}

#[cfg(not(target_os = "macos"))]
fn bench_metal(_args: &Args) -> Result<()> {
    anyhow::bail!("Metal benchmark is only supported on macOS")
}

fn main() -> Result<()> {
    ifs_flame::telemetry::init_tracing(None)?;
    let args = parse_args();

    match args.mode {
        Mode::Cpu => bench_cpu(&args),
        Mode::Metal => bench_metal(&args),
        Mode::Both => {
            bench_cpu(&args)?;
            bench_metal(&args)
        }
    }
}
