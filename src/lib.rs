pub mod app;
pub mod config;
pub mod fractal;
pub mod look;
pub mod render;
pub mod telemetry;
pub mod terminal;
pub mod visual;
