use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

mod animation;
mod assets;
mod camera;
mod config;
mod controls;
mod engine;
mod error;
mod framing;
mod math;
mod model;
mod orientation;
mod platform;
mod rendering;
mod scene_graph;
mod session;
mod stereo;
mod ui;
mod viewer;
mod window;

use config::ViewerConfig;

/// Interactive glTF viewer with VR, AR and phone stereo presentation.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Model to open at startup (.glb or .gltf).
    #[arg(long)]
    model: Option<PathBuf>,

    /// JSON file overriding the viewer defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Behave like a handheld device: enables the stereo view and drives
    /// head tracking from the keyboard.
    #[arg(long)]
    emulate_handheld: bool,
}

fn main() -> Result<()> {
    pretty_env_logger::init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::default(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("asset-loader")
        .build()
        .context("Failed to start loader runtime")?;

    let options = window::LaunchOptions {
        model: cli.model,
        config,
        emulate_handheld: cli.emulate_handheld,
    };
    pollster::block_on(window::run(options, runtime.handle().clone()))?;

    Ok(())
}
