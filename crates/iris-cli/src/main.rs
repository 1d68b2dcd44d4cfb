mod engine;
mod overlay;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use iris_vision::{DetectionPipeline, DetectorConfig};

use crate::engine::TensorFileEngine;

#[derive(Debug, Parser)]
#[command(name = "iris", version, about = "IRISedge - grid detection decode & overlay")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the configuration and report OK.
    Doctor,
    /// Decode one raw tensor dump and report detections as JSON lines.
    Run {
        /// Raw output tensor as little-endian f32 (.bin)
        #[arg(long)]
        tensor: String,
        /// Frame to draw box overlays on (PNG)
        #[arg(long)]
        image: Option<String>,
        /// Where to save the overlay (defaults to overwriting --image)
        #[arg(long)]
        out: Option<String>,
    },
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    detector: DetectorConfig,
    tensor: TensorCfg,
}

#[derive(Debug, serde::Deserialize)]
struct TensorCfg {
    grid_width: usize,
    grid_height: usize,
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    Ok(toml::from_str(&s).context("parse config toml")?)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg),
        Command::Run { tensor, image, out } => run(&cfg, &tensor, image.as_deref(), out.as_deref()),
    }
}

fn doctor(cfg: &Config) -> Result<()> {
    cfg.detector
        .validate()
        .context("detector config rejected")?;
    anyhow::ensure!(cfg.tensor.grid_width > 0, "tensor.grid_width must be > 0");
    anyhow::ensure!(cfg.tensor.grid_height > 0, "tensor.grid_height must be > 0");
    info!(
        anchors = cfg.detector.anchors.len(),
        classes = cfg.detector.num_classes,
        "doctor: OK"
    );
    Ok(())
}

fn run(cfg: &Config, tensor_path: &str, image: Option<&str>, out: Option<&str>) -> Result<()> {
    let engine = TensorFileEngine::new(
        tensor_path,
        cfg.tensor.grid_height,
        cfg.tensor.grid_width,
        cfg.detector.channels(),
    );
    let mut pipeline = DetectionPipeline::new(cfg.detector.clone(), engine)?;

    let detections = pipeline.detect(&[])?;
    info!(count = detections.len(), "detections");

    for d in &detections {
        println!("{}", serde_json::to_string(d)?);
    }

    if let Some(image_path) = image {
        let mut frame = image::open(image_path)
            .with_context(|| format!("open frame {}", image_path))?
            .to_rgb8();
        overlay::draw_detections(&mut frame, &detections);
        let out_path = out.unwrap_or(image_path);
        frame
            .save(out_path)
            .with_context(|| format!("save overlay {}", out_path))?;
        info!(out = out_path, "overlay saved");
    }

    Ok(())
}
