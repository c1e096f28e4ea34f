use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use nlmeans_core::image::synthetic_noisy_image;
use nlmeans_core::io::save_png;

#[derive(Args)]
pub struct SynthArgs {
    /// Edge length of the square image in pixels
    #[arg(long, default_value = "20")]
    pub size: usize,

    /// Sigma of the additive noise, in 8-bit sample units
    #[arg(long, default_value = "20.0")]
    pub sigma: f32,

    /// Random seed
    #[arg(long, default_value = "0")]
    pub seed: u64,

    /// Output file path
    #[arg(short, long, default_value = "noisy.png")]
    pub output: PathBuf,
}

pub fn run(args: &SynthArgs) -> Result<()> {
    let image = synthetic_noisy_image(args.size, args.sigma, args.seed)
        .context("Failed to generate noisy image")?;
    save_png(&image, &args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    println!(
        "Wrote {}x{} noisy ramp (sigma {}) to {}",
        image.width(),
        image.height(),
        args.sigma,
        args.output.display()
    );
    Ok(())
}
