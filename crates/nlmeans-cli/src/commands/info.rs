use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use nlmeans_core::consts::{GRAY_CHANNELS, RGB_CHANNELS};
use nlmeans_core::io::load_image;
use nlmeans_core::pipeline::PipelineKind;

#[derive(Args)]
pub struct InfoArgs {
    /// Input image file
    pub file: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let image = load_image(&args.file)
        .with_context(|| format!("Failed to load {}", args.file.display()))?;

    println!("File:        {}", args.file.display());
    println!("Dimensions:  {}x{}", image.width(), image.height());
    println!("Channels:    {}", image.channels());

    let pipeline = match image.channels() {
        GRAY_CHANNELS => Some(PipelineKind::NonlocalMeans),
        RGB_CHANNELS => Some(PipelineKind::ColorToGray),
        _ => None,
    };
    if let Some(kind) = pipeline {
        println!("Pipeline:    {kind}");
    }

    let data_kb = image.data().len() as f64 / 1024.0;
    println!("Data size:   {:.1} KB", data_kb);

    Ok(())
}
