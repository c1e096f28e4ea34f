use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use nlmeans_core::compute::{create_engine, DevicePreference};
use nlmeans_core::graph::color_to_gray::ColorToGrayParams;
use nlmeans_core::graph::nonlocal_means::NonlocalMeansParams;
use nlmeans_core::graph::RoundingPolicy;
use nlmeans_core::pipeline::{
    run_pipeline_reported, PipelineKind, PipelineStage, ProgressReporter, RunConfig,
};
use tracing::debug;

use crate::summary::{print_outcome, print_run_summary};

#[derive(Clone, ValueEnum)]
pub enum PipelineArg {
    /// Non-local means denoising (1-channel input)
    #[value(name = "nonlocalmeans")]
    NonlocalMeans,
    /// Luminance of an RGB image (3-channel input)
    #[value(name = "colortogray")]
    ColorToGray,
}

#[derive(Clone, ValueEnum)]
pub enum DeviceArg {
    /// GPU when available, CPU otherwise
    Auto,
    Cpu,
    Gpu,
}

#[derive(Clone, ValueEnum)]
pub enum RoundingArg {
    /// Round to the nearest integer
    Nearest,
    /// Drop the fractional part
    Truncate,
}

#[derive(Args)]
pub struct RunArgs {
    /// Input image file
    pub file: PathBuf,

    /// Run config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Pipeline to run
    #[arg(long, value_enum, default_value = "nonlocalmeans")]
    pub pipeline: PipelineArg,

    /// Edge length of the compared patches (odd)
    #[arg(long, default_value = "5")]
    pub patch_size: usize,

    /// Edge length of the search window (odd)
    #[arg(long, default_value = "13")]
    pub search_window: usize,

    /// Filter strength
    #[arg(long, default_value = "0.1")]
    pub h: f32,

    /// Sigma of the Gaussian weighing patch offsets
    #[arg(long, default_value = "1.5")]
    pub sigma: f32,

    /// Conversion of filtered values to 8-bit samples
    #[arg(long, value_enum, default_value = "nearest")]
    pub rounding: RoundingArg,

    /// Execution device
    #[arg(long, value_enum, default_value = "auto")]
    pub device: DeviceArg,

    /// Print the loop nest of the schedule that ran
    #[arg(long)]
    pub print_schedule: bool,

    /// Output file path
    #[arg(short, long, default_value = "output.png")]
    pub output: PathBuf,
}

/// Drives a spinner from pipeline stage changes.
struct SpinnerReporter {
    bar: ProgressBar,
}

impl ProgressReporter for SpinnerReporter {
    fn begin_stage(&self, stage: PipelineStage) {
        self.bar.set_message(stage.to_string());
    }
}

pub fn run(args: &RunArgs) -> Result<()> {
    let config = if let Some(ref config_path) = args.config {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config {}", config_path.display()))?;
        toml::from_str(&contents).context("Invalid run config")?
    } else {
        build_config_from_args(args)
    };

    debug!(?config, "Resolved run config");
    let engine = create_engine(&config.device);
    print_run_summary(&config, engine.name());

    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}")?);
    bar.enable_steady_tick(Duration::from_millis(100));
    let reporter = Arc::new(SpinnerReporter { bar: bar.clone() });

    let outcome = run_pipeline_reported(&config, engine, reporter)
        .with_context(|| format!("Pipeline '{}' failed", config.pipeline))?;
    bar.finish_with_message("Done");

    print_outcome(&outcome);
    if args.print_schedule {
        println!("\nPseudo-code for the schedule:");
        print!("{}", outcome.loop_nest);
    }
    println!("\nOutput saved to {}", config.output.display());

    Ok(())
}

fn build_config_from_args(args: &RunArgs) -> RunConfig {
    let rounding = match args.rounding {
        RoundingArg::Nearest => RoundingPolicy::Nearest,
        RoundingArg::Truncate => RoundingPolicy::Truncate,
    };
    let pipeline = match args.pipeline {
        PipelineArg::NonlocalMeans => PipelineKind::NonlocalMeans,
        PipelineArg::ColorToGray => PipelineKind::ColorToGray,
    };
    let device = match args.device {
        DeviceArg::Auto => DevicePreference::Auto,
        DeviceArg::Cpu => DevicePreference::Cpu,
        DeviceArg::Gpu => DevicePreference::Gpu,
    };

    RunConfig {
        input: args.file.clone(),
        output: args.output.clone(),
        pipeline,
        device,
        denoise: NonlocalMeansParams {
            patch_size: args.patch_size,
            search_window_size: args.search_window,
            h: args.h,
            weighing_gaussian_sigma: args.sigma,
            rounding,
        },
        gray: ColorToGrayParams { rounding },
    }
}
