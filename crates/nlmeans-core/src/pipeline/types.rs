use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::NlmError;
use crate::image::Image;
use crate::schedule::Device;

/// Pipeline variants selectable by name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineKind {
    /// Non-local means denoising of a single-channel image.
    #[default]
    NonlocalMeans,
    /// Luminance of a three-channel image.
    ColorToGray,
}

impl PipelineKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::NonlocalMeans => "nonlocalmeans",
            Self::ColorToGray => "colortogray",
        }
    }
}

impl std::fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for PipelineKind {
    type Err = NlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nonlocalmeans" => Ok(Self::NonlocalMeans),
            "colortogray" => Ok(Self::ColorToGray),
            other => Err(NlmError::UnknownPipeline(other.to_string())),
        }
    }
}

/// Pipeline processing stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Loading,
    Building,
    Scheduling,
    Realizing,
    Writing,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loading => write!(f, "Loading image"),
            Self::Building => write!(f, "Building stage graph"),
            Self::Scheduling => write!(f, "Scheduling"),
            Self::Realizing => write!(f, "Realizing output"),
            Self::Writing => write!(f, "Writing output"),
        }
    }
}

/// Result of one pipeline run.
#[derive(Clone, Debug)]
pub struct RunOutcome {
    pub image: Image,
    pub kind: PipelineKind,
    /// Device the output stage actually ran on.
    pub device: Device,
    /// Loop nest of the schedule that was realized.
    pub loop_nest: String,
    /// Wall time of realization, including the device-to-host copy.
    pub realize_time: Duration,
}

/// Thread-safe progress reporting for the pipeline.
///
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn begin_stage(&self, _stage: PipelineStage) {}

    fn finish_stage(&self) {}
}

/// No-op progress reporter, used when `run_pipeline` delegates.
pub(super) struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}
