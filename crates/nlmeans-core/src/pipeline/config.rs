use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::compute::DevicePreference;
use crate::graph::color_to_gray::ColorToGrayParams;
use crate::graph::nonlocal_means::NonlocalMeansParams;

use super::PipelineKind;

/// Parameters for every pipeline variant; each variant reads its own section.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParams {
    pub denoise: NonlocalMeansParams,
    pub gray: ColorToGrayParams,
}

/// One run: which pipeline over which file, on which device.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub pipeline: PipelineKind,
    pub device: DevicePreference,
    pub denoise: NonlocalMeansParams,
    pub gray: ColorToGrayParams,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("input.png"),
            output: PathBuf::from("output.png"),
            pipeline: PipelineKind::default(),
            device: DevicePreference::default(),
            denoise: NonlocalMeansParams::default(),
            gray: ColorToGrayParams::default(),
        }
    }
}

impl RunConfig {
    pub fn params(&self) -> PipelineParams {
        PipelineParams {
            denoise: self.denoise.clone(),
            gray: self.gray.clone(),
        }
    }
}
