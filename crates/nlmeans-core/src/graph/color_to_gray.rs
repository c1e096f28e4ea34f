use std::sync::Arc;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::consts::{LUMINANCE_B, LUMINANCE_G, LUMINANCE_R, RGB_CHANNELS};
use crate::error::{NlmError, Result};
use crate::image::Image;
use crate::sampler::BoundarySampler;
use crate::schedule::Schedule;

use super::{AcceleratorKernel, KernelKind, RoundingPolicy, StageCache, StageGraph, StageId};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorToGrayParams {
    pub rounding: RoundingPolicy,
}

const STAGES: [StageId; 2] = [StageId::Input, StageId::Gray];

/// Single-stage graph mixing RGB channels into BT.601 luminance.
#[derive(Debug)]
pub struct ColorToGrayGraph {
    input: Arc<Image>,
    params: ColorToGrayParams,
}

impl ColorToGrayGraph {
    pub fn new(input: Arc<Image>, params: ColorToGrayParams) -> Result<Self> {
        if input.channels() != RGB_CHANNELS {
            return Err(NlmError::ChannelMismatch {
                pipeline: "colortogray",
                expected: RGB_CHANNELS,
                actual: input.channels(),
            });
        }
        Ok(Self { input, params })
    }

    pub fn gray(&self, x: i64, y: i64) -> u8 {
        let r = BoundarySampler::with_channel(&self.input, 0).sample(x, y) as f32;
        let g = BoundarySampler::with_channel(&self.input, 1).sample(x, y) as f32;
        let b = BoundarySampler::with_channel(&self.input, 2).sample(x, y) as f32;
        self.params
            .rounding
            .quantize(LUMINANCE_R * r + LUMINANCE_G * g + LUMINANCE_B * b)
    }
}

impl StageGraph for ColorToGrayGraph {
    fn name(&self) -> &'static str {
        "colortogray"
    }

    fn input(&self) -> &Image {
        &self.input
    }

    fn stages(&self) -> &[StageId] {
        &STAGES
    }

    fn output(&self) -> StageId {
        StageId::Gray
    }

    fn materialize(&self, _stage: StageId) -> Option<Array2<f32>> {
        None
    }

    fn evaluate(&self, x: i64, y: i64, _schedule: &Schedule, _cache: &StageCache) -> u8 {
        self.gray(x, y)
    }

    fn accelerator_kernel(&self) -> Option<AcceleratorKernel> {
        Some(AcceleratorKernel {
            kind: KernelKind::ColorToGray,
            lookup_table: None,
            patch_size: 0,
            search_window: 0,
            strength: 0.0,
            rounding: self.params.rounding,
        })
    }
}
