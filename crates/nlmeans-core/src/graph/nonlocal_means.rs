use std::sync::Arc;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_PATCH_SIZE, DEFAULT_SEARCH_WINDOW_SIZE, DEFAULT_STRENGTH, DEFAULT_WEIGHING_SIGMA,
    GRAY_CHANNELS, MAX_SAMPLE,
};
use crate::error::{NlmError, Result};
use crate::image::Image;
use crate::sampler::BoundarySampler;
use crate::schedule::{Schedule, Storage};

use super::gaussian::{GaussianKernel, KernelAccess};
use super::{AcceleratorKernel, KernelKind, ReductionDomain, RoundingPolicy, StageCache, StageGraph, StageId};

/// Parameters for non-local means denoising.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NonlocalMeansParams {
    /// Edge length of the compared patches (odd).
    pub patch_size: usize,
    /// Edge length of the window of candidate patch centers (odd).
    pub search_window_size: usize,
    /// Filter strength. Larger values approach a uniform average.
    pub h: f32,
    /// Sigma of the Gaussian weighing offsets inside a patch.
    pub weighing_gaussian_sigma: f32,
    pub rounding: RoundingPolicy,
}

impl Default for NonlocalMeansParams {
    fn default() -> Self {
        Self {
            patch_size: DEFAULT_PATCH_SIZE,
            search_window_size: DEFAULT_SEARCH_WINDOW_SIZE,
            h: DEFAULT_STRENGTH,
            weighing_gaussian_sigma: DEFAULT_WEIGHING_SIGMA,
            rounding: RoundingPolicy::default(),
        }
    }
}

impl NonlocalMeansParams {
    pub fn validate(&self) -> Result<()> {
        if self.patch_size % 2 == 0 {
            return Err(NlmError::EvenPatchSize(self.patch_size));
        }
        if self.search_window_size % 2 == 0 {
            return Err(NlmError::EvenSearchWindow(self.search_window_size));
        }
        if self.h.is_nan() || self.h <= 0.0 {
            return Err(NlmError::NonPositiveStrength(self.h));
        }
        if self.weighing_gaussian_sigma.is_nan() || self.weighing_gaussian_sigma <= 0.0 {
            return Err(NlmError::NonPositiveSigma(self.weighing_gaussian_sigma));
        }
        Ok(())
    }
}

const STAGES: [StageId; 10] = [
    StageId::Input,
    StageId::Clamped,
    StageId::Gaussian,
    StageId::PixelDistance,
    StageId::PatchDistance,
    StageId::Weight,
    StageId::WeightSum,
    StageId::Accumulated,
    StageId::Normalized,
    StageId::Output,
];

/// Stage graph of non-local means over a single-channel image.
///
/// Each pixel becomes the average of the pixels in its search window, weighted
/// by how similar their surrounding patches are to its own patch. A pixel
/// never contributes to its own average.
#[derive(Debug)]
pub struct NonlocalMeansGraph {
    input: Arc<Image>,
    params: NonlocalMeansParams,
    gaussian: GaussianKernel,
    patch: ReductionDomain,
    search: ReductionDomain,
}

impl NonlocalMeansGraph {
    pub fn new(input: Arc<Image>, params: NonlocalMeansParams) -> Result<Self> {
        params.validate()?;
        if input.channels() != GRAY_CHANNELS {
            return Err(NlmError::ChannelMismatch {
                pipeline: "nonlocalmeans",
                expected: GRAY_CHANNELS,
                actual: input.channels(),
            });
        }
        Ok(Self {
            gaussian: GaussianKernel::new(params.patch_size, params.weighing_gaussian_sigma),
            patch: ReductionDomain::centered(params.patch_size),
            search: ReductionDomain::centered(params.search_window_size),
            input,
            params,
        })
    }

    pub fn params(&self) -> &NonlocalMeansParams {
        &self.params
    }

    pub fn search_domain(&self) -> ReductionDomain {
        self.search
    }

    fn sampler(&self) -> BoundarySampler<'_> {
        BoundarySampler::new(&self.input)
    }

    /// Edge-repeated input scaled to `[0, 1]`.
    pub fn clamped(&self, x: i64, y: i64) -> f32 {
        self.sampler().sample_normalized(x, y)
    }

    /// Squared difference of two clamped samples.
    pub fn pixel_distance(&self, x: i64, y: i64, a: i64, b: i64) -> f32 {
        let d = self.clamped(x, y) - self.clamped(a, b);
        d * d
    }

    /// Gaussian-weighted squared difference between the patches centred at
    /// `(x, y)` and `(a, b)`.
    pub fn patch_distance(&self, x: i64, y: i64, a: i64, b: i64) -> f32 {
        self.patch_distance_with(KernelAccess::Inline(&self.gaussian), x, y, a, b)
    }

    /// Similarity weight in `[0, 1)`; exactly zero when both points coincide.
    pub fn weight(&self, x: i64, y: i64, a: i64, b: i64) -> f32 {
        self.weight_with(KernelAccess::Inline(&self.gaussian), x, y, a, b)
    }

    pub fn weight_sum(&self, x: i64, y: i64) -> f32 {
        self.search
            .iter()
            .map(|(dx, dy)| self.weight(x, y, x + dx, y + dy))
            .sum()
    }

    pub fn accumulated(&self, x: i64, y: i64) -> f32 {
        self.search
            .iter()
            .map(|(dx, dy)| self.weight(x, y, x + dx, y + dy) * self.clamped(x + dx, y + dy))
            .sum()
    }

    /// Weighted average in `[0, 1]`, or `None` when every weight is zero.
    pub fn normalized(&self, x: i64, y: i64) -> Option<f32> {
        let total = self.weight_sum(x, y);
        (total > 0.0).then(|| self.accumulated(x, y) / total)
    }

    /// Output sample with every stage recomputed on demand.
    pub fn output(&self, x: i64, y: i64) -> u8 {
        self.evaluate(x, y, &Schedule::new(), &StageCache::default())
    }

    fn patch_distance_with(&self, kernel: KernelAccess<'_>, x: i64, y: i64, a: i64, b: i64) -> f32 {
        let half = (self.params.patch_size / 2) as i64;
        let sampler = self.sampler();
        let mut sum = 0.0f32;
        for (i, j) in self.patch.iter() {
            let g = kernel.at((i + half) as usize, (j + half) as usize);
            let d = sampler.sample_normalized(x + i, y + j) - sampler.sample_normalized(a + i, b + j);
            sum += g * d * d;
        }
        sum
    }

    fn weight_with(&self, kernel: KernelAccess<'_>, x: i64, y: i64, a: i64, b: i64) -> f32 {
        if x == a && y == b {
            return 0.0;
        }
        let h2 = self.params.h * self.params.h;
        (-self.patch_distance_with(kernel, x, y, a, b) / h2).exp()
    }

    /// Normalize and quantize; a zero weight sum passes the input pixel through.
    fn finish(&self, x: i64, y: i64, weight_sum: f32, accumulated: f32) -> u8 {
        if weight_sum > 0.0 {
            self.params
                .rounding
                .quantize(accumulated / weight_sum * MAX_SAMPLE)
        } else {
            self.sampler().sample(x, y)
        }
    }
}

impl StageGraph for NonlocalMeansGraph {
    fn name(&self) -> &'static str {
        "nonlocalmeans"
    }

    fn input(&self) -> &Image {
        &self.input
    }

    fn stages(&self) -> &[StageId] {
        &STAGES
    }

    fn output(&self) -> StageId {
        StageId::Output
    }

    fn materialize(&self, stage: StageId) -> Option<Array2<f32>> {
        match stage {
            StageId::Gaussian => Some(self.gaussian.materialize()),
            _ => None,
        }
    }

    fn evaluate(&self, x: i64, y: i64, schedule: &Schedule, cache: &StageCache) -> u8 {
        let kernel = match (schedule.storage(StageId::Gaussian), cache.get(StageId::Gaussian)) {
            (Storage::Root, Some(table)) => KernelAccess::Table(table),
            _ => KernelAccess::Inline(&self.gaussian),
        };
        let sampler = self.sampler();

        let (weight_sum, accumulated) = match schedule.storage(StageId::Weight) {
            Storage::AtOutput => {
                // Both reductions share each weight as it is computed.
                self.search
                    .iter()
                    .fold((0.0f32, 0.0f32), |(weight_sum, accumulated), (dx, dy)| {
                        let w = self.weight_with(kernel, x, y, x + dx, y + dy);
                        (
                            weight_sum + w,
                            accumulated + w * sampler.sample_normalized(x + dx, y + dy),
                        )
                    })
            }
            _ => {
                let weight_sum: f32 = self
                    .search
                    .iter()
                    .map(|(dx, dy)| self.weight_with(kernel, x, y, x + dx, y + dy))
                    .sum();
                let accumulated: f32 = self
                    .search
                    .iter()
                    .map(|(dx, dy)| {
                        self.weight_with(kernel, x, y, x + dx, y + dy)
                            * sampler.sample_normalized(x + dx, y + dy)
                    })
                    .sum();
                (weight_sum, accumulated)
            }
        };

        self.finish(x, y, weight_sum, accumulated)
    }

    fn accelerator_kernel(&self) -> Option<AcceleratorKernel> {
        Some(AcceleratorKernel {
            kind: KernelKind::NonlocalMeans,
            lookup_table: Some(StageId::Gaussian),
            patch_size: self.params.patch_size as u32,
            search_window: self.params.search_window_size as u32,
            strength: self.params.h,
            rounding: self.params.rounding,
        })
    }
}
