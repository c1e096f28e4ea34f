//! Declarative stage graphs.
//!
//! A graph defines *what* each stage computes as a pure function of integer
//! coordinates. How stages are stored, ordered and distributed is decided
//! separately by a [`Schedule`](crate::schedule::Schedule); no schedule can
//! change the value a stage defines.

pub mod color_to_gray;
pub mod gaussian;
pub mod nonlocal_means;

use std::collections::HashMap;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::consts::{MAX_SAMPLE, TRUNCATE_SLACK};
use crate::image::Image;
use crate::schedule::Schedule;

/// Names every stage a graph can define.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageId {
    Input,
    Clamped,
    Gaussian,
    PixelDistance,
    PatchDistance,
    Weight,
    WeightSum,
    Accumulated,
    Normalized,
    Output,
    Gray,
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Clamped => write!(f, "clamped"),
            Self::Gaussian => write!(f, "gaussian"),
            Self::PixelDistance => write!(f, "pixel_distance"),
            Self::PatchDistance => write!(f, "patch_distance"),
            Self::Weight => write!(f, "weight"),
            Self::WeightSum => write!(f, "weight_sum"),
            Self::Accumulated => write!(f, "accumulated"),
            Self::Normalized => write!(f, "normalized"),
            Self::Output => write!(f, "output"),
            Self::Gray => write!(f, "gray"),
        }
    }
}

/// Square box of relative offsets `[min, min + extent)` on both axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReductionDomain {
    pub min: i64,
    pub extent: usize,
}

impl ReductionDomain {
    /// Box of `size` offsets starting at `-size / 2`.
    pub fn centered(size: usize) -> Self {
        Self {
            min: -((size / 2) as i64),
            extent: size,
        }
    }

    pub fn offsets(&self) -> std::ops::Range<i64> {
        self.min..self.min + self.extent as i64
    }

    /// All `(dx, dy)` pairs, `dy` in the outer loop.
    pub fn iter(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.offsets()
            .flat_map(move |dy| self.offsets().map(move |dx| (dx, dy)))
    }

    pub fn len(&self) -> usize {
        self.extent * self.extent
    }

    pub fn is_empty(&self) -> bool {
        self.extent == 0
    }
}

/// How a normalized float sample is turned back into 8 bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundingPolicy {
    /// Drop the fractional part. Values within [`TRUNCATE_SLACK`] below an
    /// integer count as that integer.
    Truncate,
    /// Round half away from zero.
    #[default]
    Nearest,
}

impl RoundingPolicy {
    /// Quantize a value already scaled to `[0, 255]`, saturating at the ends.
    pub fn quantize(self, value: f32) -> u8 {
        let v = match self {
            Self::Truncate => (value + TRUNCATE_SLACK).floor(),
            Self::Nearest => value.round(),
        };
        v.clamp(0.0, MAX_SAMPLE) as u8
    }

    /// Numeric code shared with the device kernels.
    pub fn code(self) -> u32 {
        match self {
            Self::Truncate => 0,
            Self::Nearest => 1,
        }
    }
}

/// Root-stored stages computed ahead of pixel work, keyed by stage.
#[derive(Clone, Debug, Default)]
pub struct StageCache {
    tables: HashMap<StageId, Array2<f32>>,
}

impl StageCache {
    pub fn insert(&mut self, stage: StageId, table: Array2<f32>) {
        self.tables.insert(stage, table);
    }

    pub fn get(&self, stage: StageId) -> Option<&Array2<f32>> {
        self.tables.get(&stage)
    }
}

/// Which device kernel lowers a graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelKind {
    NonlocalMeans,
    ColorToGray,
}

/// Everything an accelerator engine needs to lower a graph into one kernel.
#[derive(Clone, Debug)]
pub struct AcceleratorKernel {
    pub kind: KernelKind,
    /// Root stage uploaded next to the input image as a lookup table.
    pub lookup_table: Option<StageId>,
    pub patch_size: u32,
    pub search_window: u32,
    pub strength: f32,
    pub rounding: RoundingPolicy,
}

/// A pure, immutable graph of stages with one output stage.
pub trait StageGraph: Send + Sync + std::fmt::Debug {
    /// Short pipeline name.
    fn name(&self) -> &'static str;

    fn input(&self) -> &Image;

    /// Stages in definition order (producers before consumers).
    fn stages(&self) -> &[StageId];

    /// The stage realized into the output buffer.
    fn output(&self) -> StageId;

    /// Compute a finite stage over its whole domain, or `None` if the stage
    /// has no bounded domain that can be stored ahead of time.
    fn materialize(&self, stage: StageId) -> Option<Array2<f32>>;

    /// Value of the output stage at `(x, y)`.
    ///
    /// `cache` holds the stages the schedule stores at root; all other stages
    /// are computed as the schedule's storage directives dictate.
    fn evaluate(&self, x: i64, y: i64, schedule: &Schedule, cache: &StageCache) -> u8;

    /// Description of the device kernel, if the graph can run on an accelerator.
    fn accelerator_kernel(&self) -> Option<AcceleratorKernel>;
}
