use std::sync::Arc;

use crate::compute::ExecutionEngine;
use crate::consts::{ACCELERATOR_TILE, HOST_VECTOR_WIDTH};
use crate::error::Result;
use crate::graph::color_to_gray::{ColorToGrayGraph, ColorToGrayParams};
use crate::graph::{StageGraph, StageId};
use crate::image::Image;
use crate::schedule::{Device, Partition, Schedule, StageDirective};

use super::helpers::ScheduledGraph;
use super::{OutputStage, Pipeline};

/// RGB to luminance pipeline.
pub struct ColorToGrayPipeline {
    inner: ScheduledGraph,
}

impl ColorToGrayPipeline {
    pub fn build(input: Arc<Image>, params: ColorToGrayParams) -> Result<Self> {
        let graph = ColorToGrayGraph::new(input, params)?;
        Ok(Self {
            inner: ScheduledGraph::new(Arc::new(graph)),
        })
    }

    pub fn cpu_schedule() -> Schedule {
        Schedule::new().with(
            StageId::Gray,
            StageDirective::root()
                .partitioned(Partition::Rows)
                .vectorized(HOST_VECTOR_WIDTH),
        )
    }

    pub fn gpu_schedule() -> Schedule {
        Schedule::new().with(
            StageId::Gray,
            StageDirective::root()
                .partitioned(Partition::Tiles {
                    width: ACCELERATOR_TILE,
                    height: ACCELERATOR_TILE,
                })
                .on(Device::Accelerator),
        )
    }
}

impl Pipeline for ColorToGrayPipeline {
    fn name(&self) -> &'static str {
        "colortogray"
    }

    fn graph(&self) -> Arc<dyn StageGraph> {
        self.inner.graph()
    }

    fn schedule(&self) -> &Schedule {
        self.inner.schedule()
    }

    fn device(&self) -> Device {
        self.inner.device()
    }

    fn schedule_for_cpu(&mut self) {
        self.inner.apply_host(Self::cpu_schedule());
    }

    fn schedule_for_gpu(&mut self, engine: &dyn ExecutionEngine) -> bool {
        self.inner.try_accelerator(Self::gpu_schedule(), engine)
    }

    fn output_stage(&self) -> OutputStage {
        self.inner.output_stage()
    }
}
