use std::sync::Arc;

use crate::compute::ExecutionEngine;
use crate::consts::ACCELERATOR_TILE;
use crate::error::Result;
use crate::graph::nonlocal_means::{NonlocalMeansGraph, NonlocalMeansParams};
use crate::graph::{StageGraph, StageId};
use crate::image::Image;
use crate::schedule::{Device, Partition, Schedule, StageDirective};

use super::helpers::ScheduledGraph;
use super::{OutputStage, Pipeline};

/// Non-local means denoising pipeline.
pub struct NonlocalMeansPipeline {
    graph: Arc<NonlocalMeansGraph>,
    inner: ScheduledGraph,
}

impl NonlocalMeansPipeline {
    pub fn build(input: Arc<Image>, params: NonlocalMeansParams) -> Result<Self> {
        let graph = Arc::new(NonlocalMeansGraph::new(input, params)?);
        let inner = ScheduledGraph::new(graph.clone());
        Ok(Self { graph, inner })
    }

    pub fn denoise_graph(&self) -> &NonlocalMeansGraph {
        &self.graph
    }

    /// Gaussian stored at root, weights shared by both sums, rows in parallel.
    pub fn cpu_schedule() -> Schedule {
        Schedule::new()
            .with(StageId::Gaussian, StageDirective::root())
            .with(StageId::Weight, StageDirective::at_output())
            .with(
                StageId::Output,
                StageDirective::root().partitioned(Partition::Rows),
            )
    }

    /// Gaussian stored at root and uploaded, output in 16x16 device tiles.
    pub fn gpu_schedule() -> Schedule {
        Schedule::new()
            .with(StageId::Gaussian, StageDirective::root())
            .with(StageId::Weight, StageDirective::at_output())
            .with(
                StageId::Output,
                StageDirective::root()
                    .partitioned(Partition::Tiles {
                        width: ACCELERATOR_TILE,
                        height: ACCELERATOR_TILE,
                    })
                    .on(Device::Accelerator),
            )
    }
}

impl Pipeline for NonlocalMeansPipeline {
    fn name(&self) -> &'static str {
        self.graph.name()
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
