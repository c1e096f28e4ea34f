//! Pipelines: a stage graph, a way to schedule it, and a handle on its
//! output stage.

mod color_to_gray;
pub mod config;
mod helpers;
mod nonlocal_means;
mod orchestrator;
mod types;

use std::sync::Arc;

use tracing::{info, warn};

use crate::compute::{CompiledPipeline, DevicePreference, ExecutionEngine, ImageBuffer};
use crate::error::Result;
use crate::graph::{StageGraph, StageId};
use crate::image::{Domain, Image};
use crate::schedule::{Device, Schedule};

pub use color_to_gray::ColorToGrayPipeline;
pub use config::{PipelineParams, RunConfig};
pub use nonlocal_means::NonlocalMeansPipeline;
pub use orchestrator::{process, run_pipeline, run_pipeline_reported};
pub use types::{PipelineKind, PipelineStage, ProgressReporter, RunOutcome};

/// A stage graph with a host and an accelerator schedule.
pub trait Pipeline: Send + Sync {
    fn name(&self) -> &'static str;

    fn graph(&self) -> Arc<dyn StageGraph>;

    /// Schedule currently attached to the graph.
    fn schedule(&self) -> &Schedule;

    /// Device the output stage will run on.
    fn device(&self) -> Device;

    fn schedule_for_cpu(&mut self);

    /// Attach and compile the accelerator schedule. Returns false, leaving the
    /// current schedule in place, when `engine` has no accelerator or the
    /// schedule does not compile.
    fn schedule_for_gpu(&mut self, engine: &dyn ExecutionEngine) -> bool;

    fn output_stage(&self) -> OutputStage;
}

/// Handle used to realize a pipeline's output stage over a domain.
#[derive(Clone)]
pub struct OutputStage {
    graph: Arc<dyn StageGraph>,
    schedule: Schedule,
    device: Device,
    compiled: Option<Arc<CompiledPipeline>>,
}

impl OutputStage {
    pub fn stage(&self) -> StageId {
        self.graph.output()
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Realize over `domain`. Host schedules are compiled here; accelerator
    /// output comes back device-owned.
    pub fn realize(&self, engine: &dyn ExecutionEngine, domain: Domain) -> Result<ImageBuffer> {
        match &self.compiled {
            Some(compiled) => engine.realize(compiled, domain),
            None => {
                let compiled =
                    engine.compile(Arc::clone(&self.graph), &self.schedule, self.device)?;
                engine.realize(&compiled, domain)
            }
        }
    }

    /// Realize over `domain` and copy the result back to the host.
    pub fn realize_to_host(&self, engine: &dyn ExecutionEngine, domain: Domain) -> Result<Image> {
        let mut buffer = self.realize(engine, domain)?;
        buffer.copy_device_to_host(engine)?;
        buffer.into_host()
    }
}

/// Build the pipeline named by `kind` over `input`.
///
/// Fails with a construction error when the parameters are malformed or the
/// input has the wrong channel count.
pub fn create_pipeline(
    kind: PipelineKind,
    input: Arc<Image>,
    params: &PipelineParams,
) -> Result<Box<dyn Pipeline>> {
    Ok(match kind {
        PipelineKind::NonlocalMeans => {
            Box::new(NonlocalMeansPipeline::build(input, params.denoise.clone())?)
        }
        PipelineKind::ColorToGray => {
            Box::new(ColorToGrayPipeline::build(input, params.gray.clone())?)
        }
    })
}

/// Attach the schedule matching `preference`, falling back to the host
/// schedule when the accelerator one cannot be used. Returns the device the
/// output stage will run on.
pub fn schedule_pipeline(
    pipeline: &mut dyn Pipeline,
    engine: &dyn ExecutionEngine,
    preference: DevicePreference,
) -> Device {
    if preference != DevicePreference::Cpu && pipeline.schedule_for_gpu(engine) {
        info!(pipeline = pipeline.name(), engine = engine.name(), "Using accelerator schedule");
        return Device::Accelerator;
    }
    if preference == DevicePreference::Gpu {
        warn!(pipeline = pipeline.name(), "Accelerator schedule unavailable, using host schedule");
    }
    pipeline.schedule_for_cpu();
    info!(pipeline = pipeline.name(), "Using host schedule");
    Device::Host
}
