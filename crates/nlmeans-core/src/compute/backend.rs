use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{NlmError, Result};
use crate::graph::{StageCache, StageGraph};
use crate::image::{Domain, Image};
use crate::schedule::{Device, Partition, Schedule, Storage};

use super::buffer::{DeviceAllocation, ImageBuffer};
use super::cpu::CpuEngine;

/// Which engine to prefer when one is created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    /// Use the GPU when an adapter is found, the CPU otherwise.
    #[default]
    Auto,
    Cpu,
    Gpu,
}

/// Lowers a stage graph plus schedule into runnable work and runs it.
pub trait ExecutionEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Whether accelerator schedules can be compiled at all.
    fn accelerator_available(&self) -> bool {
        false
    }

    /// Validate `schedule` against `graph` for `device` and prepare root stages.
    fn compile(
        &self,
        graph: Arc<dyn StageGraph>,
        schedule: &Schedule,
        device: Device,
    ) -> Result<CompiledPipeline>;

    /// Produce the output stage over `domain`.
    ///
    /// Accelerator results come back device-dirty; the caller copies them to
    /// the host before reading.
    fn realize(&self, compiled: &CompiledPipeline, domain: Domain) -> Result<ImageBuffer>;

    fn upload(&self, image: &Image) -> Result<DeviceAllocation>;

    fn download(
        &self,
        allocation: &DeviceAllocation,
        width: usize,
        height: usize,
        channels: usize,
    ) -> Result<Image>;
}

/// Engine-specific state produced by compilation.
pub(crate) enum Artifact {
    Host,
    #[cfg(feature = "gpu")]
    Wgpu(Box<super::wgpu_backend::WgpuArtifact>),
}

/// A graph bound to a validated schedule, ready to realize.
pub struct CompiledPipeline {
    graph: Arc<dyn StageGraph>,
    schedule: Schedule,
    device: Device,
    cache: StageCache,
    pub(crate) artifact: Artifact,
}

impl CompiledPipeline {
    pub(crate) fn new(
        graph: Arc<dyn StageGraph>,
        schedule: Schedule,
        device: Device,
        cache: StageCache,
        artifact: Artifact,
    ) -> Self {
        Self {
            graph,
            schedule,
            device,
            cache,
            artifact,
        }
    }

    pub fn graph(&self) -> &Arc<dyn StageGraph> {
        &self.graph
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Stages materialized at compile time.
    pub fn cache(&self) -> &StageCache {
        &self.cache
    }
}

/// Checks shared by every engine, then materializes root stages.
pub(crate) fn prepare_stages(
    graph: &dyn StageGraph,
    schedule: &Schedule,
    device: Device,
) -> Result<StageCache> {
    let output = graph.output();

    match device {
        Device::Host if schedule.device() == Device::Accelerator => {
            return Err(NlmError::CompileFailure(
                "schedule places stages on the accelerator but the target is the host".into(),
            ));
        }
        Device::Accelerator if schedule.directive(output).device != Device::Accelerator => {
            return Err(NlmError::CompileFailure(format!(
                "output stage '{output}' is not scheduled on the accelerator"
            )));
        }
        _ => {}
    }

    let mut cache = StageCache::default();
    for (stage, directive) in schedule.iter() {
        if !graph.stages().contains(&stage) {
            return Err(NlmError::CompileFailure(format!(
                "stage '{stage}' is not defined by pipeline '{}'",
                graph.name()
            )));
        }
        if let Partition::Tiles { width, height } = directive.partition {
            if width == 0 || height == 0 {
                return Err(NlmError::CompileFailure(format!(
                    "stage '{stage}' has an empty {width}x{height} tile"
                )));
            }
        }
        if directive.vector_width == Some(0) {
            return Err(NlmError::CompileFailure(format!(
                "stage '{stage}' has a zero vector width"
            )));
        }
        if directive.storage == Storage::Root && stage != output {
            let table = graph.materialize(stage).ok_or_else(|| {
                NlmError::CompileFailure(format!(
                    "stage '{stage}' has no bounded domain and cannot be stored at root"
                ))
            })?;
            debug!(stage = %stage, entries = table.len(), "Materialized root stage");
            cache.insert(stage, table);
        }
    }

    Ok(cache)
}

/// Create an engine for the given preference, falling back to the CPU when no
/// GPU adapter can be initialized.
pub fn create_engine(preference: &DevicePreference) -> Arc<dyn ExecutionEngine> {
    match preference {
        DevicePreference::Cpu => {
            info!("Using CPU engine (requested)");
            Arc::new(CpuEngine)
        }
        DevicePreference::Auto | DevicePreference::Gpu => {
            #[cfg(feature = "gpu")]
            {
                match super::wgpu_backend::WgpuEngine::new() {
                    Ok(engine) => {
                        info!(adapter = engine.name(), "Using GPU engine");
                        return Arc::new(engine);
                    }
                    Err(e) => warn!("GPU engine unavailable ({e}), falling back to CPU"),
                }
            }
            #[cfg(not(feature = "gpu"))]
            if *preference == DevicePreference::Gpu {
                warn!("GPU requested but built without the `gpu` feature, using CPU");
            }
            Arc::new(CpuEngine)
        }
    }
}
