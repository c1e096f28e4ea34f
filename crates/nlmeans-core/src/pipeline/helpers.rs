use std::sync::Arc;

use tracing::{debug, warn};

use crate::compute::{CompiledPipeline, ExecutionEngine};
use crate::graph::StageGraph;
use crate::schedule::{Device, Schedule};

use super::OutputStage;

/// A stage graph together with the schedule currently attached to it.
///
/// Rescheduling always drops the previously compiled artifact.
pub(super) struct ScheduledGraph {
    graph: Arc<dyn StageGraph>,
    schedule: Schedule,
    device: Device,
    compiled: Option<Arc<CompiledPipeline>>,
}

impl ScheduledGraph {
    pub(super) fn new(graph: Arc<dyn StageGraph>) -> Self {
        Self {
            graph,
            schedule: Schedule::new(),
            device: Device::Host,
            compiled: None,
        }
    }

    pub(super) fn graph(&self) -> Arc<dyn StageGraph> {
        Arc::clone(&self.graph)
    }

    pub(super) fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub(super) fn device(&self) -> Device {
        self.device
    }

    pub(super) fn apply_host(&mut self, schedule: Schedule) {
        debug!(pipeline = self.graph.name(), "Applying host schedule");
        self.schedule = schedule;
        self.device = Device::Host;
        self.compiled = None;
    }

    /// Compile `schedule` for the accelerator. On failure the current
    /// schedule is left untouched.
    pub(super) fn try_accelerator(
        &mut self,
        schedule: Schedule,
        engine: &dyn ExecutionEngine,
    ) -> bool {
        if !engine.accelerator_available() {
            debug!(engine = engine.name(), "No accelerator available");
            return false;
        }
        match engine.compile(Arc::clone(&self.graph), &schedule, Device::Accelerator) {
            Ok(compiled) => {
                debug!(pipeline = self.graph.name(), "Applying accelerator schedule");
                self.schedule = schedule;
                self.device = Device::Accelerator;
                self.compiled = Some(Arc::new(compiled));
                true
            }
            Err(e) => {
                warn!(
                    pipeline = self.graph.name(),
                    error = %e,
                    "Accelerator schedule failed to compile"
                );
                false
            }
        }
    }

    pub(super) fn output_stage(&self) -> OutputStage {
        OutputStage {
            graph: Arc::clone(&self.graph),
            schedule: self.schedule.clone(),
            device: self.device,
            compiled: self.compiled.clone(),
        }
    }
}
