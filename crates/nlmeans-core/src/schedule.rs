//! Execution directives attached to stages.
//!
//! A [`Schedule`] never changes what a stage computes, only where its values
//! live, in which order they are produced and on which device.

use std::collections::BTreeMap;

use crate::graph::{StageGraph, StageId};

/// Where a stage's values are kept.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Storage {
    /// Recomputed at every use.
    #[default]
    Inline,
    /// Computed once per output coordinate into scratch shared by all consumers
    /// of that coordinate.
    AtOutput,
    /// Computed in full before any consumer runs.
    Root,
}

/// How the loops over a stage's domain are split.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Partition {
    #[default]
    Serial,
    /// Each row is an independent task.
    Rows,
    /// Fixed-size rectangular tiles, each an independent task or workgroup.
    Tiles { width: u32, height: u32 },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Device {
    #[default]
    Host,
    Accelerator,
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::Accelerator => write!(f, "accelerator"),
        }
    }
}

/// Directive for a single stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StageDirective {
    pub storage: Storage,
    pub partition: Partition,
    pub device: Device,
    /// Number of adjacent columns evaluated together on the host.
    pub vector_width: Option<u32>,
}

impl StageDirective {
    pub fn root() -> Self {
        Self {
            storage: Storage::Root,
            ..Default::default()
        }
    }

    pub fn at_output() -> Self {
        Self {
            storage: Storage::AtOutput,
            ..Default::default()
        }
    }

    pub fn partitioned(mut self, partition: Partition) -> Self {
        self.partition = partition;
        self
    }

    pub fn on(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn vectorized(mut self, width: u32) -> Self {
        self.vector_width = Some(width);
        self
    }
}

/// Mapping from stage to directive. Unlisted stages are inline, serial, host.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schedule {
    directives: BTreeMap<StageId, StageDirective>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, stage: StageId, directive: StageDirective) -> &mut Self {
        self.directives.insert(stage, directive);
        self
    }

    pub fn with(mut self, stage: StageId, directive: StageDirective) -> Self {
        self.set(stage, directive);
        self
    }

    pub fn directive(&self, stage: StageId) -> StageDirective {
        self.directives.get(&stage).copied().unwrap_or_default()
    }

    pub fn storage(&self, stage: StageId) -> Storage {
        self.directive(stage).storage
    }

    pub fn is_scheduled(&self, stage: StageId) -> bool {
        self.directives.contains_key(&stage)
    }

    /// Accelerator if any stage is placed there, host otherwise.
    pub fn device(&self) -> Device {
        if self
            .directives
            .values()
            .any(|d| d.device == Device::Accelerator)
        {
            Device::Accelerator
        } else {
            Device::Host
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (StageId, StageDirective)> + '_ {
        self.directives.iter().map(|(&s, &d)| (s, d))
    }

    /// Pseudo-code of the loop nest this schedule produces for `graph`.
    pub fn loop_nest(&self, graph: &dyn StageGraph) -> String {
        let output = graph.output();
        let mut out = String::new();

        for &stage in graph.stages() {
            if stage == output || stage == StageId::Input {
                continue;
            }
            if self.storage(stage) == Storage::Root {
                line(&mut out, 0, &format!("produce {stage}:"));
                let depth = write_loops(&mut out, self.directive(stage), 1);
                line(&mut out, depth, &format!("{stage}(...) = ..."));
            }
        }

        line(&mut out, 0, &format!("produce {output}:"));
        let depth = write_loops(&mut out, self.directive(output), 1);
        for &stage in graph.stages() {
            if stage == output || stage == StageId::Input {
                continue;
            }
            match self.storage(stage) {
                Storage::AtOutput => line(&mut out, depth, &format!("compute {stage} at {output}")),
                Storage::Inline => line(&mut out, depth, &format!("inline {stage}")),
                Storage::Root => line(&mut out, depth, &format!("read {stage}")),
            }
        }
        line(&mut out, depth, &format!("{output}(x, y) = ..."));
        out
    }
}

fn line(out: &mut String, depth: usize, text: &str) {
    for _ in 0..depth {
        out.push_str("  ");
    }
    out.push_str(text);
    out.push('\n');
}

/// Emit the loop headers for one directive; returns the body depth.
fn write_loops(out: &mut String, directive: StageDirective, depth: usize) -> usize {
    let accel = directive.device == Device::Accelerator;
    match (directive.partition, accel) {
        (Partition::Tiles { width, height }, true) => {
            line(out, depth, "gpu_block y.yo:");
            line(out, depth + 1, "gpu_block x.xo:");
            line(out, depth + 2, &format!("gpu_thread y.yi in [0, {height}):"));
            line(out, depth + 3, &format!("gpu_thread x.xi in [0, {width}):"));
            depth + 4
        }
        (Partition::Tiles { width, height }, false) => {
            line(out, depth, &format!("parallel for tile in tiles({width}x{height}):"));
            line(out, depth + 1, &format!("for y.yi in [0, {height}):"));
            line(out, depth + 2, &format!("for x.xi in [0, {width}):"));
            depth + 3
        }
        (_, true) => {
            line(out, depth, "gpu_thread y:");
            line(out, depth + 1, "gpu_thread x:");
            depth + 2
        }
        (partition, false) => {
            let row = if partition == Partition::Rows {
                "parallel for y:"
            } else {
                "for y:"
            };
            line(out, depth, row);
            match directive.vector_width {
                Some(width) => {
                    line(out, depth + 1, "for x.xo:");
                    line(out, depth + 2, &format!("vectorized x.xi in [0, {width}):"));
                    depth + 3
                }
                None => {
                    line(out, depth + 1, "for x:");
                    depth + 2
                }
            }
        }
    }
}
