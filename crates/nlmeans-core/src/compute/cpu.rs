use std::sync::Arc;

use rayon::prelude::*;
use tracing::info;

use crate::error::{NlmError, Result};
use crate::graph::StageGraph;
use crate::image::{Domain, Image};
use crate::schedule::{Device, Partition, Schedule};

use super::backend::{prepare_stages, Artifact};
use super::buffer::{from_words, to_words, DeviceAllocation, ImageBuffer};
use super::{CompiledPipeline, ExecutionEngine};

/// CPU engine using Rayon for parallelism.
pub struct CpuEngine;

impl ExecutionEngine for CpuEngine {
    fn name(&self) -> &str {
        "CPU/Rayon"
    }

    fn compile(
        &self,
        graph: Arc<dyn StageGraph>,
        schedule: &Schedule,
        device: Device,
    ) -> Result<CompiledPipeline> {
        if device == Device::Accelerator {
            return Err(NlmError::CompileFailure(
                "CPU engine has no accelerator target".into(),
            ));
        }
        let cache = prepare_stages(&*graph, schedule, device)?;
        Ok(CompiledPipeline::new(
            graph,
            schedule.clone(),
            device,
            cache,
            Artifact::Host,
        ))
    }

    fn realize(&self, compiled: &CompiledPipeline, domain: Domain) -> Result<ImageBuffer> {
        realize_on_host(compiled, domain).map(ImageBuffer::new)
    }

    fn upload(&self, image: &Image) -> Result<DeviceAllocation> {
        Ok(DeviceAllocation::Mirror(to_words(image)))
    }

    fn download(
        &self,
        allocation: &DeviceAllocation,
        width: usize,
        height: usize,
        channels: usize,
    ) -> Result<Image> {
        match allocation {
            DeviceAllocation::Mirror(words) => from_words(words, width, height, channels),
            #[cfg(feature = "gpu")]
            DeviceAllocation::Wgpu(_) => Err(NlmError::RuntimeFailure(
                "CPU engine cannot read GPU buffers".into(),
            )),
        }
    }
}

/// Evaluate the output stage of a host-compiled pipeline over `domain`.
///
/// Rows (or tiles) are independent: workers only read the shared input and
/// root stages and write disjoint parts of the output.
pub(crate) fn realize_on_host(compiled: &CompiledPipeline, domain: Domain) -> Result<Image> {
    if compiled.device() != Device::Host {
        return Err(NlmError::RuntimeFailure(
            "pipeline was compiled for the accelerator".into(),
        ));
    }
    if domain.is_empty() {
        return Err(NlmError::InvalidDimensions {
            width: domain.width,
            height: domain.height,
        });
    }

    let graph: &dyn StageGraph = &**compiled.graph();
    let schedule = compiled.schedule();
    let cache = compiled.cache();
    let directive = schedule.directive(graph.output());
    let lanes = directive.vector_width.unwrap_or(1) as usize;
    let (w, h) = (domain.width, domain.height);

    info!(
        pipeline = graph.name(),
        width = w,
        height = h,
        partition = ?directive.partition,
        "Realizing on host"
    );

    let eval = |col: usize, row: usize| {
        graph.evaluate(domain.x + col as i64, domain.y + row as i64, schedule, cache)
    };

    let mut samples = vec![0u8; w * h];
    match directive.partition {
        Partition::Serial => {
            for (row, out) in samples.chunks_mut(w).enumerate() {
                fill_row(out, row, lanes, &eval);
            }
        }
        Partition::Rows => {
            samples
                .par_chunks_mut(w)
                .enumerate()
                .for_each(|(row, out)| fill_row(out, row, lanes, &eval));
        }
        Partition::Tiles { width, height } => {
            let (tw, th) = (width as usize, height as usize);
            let origins: Vec<(usize, usize)> = (0..h)
                .step_by(th)
                .flat_map(|ty| (0..w).step_by(tw).map(move |tx| (tx, ty)))
                .collect();

            let tiles: Vec<(usize, usize, usize, Vec<u8>)> = origins
                .into_par_iter()
                .map(|(tx, ty)| {
                    let cols = tw.min(w - tx);
                    let rows = th.min(h - ty);
                    let mut tile = vec![0u8; cols * rows];
                    for (r, out) in tile.chunks_mut(cols).enumerate() {
                        for (c, v) in out.iter_mut().enumerate() {
                            *v = eval(tx + c, ty + r);
                        }
                    }
                    (tx, ty, cols, tile)
                })
                .collect();

            for (tx, ty, cols, tile) in tiles {
                for (r, src) in tile.chunks(cols).enumerate() {
                    let start = (ty + r) * w + tx;
                    samples[start..start + cols].copy_from_slice(src);
                }
            }
        }
    }

    Image::from_raw(w, h, 1, samples)
}

/// Fill one output row, `lanes` adjacent columns at a time.
fn fill_row<F>(out: &mut [u8], row: usize, lanes: usize, eval: &F)
where
    F: Fn(usize, usize) -> u8,
{
    for (chunk, lane) in out.chunks_mut(lanes).enumerate() {
        let base = chunk * lanes;
        for (i, v) in lane.iter_mut().enumerate() {
            *v = eval(base + i, row);
        }
    }
}
