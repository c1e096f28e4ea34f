//! wgpu-based accelerator engine (Metal / Vulkan / DX12).

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use tracing::{debug, info};
use wgpu::util::DeviceExt;

use crate::consts::ACCELERATOR_TILE;
use crate::error::{NlmError, Result};
use crate::graph::{AcceleratorKernel, KernelKind, StageGraph};
use crate::image::{Domain, Image};
use crate::schedule::{Device, Partition, Schedule};

use super::backend::{prepare_stages, Artifact};
use super::buffer::{from_words, to_words, DeviceAllocation, ImageBuffer};
use super::cpu::CpuEngine;
use super::{CompiledPipeline, ExecutionEngine};

// ---------------------------------------------------------------------------
// Uniform parameter struct (must match the WGSL `Params` layout exactly)
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct LaunchParams {
    image_width: u32,
    image_height: u32,
    channels: u32,
    rounding: u32,
    origin_x: i32,
    origin_y: i32,
    out_width: u32,
    out_height: u32,
    patch_size: u32,
    search_window: u32,
    strength: f32,
    _pad: u32,
}

const fn div_ceil(a: u32, b: u32) -> u32 {
    (a + b - 1) / b
}

/// Binding slots at group(0).
const SLOT_INPUT: u32 = 0;
const SLOT_LOOKUP: u32 = 1;
const SLOT_OUTPUT: u32 = 2;
const SLOT_PARAMS: u32 = 3;

fn shader_source(kind: KernelKind) -> &'static str {
    match kind {
        KernelKind::NonlocalMeans => include_str!("shaders/nonlocal_means.wgsl"),
        KernelKind::ColorToGray => include_str!("shaders/color_to_gray.wgsl"),
    }
}

/// Slots bound for a kernel. Pipelines use derived layouts, which only hold
/// the bindings `main` reads, so this must match the shader exactly.
fn bound_slots(kind: KernelKind) -> &'static [u32] {
    match kind {
        KernelKind::NonlocalMeans => &[SLOT_INPUT, SLOT_LOOKUP, SLOT_OUTPUT, SLOT_PARAMS],
        KernelKind::ColorToGray => &[SLOT_INPUT, SLOT_OUTPUT, SLOT_PARAMS],
    }
}

fn origin(coordinate: i64) -> Result<i32> {
    i32::try_from(coordinate).map_err(|_| {
        NlmError::RuntimeFailure(format!(
            "domain origin {coordinate} does not fit the kernel's 32-bit coordinates"
        ))
    })
}

/// Device state bound to one compiled pipeline.
pub(crate) struct WgpuArtifact {
    pipeline: wgpu::ComputePipeline,
    input: ImageBuffer,
    lookup: Option<wgpu::Buffer>,
    kernel: AcceleratorKernel,
}

// ---------------------------------------------------------------------------
// WgpuEngine
// ---------------------------------------------------------------------------

pub struct WgpuEngine {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    adapter_name: String,
    nonlocal_means_pipeline: wgpu::ComputePipeline,
    color_to_gray_pipeline: wgpu::ComputePipeline,
    // Host-targeted compiles on this engine run here.
    host: CpuEngine,
}

impl WgpuEngine {
    pub fn new() -> std::result::Result<Self, String> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| format!("No suitable GPU adapter found: {e}"))?;

        let adapter_name = adapter.get_info().name.clone();
        info!("GPU adapter: {adapter_name}");

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("nlmeans"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            },
        ))
        .map_err(|e| format!("Failed to create GPU device: {e}"))?;

        let device: Arc<wgpu::Device> = Arc::new(device);
        let queue: Arc<wgpu::Queue> = Arc::new(queue);

        let mk = |label, kind| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(shader_source(kind).into()),
            })
        };
        let nlm_mod = mk("nonlocal_means", KernelKind::NonlocalMeans);
        let gray_mod = mk("color_to_gray", KernelKind::ColorToGray);

        let pipe = |label, module: &wgpu::ShaderModule| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: None,
                module,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            })
        };

        Ok(Self {
            adapter_name,
            nonlocal_means_pipeline: pipe("nonlocal_means", &nlm_mod),
            color_to_gray_pipeline: pipe("color_to_gray", &gray_mod),
            device,
            queue,
            host: CpuEngine,
        })
    }

    // --- Buffer helpers ---

    fn create_storage<T: Pod>(&self, data: &[T]) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: None,
                contents: bytemuck::cast_slice(data),
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
            })
    }

    fn create_storage_uninit(&self, byte_size: u64) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: None,
            size: byte_size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn create_uniform<T: Pod>(&self, data: &T) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: None,
                contents: bytemuck::bytes_of(data),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            })
    }

    /// Copy a storage buffer back through a staging buffer. Waits for every
    /// submitted dispatch that writes it.
    fn download_words(&self, buffer: &wgpu::Buffer) -> Result<Vec<u32>> {
        let size = buffer.size();
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: None,
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut enc = self.device.create_command_encoder(&Default::default());
        enc.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
        self.queue.submit(std::iter::once(enc.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        slice.map_async(wgpu::MapMode::Read, move |r| {
            tx.send(r).ok();
        });
        self.device.poll(wgpu::PollType::wait_indefinitely()).ok();
        rx.recv()
            .map_err(|e| NlmError::RuntimeFailure(format!("GPU channel closed: {e}")))?
            .map_err(|e| NlmError::RuntimeFailure(format!("Buffer mapping failed: {e}")))?;

        let data = slice.get_mapped_range();
        let result: Vec<u32> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        staging.unmap();
        Ok(result)
    }

    /// Dispatch a single compute pass with one bind group at group(0).
    fn dispatch(
        &self,
        pipeline: &wgpu::ComputePipeline,
        entries: &[wgpu::BindGroupEntry],
        workgroups: (u32, u32, u32),
    ) {
        let layout = pipeline.get_bind_group_layout(0);
        let bg = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout: &layout,
            entries,
        });
        let mut enc = self.device.create_command_encoder(&Default::default());
        {
            let mut pass = enc.begin_compute_pass(&Default::default());
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bg, &[]);
            pass.dispatch_workgroups(workgroups.0, workgroups.1, workgroups.2);
        }
        self.queue.submit(std::iter::once(enc.finish()));
    }

    fn max_binding_bytes(&self) -> u64 {
        self.device.limits().max_storage_buffer_binding_size as u64
    }
}

impl ExecutionEngine for WgpuEngine {
    fn name(&self) -> &str {
        &self.adapter_name
    }

    fn accelerator_available(&self) -> bool {
        true
    }

    fn compile(
        &self,
        graph: Arc<dyn StageGraph>,
        schedule: &Schedule,
        device: Device,
    ) -> Result<CompiledPipeline> {
        if device == Device::Host {
            return self.host.compile(graph, schedule, device);
        }

        let cache = prepare_stages(&*graph, schedule, device)?;
        let kernel = graph.accelerator_kernel().ok_or_else(|| {
            NlmError::CompileFailure(format!(
                "pipeline '{}' has no accelerator kernel",
                graph.name()
            ))
        })?;

        let tiling = schedule.directive(graph.output()).partition;
        let tile = Partition::Tiles {
            width: ACCELERATOR_TILE,
            height: ACCELERATOR_TILE,
        };
        if tiling != tile {
            return Err(NlmError::CompileFailure(format!(
                "accelerator output must be split into {ACCELERATOR_TILE}x{ACCELERATOR_TILE} tiles, got {tiling:?}"
            )));
        }

        let table: Option<Vec<f32>> = match kernel.lookup_table {
            Some(stage) => Some(
                cache
                    .get(stage)
                    .ok_or_else(|| {
                        NlmError::CompileFailure(format!(
                            "kernel reads stage '{stage}' but it is not stored at root"
                        ))
                    })?
                    .iter()
                    .copied()
                    .collect(),
            ),
            None => None,
        };
        if bound_slots(kernel.kind).contains(&SLOT_LOOKUP) != table.is_some() {
            return Err(NlmError::CompileFailure(format!(
                "kernel {:?} does not match its lookup table binding",
                kernel.kind
            )));
        }

        let input_bytes = (graph.input().data().len() * 4) as u64;
        if input_bytes > self.max_binding_bytes() {
            return Err(NlmError::CompileFailure(format!(
                "input of {input_bytes} bytes exceeds the device storage binding limit"
            )));
        }

        let pipeline = match kernel.kind {
            KernelKind::NonlocalMeans => self.nonlocal_means_pipeline.clone(),
            KernelKind::ColorToGray => self.color_to_gray_pipeline.clone(),
        };

        let mut input = ImageBuffer::new(graph.input().clone());
        input.copy_host_to_device(self)?;
        let lookup = table.as_deref().map(|t| self.create_storage(t));

        debug!(
            pipeline = graph.name(),
            kernel = ?kernel.kind,
            lookup = table.as_ref().map_or(0, Vec::len),
            "Compiled accelerator kernel"
        );

        let artifact = WgpuArtifact {
            pipeline,
            input,
            lookup,
            kernel,
        };
        Ok(CompiledPipeline::new(
            graph,
            schedule.clone(),
            device,
            cache,
            Artifact::Wgpu(Box::new(artifact)),
        ))
    }

    fn realize(&self, compiled: &CompiledPipeline, domain: Domain) -> Result<ImageBuffer> {
        let artifact = match &compiled.artifact {
            Artifact::Host => return self.host.realize(compiled, domain),
            Artifact::Wgpu(artifact) => artifact,
        };
        if domain.is_empty() {
            return Err(NlmError::InvalidDimensions {
                width: domain.width,
                height: domain.height,
            });
        }

        let out_bytes = (domain.pixel_count() * 4) as u64;
        if out_bytes > self.max_binding_bytes() {
            return Err(NlmError::RuntimeFailure(format!(
                "output of {out_bytes} bytes exceeds the device storage binding limit"
            )));
        }

        let input = match artifact.input.device()? {
            DeviceAllocation::Wgpu(buffer) => buffer,
            DeviceAllocation::Mirror(_) => {
                return Err(NlmError::RuntimeFailure(
                    "kernel input was not uploaded to the GPU".into(),
                ))
            }
        };

        let (w, h) = (domain.width as u32, domain.height as u32);
        let image = compiled.graph().input();
        let kernel = &artifact.kernel;
        let params = LaunchParams {
            image_width: image.width() as u32,
            image_height: image.height() as u32,
            channels: image.channels() as u32,
            rounding: kernel.rounding.code(),
            origin_x: origin(domain.x)?,
            origin_y: origin(domain.y)?,
            out_width: w,
            out_height: h,
            patch_size: kernel.patch_size,
            search_window: kernel.search_window,
            strength: kernel.strength,
            _pad: 0,
        };

        info!(
            pipeline = compiled.graph().name(),
            width = w,
            height = h,
            "Dispatching accelerator kernel"
        );

        let output = self.create_storage_uninit(out_bytes);
        let uniform = self.create_uniform(&params);
        let mut entries = Vec::with_capacity(4);
        for &slot in bound_slots(kernel.kind) {
            let buffer = match slot {
                SLOT_INPUT => input,
                SLOT_OUTPUT => &output,
                SLOT_PARAMS => &uniform,
                _ => artifact.lookup.as_ref().ok_or_else(|| {
                    NlmError::RuntimeFailure("kernel lookup table was not uploaded".into())
                })?,
            };
            entries.push(wgpu::BindGroupEntry {
                binding: slot,
                resource: buffer.as_entire_binding(),
            });
        }
        self.dispatch(
            &artifact.pipeline,
            &entries,
            (
                div_ceil(w, ACCELERATOR_TILE),
                div_ceil(h, ACCELERATOR_TILE),
                1,
            ),
        );

        ImageBuffer::from_device(
            DeviceAllocation::Wgpu(output),
            domain.width,
            domain.height,
            1,
        )
    }

    fn upload(&self, image: &Image) -> Result<DeviceAllocation> {
        Ok(DeviceAllocation::Wgpu(self.create_storage(&to_words(image))))
    }

    fn download(
        &self,
        allocation: &DeviceAllocation,
        width: usize,
        height: usize,
        channels: usize,
    ) -> Result<Image> {
        match allocation {
            DeviceAllocation::Wgpu(buffer) => {
                let words = self.download_words(buffer)?;
                from_words(&words, width, height, channels)
            }
            DeviceAllocation::Mirror(words) => from_words(words, width, height, channels),
        }
    }
}
