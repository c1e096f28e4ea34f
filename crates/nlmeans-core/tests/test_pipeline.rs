mod common;

use std::sync::Arc;

use nlmeans_core::compute::cpu::CpuEngine;
use nlmeans_core::compute::{create_engine, DevicePreference, ExecutionEngine};
use nlmeans_core::error::NlmError;
use nlmeans_core::graph::color_to_gray::ColorToGrayParams;
use nlmeans_core::graph::nonlocal_means::NonlocalMeansParams;
use nlmeans_core::graph::{RoundingPolicy, StageGraph, StageId};
use nlmeans_core::image::{Domain, Image};
use nlmeans_core::pipeline::{
    create_pipeline, process, schedule_pipeline, ColorToGrayPipeline, NonlocalMeansPipeline,
    Pipeline, PipelineKind, PipelineParams,
};
use nlmeans_core::schedule::{Device, Partition, Schedule, StageDirective};

use common::{constant_image, rgb_gradient, shared, solid_rgb, textured_image};

fn small_params() -> PipelineParams {
    PipelineParams {
        denoise: NonlocalMeansParams {
            patch_size: 3,
            search_window_size: 5,
            h: 0.3,
            ..Default::default()
        },
        gray: ColorToGrayParams::default(),
    }
}

fn realize_with(graph: Arc<dyn StageGraph>, schedule: &Schedule) -> Image {
    let engine = CpuEngine;
    let compiled = engine.compile(graph.clone(), schedule, Device::Host).unwrap();
    let domain = Domain::of(graph.input());
    engine.realize(&compiled, domain).unwrap().into_host().unwrap()
}

// ---------------------------------------------------------------------------
// Selection by name
// ---------------------------------------------------------------------------

#[test]
fn test_pipeline_kind_parses_names() {
    assert_eq!("nonlocalmeans".parse::<PipelineKind>().unwrap(), PipelineKind::NonlocalMeans);
    assert_eq!("colortogray".parse::<PipelineKind>().unwrap(), PipelineKind::ColorToGray);
    assert_eq!(PipelineKind::ColorToGray.to_string(), "colortogray");
    let err = "sharpen".parse::<PipelineKind>().unwrap_err();
    assert!(matches!(err, NlmError::UnknownPipeline(ref name) if name == "sharpen"));
    assert!(err.is_construction());
}

#[test]
fn test_create_pipeline_by_kind() {
    let gray = create_pipeline(
        PipelineKind::NonlocalMeans,
        shared(constant_image(4, 4, 1)),
        &small_params(),
    )
    .unwrap();
    assert_eq!(gray.name(), "nonlocalmeans");
    assert_eq!(gray.output_stage().stage(), StageId::Output);

    let color = create_pipeline(
        PipelineKind::ColorToGray,
        shared(solid_rgb(4, 4, [1, 2, 3])),
        &small_params(),
    )
    .unwrap();
    assert_eq!(color.name(), "colortogray");
    assert_eq!(color.output_stage().stage(), StageId::Gray);
}

#[test]
fn test_wrong_channel_count_is_construction_error() {
    let err = create_pipeline(
        PipelineKind::NonlocalMeans,
        shared(solid_rgb(4, 4, [1, 2, 3])),
        &small_params(),
    )
    .err()
    .unwrap();
    assert!(err.is_construction());

    let err = create_pipeline(
        PipelineKind::ColorToGray,
        shared(constant_image(4, 4, 1)),
        &small_params(),
    )
    .err()
    .unwrap();
    assert!(matches!(err, NlmError::ChannelMismatch { .. }));
}

// ---------------------------------------------------------------------------
// Schedule selection
// ---------------------------------------------------------------------------

#[test]
fn test_gpu_schedule_fails_without_accelerator() {
    let mut pipeline =
        NonlocalMeansPipeline::build(shared(textured_image(8, 8)), NonlocalMeansParams::default())
            .unwrap();
    assert!(!pipeline.schedule_for_gpu(&CpuEngine));
    assert_eq!(pipeline.schedule(), &Schedule::new());
    assert_eq!(pipeline.device(), Device::Host);
}

#[test]
fn test_selector_falls_back_to_host() {
    for preference in [DevicePreference::Auto, DevicePreference::Gpu, DevicePreference::Cpu] {
        let mut pipeline =
            create_pipeline(PipelineKind::NonlocalMeans, shared(textured_image(8, 8)), &small_params())
                .unwrap();
        let device = schedule_pipeline(pipeline.as_mut(), &CpuEngine, preference);
        assert_eq!(device, Device::Host);
        assert_eq!(pipeline.schedule(), &NonlocalMeansPipeline::cpu_schedule());
    }
}

#[test]
fn test_cpu_preference_never_uses_accelerator() {
    let engine = create_engine(&DevicePreference::Cpu);
    assert!(!engine.accelerator_available());
    let mut pipeline =
        create_pipeline(PipelineKind::ColorToGray, shared(rgb_gradient(5, 5)), &small_params())
            .unwrap();
    let device = schedule_pipeline(pipeline.as_mut(), engine.as_ref(), DevicePreference::Cpu);
    assert_eq!(device, Device::Host);
    assert_eq!(pipeline.schedule(), &ColorToGrayPipeline::cpu_schedule());
}

// ---------------------------------------------------------------------------
// Compile failures
// ---------------------------------------------------------------------------

#[test]
fn test_host_engine_rejects_accelerator_target() {
    let pipeline =
        NonlocalMeansPipeline::build(shared(textured_image(8, 8)), NonlocalMeansParams::default())
            .unwrap();
    let err = CpuEngine
        .compile(pipeline.graph(), &NonlocalMeansPipeline::gpu_schedule(), Device::Accelerator)
        .err()
        .unwrap();
    assert!(matches!(err, NlmError::CompileFailure(_)));

    let err = CpuEngine
        .compile(pipeline.graph(), &NonlocalMeansPipeline::gpu_schedule(), Device::Host)
        .err()
        .unwrap();
    assert!(matches!(err, NlmError::CompileFailure(_)));
}

#[test]
fn test_compile_rejects_unknown_stage() {
    let pipeline =
        NonlocalMeansPipeline::build(shared(textured_image(4, 4)), NonlocalMeansParams::default())
            .unwrap();
    let schedule = Schedule::new().with(StageId::Gray, StageDirective::root());
    let err = CpuEngine.compile(pipeline.graph(), &schedule, Device::Host).err().unwrap();
    assert!(matches!(err, NlmError::CompileFailure(_)));
}

#[test]
fn test_compile_rejects_unbounded_root_stage() {
    let pipeline =
        NonlocalMeansPipeline::build(shared(textured_image(4, 4)), NonlocalMeansParams::default())
            .unwrap();
    let schedule = Schedule::new().with(StageId::Weight, StageDirective::root());
    let err = CpuEngine.compile(pipeline.graph(), &schedule, Device::Host).err().unwrap();
    assert!(matches!(err, NlmError::CompileFailure(_)));
}

#[test]
fn test_compile_rejects_degenerate_partitions() {
    let pipeline =
        NonlocalMeansPipeline::build(shared(textured_image(4, 4)), NonlocalMeansParams::default())
            .unwrap();
    let empty_tile = Schedule::new().with(
        StageId::Output,
        StageDirective::root().partitioned(Partition::Tiles { width: 0, height: 4 }),
    );
    assert!(CpuEngine.compile(pipeline.graph(), &empty_tile, Device::Host).is_err());

    let zero_lanes = Schedule::new().with(StageId::Output, StageDirective::root().vectorized(0));
    assert!(CpuEngine.compile(pipeline.graph(), &zero_lanes, Device::Host).is_err());
}

#[test]
fn test_realize_empty_domain_fails() {
    let pipeline =
        NonlocalMeansPipeline::build(shared(textured_image(4, 4)), NonlocalMeansParams::default())
            .unwrap();
    let err = pipeline
        .output_stage()
        .realize(&CpuEngine, Domain::new(0, 0, 0, 4))
        .err()
        .unwrap();
    assert!(matches!(err, NlmError::InvalidDimensions { .. }));
}

// ---------------------------------------------------------------------------
// Schedules never change values
// ---------------------------------------------------------------------------

#[test]
fn test_host_schedules_agree() {
    let pipeline = NonlocalMeansPipeline::build(
        shared(textured_image(21, 13)),
        NonlocalMeansParams {
            patch_size: 3,
            search_window_size: 7,
            h: 0.4,
            ..Default::default()
        },
    )
    .unwrap();
    let graph = pipeline.graph();

    let reference = realize_with(graph.clone(), &Schedule::new());
    let schedules = [
        NonlocalMeansPipeline::cpu_schedule(),
        Schedule::new().with(StageId::Gaussian, StageDirective::root()),
        Schedule::new().with(StageId::Weight, StageDirective::at_output()),
        Schedule::new()
            .with(StageId::Gaussian, StageDirective::root())
            .with(
                StageId::Output,
                StageDirective::root().partitioned(Partition::Tiles { width: 8, height: 5 }),
            ),
        Schedule::new().with(
            StageId::Output,
            StageDirective::root().partitioned(Partition::Rows).vectorized(4),
        ),
    ];
    for schedule in &schedules {
        assert_eq!(realize_with(graph.clone(), schedule), reference, "{schedule:?}");
    }
}

#[test]
fn test_realize_matches_direct_evaluation() {
    let image = shared(textured_image(9, 7));
    let mut pipeline = NonlocalMeansPipeline::build(image.clone(), small_params().denoise).unwrap();
    pipeline.schedule_for_cpu();
    let out = pipeline
        .output_stage()
        .realize_to_host(&CpuEngine, Domain::of(&image))
        .unwrap();
    let graph = pipeline.denoise_graph();
    for y in 0..7 {
        for x in 0..9 {
            assert_eq!(out.get(x, y, 0), graph.output(x as i64, y as i64), "({x},{y})");
        }
    }
}

#[test]
fn test_realize_sub_domain() {
    let mut pipeline =
        create_pipeline(PipelineKind::NonlocalMeans, shared(textured_image(10, 8)), &small_params())
            .unwrap();
    pipeline.schedule_for_cpu();
    let stage = pipeline.output_stage();
    let full = stage.realize_to_host(&CpuEngine, Domain::new(0, 0, 10, 8)).unwrap();
    let part = stage.realize_to_host(&CpuEngine, Domain::new(2, 3, 4, 2)).unwrap();
    assert_eq!((part.width(), part.height()), (4, 2));
    for y in 0..2 {
        for x in 0..4 {
            assert_eq!(part.get(x, y, 0), full.get(x + 2, y + 3, 0));
        }
    }
}

#[test]
fn test_rescheduling_keeps_output() {
    let mut pipeline =
        create_pipeline(PipelineKind::NonlocalMeans, shared(textured_image(12, 12)), &small_params())
            .unwrap();
    let domain = Domain::new(0, 0, 12, 12);
    let before = pipeline.output_stage().realize_to_host(&CpuEngine, domain).unwrap();
    pipeline.schedule_for_cpu();
    let after = pipeline.output_stage().realize_to_host(&CpuEngine, domain).unwrap();
    assert_eq!(before, after);
}

// ---------------------------------------------------------------------------
// Color to gray through the engine
// ---------------------------------------------------------------------------

#[test]
fn test_gray_vectorized_rows_with_ragged_width() {
    let image = rgb_gradient(7, 3);
    let mut pipeline =
        ColorToGrayPipeline::build(shared(image.clone()), ColorToGrayParams::default()).unwrap();
    pipeline.schedule_for_cpu();
    let out = pipeline
        .output_stage()
        .realize_to_host(&CpuEngine, Domain::of(&image))
        .unwrap();
    assert_eq!(out.channels(), 1);
    for y in 0..3 {
        for x in 0..7 {
            let r = image.get(x, y, 0) as f32;
            let g = image.get(x, y, 1) as f32;
            let b = image.get(x, y, 2) as f32;
            let expected = RoundingPolicy::Nearest.quantize(0.299 * r + 0.587 * g + 0.114 * b);
            assert_eq!(out.get(x, y, 0), expected, "({x},{y})");
        }
    }
}

#[test]
fn test_process_red_and_white() {
    let engine = CpuEngine;
    for (rgb, expected) in [([255, 0, 0], 76), ([255, 255, 255], 255)] {
        let outcome = process(
            PipelineKind::ColorToGray,
            shared(solid_rgb(3, 2, rgb)),
            &PipelineParams::default(),
            &engine,
            DevicePreference::Auto,
        )
        .unwrap();
        assert_eq!(outcome.device, Device::Host);
        assert!(outcome.image.to_raw().iter().all(|&v| v == expected));
    }
}

#[test]
fn test_process_reports_schedule() {
    let outcome = process(
        PipelineKind::NonlocalMeans,
        shared(constant_image(6, 6, 77)),
        &small_params(),
        &CpuEngine,
        DevicePreference::Cpu,
    )
    .unwrap();
    assert_eq!(outcome.kind, PipelineKind::NonlocalMeans);
    assert!(outcome.loop_nest.contains("produce gaussian:"));
    assert!(outcome.loop_nest.contains("parallel for y:"));
    assert!(outcome.image.to_raw().iter().all(|&v| v == 77));
}
