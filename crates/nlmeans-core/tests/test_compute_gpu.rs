#![cfg(feature = "gpu")]

mod common;

use nlmeans_core::compute::{create_engine, DevicePreference, ExecutionEngine};
use nlmeans_core::graph::color_to_gray::ColorToGrayParams;
use nlmeans_core::graph::nonlocal_means::NonlocalMeansParams;
use nlmeans_core::image::{synthetic_noisy_image, Domain};
use nlmeans_core::pipeline::{ColorToGrayPipeline, NonlocalMeansPipeline, Pipeline};
use nlmeans_core::schedule::Device;

use common::{checkerboard, rgb_gradient, shared};

fn max_diff(a: &[u8], b: &[u8]) -> u8 {
    a.iter().zip(b).map(|(x, y)| x.abs_diff(*y)).max().unwrap_or(0)
}

#[test]
fn gpu_nonlocal_means_matches_host() {
    let engine = create_engine(&DevicePreference::Gpu);
    if !engine.accelerator_available() {
        return; // skip if no GPU available
    }

    // 37x37 is not a multiple of the 16x16 tile.
    let image = shared(synthetic_noisy_image(37, 20.0, 5).unwrap());
    let domain = Domain::of(&image);
    let params = NonlocalMeansParams {
        patch_size: 3,
        search_window_size: 7,
        ..Default::default()
    };

    let mut host = NonlocalMeansPipeline::build(image.clone(), params.clone()).unwrap();
    host.schedule_for_cpu();
    let expected = host.output_stage().realize_to_host(engine.as_ref(), domain).unwrap();

    let mut gpu = NonlocalMeansPipeline::build(image, params).unwrap();
    assert!(gpu.schedule_for_gpu(engine.as_ref()));
    assert_eq!(gpu.device(), Device::Accelerator);
    let actual = gpu.output_stage().realize_to_host(engine.as_ref(), domain).unwrap();

    let diff = max_diff(&expected.to_raw(), &actual.to_raw());
    assert!(diff <= 1, "GPU and host outputs differ by {diff}");
}

#[test]
fn gpu_output_is_device_owned_until_copied() {
    let engine = create_engine(&DevicePreference::Gpu);
    if !engine.accelerator_available() {
        return;
    }

    let image = shared(checkerboard(4, 4, 10, 200));
    let mut pipeline = NonlocalMeansPipeline::build(
        image.clone(),
        NonlocalMeansParams {
            patch_size: 3,
            search_window_size: 3,
            ..Default::default()
        },
    )
    .unwrap();
    assert!(pipeline.schedule_for_gpu(engine.as_ref()));

    let mut buffer = pipeline
        .output_stage()
        .realize(engine.as_ref(), Domain::of(&image))
        .unwrap();
    assert!(buffer.is_device_dirty());
    assert!(buffer.host().is_err());

    buffer.copy_device_to_host(engine.as_ref()).unwrap();
    let out = buffer.into_host().unwrap();
    assert!(out.to_raw().iter().all(|v| (10..=200).contains(v)));
}

#[test]
fn gpu_color_to_gray_matches_host() {
    let engine = create_engine(&DevicePreference::Gpu);
    if !engine.accelerator_available() {
        return;
    }

    let image = shared(rgb_gradient(33, 18));
    let domain = Domain::of(&image);

    let mut host = ColorToGrayPipeline::build(image.clone(), ColorToGrayParams::default()).unwrap();
    host.schedule_for_cpu();
    let expected = host.output_stage().realize_to_host(engine.as_ref(), domain).unwrap();

    let mut gpu = ColorToGrayPipeline::build(image, ColorToGrayParams::default()).unwrap();
    assert!(gpu.schedule_for_gpu(engine.as_ref()));
    let actual = gpu.output_stage().realize_to_host(engine.as_ref(), domain).unwrap();

    let diff = max_diff(&expected.to_raw(), &actual.to_raw());
    assert!(diff <= 1, "GPU and host outputs differ by {diff}");
}
