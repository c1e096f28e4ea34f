use std::path::PathBuf;

use nlmeans_core::compute::DevicePreference;
use nlmeans_core::graph::RoundingPolicy;
use nlmeans_core::pipeline::{PipelineKind, PipelineStage, RunConfig};

#[test]
fn test_default_run_config() {
    let config = RunConfig::default();
    assert_eq!(config.pipeline, PipelineKind::NonlocalMeans);
    assert_eq!(config.device, DevicePreference::Auto);
    assert_eq!(config.denoise.patch_size, 5);
    assert_eq!(config.denoise.search_window_size, 13);
    assert_eq!(config.denoise.h, 0.1);
    assert_eq!(config.denoise.weighing_gaussian_sigma, 1.5);
    assert_eq!(config.denoise.rounding, RoundingPolicy::Nearest);
}

#[test]
fn test_toml_roundtrip() {
    let mut config = RunConfig::default();
    config.pipeline = PipelineKind::ColorToGray;
    config.device = DevicePreference::Cpu;
    config.gray.rounding = RoundingPolicy::Truncate;

    let text = toml::to_string_pretty(&config).unwrap();
    assert!(text.contains("pipeline = \"colortogray\""), "{text}");
    assert!(text.contains("device = \"cpu\""));
    let parsed: RunConfig = toml::from_str(&text).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_partial_toml_fills_defaults() {
    let text = r#"
input = "lena.png"
output = "out.png"

[denoise]
patch_size = 7
h = 0.2
"#;
    let config: RunConfig = toml::from_str(text).unwrap();
    assert_eq!(config.input, PathBuf::from("lena.png"));
    assert_eq!(config.pipeline, PipelineKind::NonlocalMeans);
    assert_eq!(config.denoise.patch_size, 7);
    assert_eq!(config.denoise.search_window_size, 13);
    assert_eq!(config.denoise.h, 0.2);
    assert_eq!(config.params().denoise, config.denoise);
}

#[test]
fn test_unknown_pipeline_name_rejected() {
    let text = "pipeline = \"sharpen\"\n";
    assert!(toml::from_str::<RunConfig>(text).is_err());
}

#[test]
fn test_json_roundtrip() {
    let config = RunConfig::default();
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("\"rounding\":\"nearest\""), "{json}");
    let parsed: RunConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_pipeline_stage_display() {
    assert_eq!(format!("{}", PipelineStage::Realizing), "Realizing output");
    assert_eq!(format!("{}", PipelineStage::Loading), "Loading image");
}
