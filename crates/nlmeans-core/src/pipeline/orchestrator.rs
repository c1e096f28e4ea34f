use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::compute::{DevicePreference, ExecutionEngine};
use crate::error::Result;
use crate::image::{Domain, Image};
use crate::io::{load_image, save_image};

use super::config::{PipelineParams, RunConfig};
use super::types::{NoOpReporter, PipelineKind, PipelineStage, ProgressReporter, RunOutcome};
use super::{create_pipeline, schedule_pipeline};

/// Build, schedule and realize a pipeline over an in-memory image.
///
/// The output covers the full input and is copied back to the host.
pub fn process(
    kind: PipelineKind,
    input: Arc<Image>,
    params: &PipelineParams,
    engine: &dyn ExecutionEngine,
    preference: DevicePreference,
) -> Result<RunOutcome> {
    process_reported(kind, input, params, engine, preference, &NoOpReporter)
}

fn process_reported(
    kind: PipelineKind,
    input: Arc<Image>,
    params: &PipelineParams,
    engine: &dyn ExecutionEngine,
    preference: DevicePreference,
    reporter: &dyn ProgressReporter,
) -> Result<RunOutcome> {
    reporter.begin_stage(PipelineStage::Building);
    let domain = Domain::of(&input);
    let mut pipeline = create_pipeline(kind, input, params)?;
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::Scheduling);
    let device = schedule_pipeline(pipeline.as_mut(), engine, preference);
    let loop_nest = pipeline.schedule().loop_nest(&*pipeline.graph());
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::Realizing);
    let start = Instant::now();
    let image = pipeline.output_stage().realize_to_host(engine, domain)?;
    let realize_time = start.elapsed();
    reporter.finish_stage();

    info!(
        pipeline = %kind,
        device = %device,
        seconds = realize_time.as_secs_f64(),
        "Realization complete"
    );

    Ok(RunOutcome {
        image,
        kind,
        device,
        loop_nest,
        realize_time,
    })
}

/// Run the configured pipeline from input file to output file with a
/// thread-safe progress reporter.
pub fn run_pipeline_reported(
    config: &RunConfig,
    engine: Arc<dyn ExecutionEngine>,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<RunOutcome> {
    reporter.begin_stage(PipelineStage::Loading);
    let input = load_image(&config.input)?;
    info!(
        path = %config.input.display(),
        width = input.width(),
        height = input.height(),
        channels = input.channels(),
        engine = engine.name(),
        "Loaded input"
    );
    reporter.finish_stage();

    let outcome = process_reported(
        config.pipeline,
        Arc::new(input),
        &config.params(),
        engine.as_ref(),
        config.device,
        reporter.as_ref(),
    )?;

    reporter.begin_stage(PipelineStage::Writing);
    save_image(&outcome.image, &config.output)?;
    reporter.finish_stage();

    Ok(outcome)
}

/// Run the configured pipeline from input file to output file.
pub fn run_pipeline(config: &RunConfig, engine: Arc<dyn ExecutionEngine>) -> Result<RunOutcome> {
    run_pipeline_reported(config, engine, Arc::new(NoOpReporter))
}
