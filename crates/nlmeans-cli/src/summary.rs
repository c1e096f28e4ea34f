use console::Style;
use nlmeans_core::pipeline::{PipelineKind, RunConfig, RunOutcome};

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_run_summary(config: &RunConfig, engine_name: &str) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Non-local Means"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(15)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Input"),
        s.path.apply_to(config.input.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(config.output.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Engine"),
        s.method.apply_to(engine_name)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Pipeline"),
        s.method.apply_to(config.pipeline)
    );
    println!();

    match config.pipeline {
        PipelineKind::NonlocalMeans => {
            let p = &config.denoise;
            println!("  {}", s.header.apply_to("Denoise"));
            println!(
                "    {:<16}{}",
                s.label.apply_to("Patch size"),
                s.value.apply_to(p.patch_size)
            );
            println!(
                "    {:<16}{}",
                s.label.apply_to("Search window"),
                s.value.apply_to(p.search_window_size)
            );
            println!("    {:<16}{}", s.label.apply_to("h"), s.value.apply_to(p.h));
            println!(
                "    {:<16}{}",
                s.label.apply_to("Sigma"),
                s.value.apply_to(p.weighing_gaussian_sigma)
            );
            println!(
                "    {:<16}{}",
                s.label.apply_to("Rounding"),
                s.value.apply_to(format!("{:?}", p.rounding))
            );
        }
        PipelineKind::ColorToGray => {
            println!("  {}", s.header.apply_to("Color to gray"));
            println!(
                "    {:<16}{}",
                s.label.apply_to("Rounding"),
                s.value.apply_to(format!("{:?}", config.gray.rounding))
            );
        }
    }
    println!();
}

pub fn print_outcome(outcome: &RunOutcome) {
    let s = Styles::new();

    println!();
    println!(
        "  {:<14}{}",
        s.label.apply_to("Device"),
        s.method.apply_to(outcome.device)
    );
    println!(
        "  {:<14}{}x{}",
        s.label.apply_to("Size"),
        outcome.image.width(),
        outcome.image.height()
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Execution"),
        s.value
            .apply_to(format!("{:.4} s", outcome.realize_time.as_secs_f64()))
    );
}
