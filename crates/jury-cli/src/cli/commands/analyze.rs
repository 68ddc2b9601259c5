use crate::cli::args::AnalyzeArgs;
use crate::exit_codes;
use jury_core::report::console::{format_counts, format_summary};
use jury_core::report::json::read_json;
use jury_core::{analyze, SampleAggregator};
use tracing::warn;

/// Statistics are recomputed from the stored samples rather than trusted.
pub fn run(args: AnalyzeArgs) -> anyhow::Result<i32> {
    let artifact = read_json(&args.artifact)?;

    let mut aggregator = SampleAggregator::new();
    for sample in artifact.samples.iter().cloned() {
        aggregator.add_sample(sample);
    }
    let verdict = analyze(&aggregator.compute()?)?;
    if verdict != artifact.verdict {
        warn!(
            path = %args.artifact.display(),
            "stored verdict differs from the one recomputed from samples"
        );
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    } else {
        println!(
            "{} ({}, {} samples, run {})",
            artifact.benchmark_name,
            artifact.model_name,
            artifact.samples.len(),
            artifact.run_id
        );
        print!("{}", format_summary(&verdict));
        let health = format_counts(&artifact.counts);
        if !health.is_empty() {
            println!("{}", health);
        }
    }
    Ok(exit_codes::SUCCESS)
}
