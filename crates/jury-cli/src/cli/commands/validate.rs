use crate::cli::args::ValidateArgs;
use crate::exit_codes;
use jury_core::config::BenchConfig;

pub fn run(args: ValidateArgs) -> anyhow::Result<i32> {
    let cfg = BenchConfig::load(&args.config)?;
    let catalog = cfg.catalog()?;
    println!(
        "Config OK: {} judge(s), {} criteria, consensus={}, parallel_samples={}",
        cfg.judge.models.len(),
        catalog.len(),
        cfg.consensus_method()?,
        cfg.parallel_samples
    );
    for judge in &cfg.judge.models {
        let mode = if judge.uses_structured_output() {
            "structured"
        } else {
            "free-form"
        };
        println!("  - {} ({})", judge.model, mode);
    }
    Ok(exit_codes::SUCCESS)
}
