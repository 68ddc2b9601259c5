use crate::cli::args::{JudgeArgs, ProviderArg};
use crate::exit_codes;
use anyhow::Context;
use jury_core::config::{BenchConfig, ProviderKind};
use jury_core::providers::llm::{FakeClient, JudgeClient, OpenAiCompatClient};
use jury_core::report::console::print_summary;
use jury_core::report::json::write_json;
use jury_core::report::BenchmarkArtifact;
use jury_core::{analyze, AggregateError, BenchmarkRunner, JudgePanel, SampleInput};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

pub async fn run(args: JudgeArgs) -> anyhow::Result<i32> {
    let mut cfg = BenchConfig::load(&args.config)?;
    if let Some(p) = args.provider {
        cfg.judge.provider = match p {
            ProviderArg::OpenaiCompat => ProviderKind::OpenaiCompat,
            ProviderArg::Fake => ProviderKind::Fake,
        };
    }
    if let Some(n) = args.parallel {
        cfg.parallel_samples = n;
    }
    cfg.validate().context("invalid command-line overrides")?;

    let inputs = read_samples(&args.samples)?;
    let catalog = cfg.catalog()?;
    let client: Arc<dyn JudgeClient> = match cfg.judge.provider {
        ProviderKind::Fake => Arc::new(FakeClient::uniform(&catalog, cfg.judge.fake_score)),
        ProviderKind::OpenaiCompat => Arc::new(
            OpenAiCompatClient::new(cfg.client_config()).context("failed to build judge client")?,
        ),
    };
    info!(
        provider = client.provider_name(),
        judges = cfg.judge.models.len(),
        criteria = catalog.len(),
        "judge panel ready"
    );

    let panel = JudgePanel::new(cfg.panel_config()?, catalog, client)?;
    let runner = BenchmarkRunner::new(panel, cfg.penalties.clone())
        .with_parallel_samples(cfg.parallel_samples);

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing in-flight samples");
            let _ = cancel_tx.send(true);
        }
    });

    let outcome = runner.run(inputs, cancel_rx).await?;
    let report = match outcome.aggregator.compute() {
        Ok(r) => r,
        Err(AggregateError::NoData) => {
            eprintln!("No samples were judged; nothing to report.");
            return Ok(if outcome.cancelled {
                exit_codes::CANCELLED
            } else {
                exit_codes::NO_DATA
            });
        }
        Err(e) => return Err(e.into()),
    };
    let verdict = analyze(&report)?;

    let artifact = BenchmarkArtifact::new(
        cfg.benchmark_name,
        cfg.model_name,
        outcome.aggregator.into_samples(),
        verdict,
        outcome.counts,
    );
    write_json(&artifact, &args.out)?;
    info!(path = %args.out.display(), run_id = %artifact.run_id, "wrote benchmark artifact");

    if !args.quiet {
        print_summary(&artifact);
    }

    Ok(if outcome.cancelled {
        exit_codes::CANCELLED
    } else {
        exit_codes::SUCCESS
    })
}

fn read_samples(path: &Path) -> anyhow::Result<Vec<SampleInput>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read samples {}", path.display()))?;
    let inputs: Vec<SampleInput> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse samples {}", path.display()))?;
    Ok(inputs)
}
