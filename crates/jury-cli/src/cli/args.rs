use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "jury",
    version,
    about = "Score sampler outputs with a panel of LLM judges and rank the samplers"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Judge a samples file and write a benchmark artifact
    Judge(JudgeArgs),
    /// Recompute statistics and rankings from an existing artifact
    Analyze(AnalyzeArgs),
    /// Check a config file without calling any judge
    Validate(ValidateArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ProviderArg {
    OpenaiCompat,
    Fake,
}

#[derive(Parser, Debug)]
pub struct JudgeArgs {
    #[arg(long, short = 'c', default_value = "jury.yaml")]
    pub config: PathBuf,

    /// JSON array of samples (prompt, sampler_name, sampler_config, generated_text, repetition_index)
    #[arg(long, short = 's')]
    pub samples: PathBuf,

    #[arg(long, short = 'o', default_value = "jury-results.json")]
    pub out: PathBuf,

    /// Override the judge provider from the config
    #[arg(long, value_enum)]
    pub provider: Option<ProviderArg>,

    /// Override `parallel_samples` from the config
    #[arg(long)]
    pub parallel: Option<usize>,

    /// Skip the console summary
    #[arg(long)]
    pub quiet: bool,
}

#[derive(Parser, Debug)]
pub struct AnalyzeArgs {
    /// Artifact written by `jury judge`
    pub artifact: PathBuf,

    /// Print the recomputed verdict as JSON instead of the summary
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    #[arg(long, short = 'c', default_value = "jury.yaml")]
    pub config: PathBuf,
}
