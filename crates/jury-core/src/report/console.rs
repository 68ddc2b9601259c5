use crate::compare::{BenchmarkVerdict, EffectMagnitude};
use crate::pipeline::RunCounts;
use crate::report::BenchmarkArtifact;
use std::fmt::Write;

const RULE_WIDTH: usize = 70;

/// Ranking, top-two effect size and meta-analysis. Deterministic, unit-testable.
#[must_use]
pub fn format_summary(verdict: &BenchmarkVerdict) -> String {
    let mut out = String::new();
    let ranked = verdict.ranking();

    let _ = writeln!(out, "QUALITY RANKING (with 95% Confidence Intervals):");
    for (rank, s) in ranked.iter().enumerate() {
        let (lo, hi) = s.overall_confidence_interval;
        let _ = writeln!(
            out,
            "  {}. {}: {:.2}/10 [{:.2}-{:.2}]",
            rank + 1,
            s.sampler_name,
            s.overall_mean,
            lo,
            hi
        );
        let _ = writeln!(
            out,
            "     Samples: {}, Prompts: {}, Consistency: {:.2}",
            s.total_samples, s.prompts_covered, s.prompt_consistency
        );
    }

    if let [first, second, ..] = ranked.as_slice() {
        if let Some(d) = verdict.effect_size(&first.sampler_name, &second.sampler_name) {
            let magnitude = EffectMagnitude::from_effect_size(d);
            let verdict_word = if d.abs() > 0.5 {
                "(significant)"
            } else {
                "(not significant)"
            };
            let _ = writeln!(out);
            let _ = writeln!(out, "STATISTICAL SIGNIFICANCE:");
            let _ = writeln!(
                out,
                "  Effect size between #1 ({}) and #2 ({}): {:.3}",
                first.sampler_name, second.sampler_name, d
            );
            let _ = writeln!(out, "  Magnitude: {} {}", magnitude.as_str(), verdict_word);
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "META-ANALYSIS:");
    let _ = writeln!(out, "  Best overall quality: {}", verdict.highest_quality_sampler);
    let _ = writeln!(out, "  Most consistent: {}", verdict.most_consistent_sampler);
    let wins = verdict.prompt_wins();
    if !wins.is_empty() {
        let _ = writeln!(out, "  Best per-prompt performance:");
        for (sampler, n) in wins {
            let _ = writeln!(out, "    {}: {} prompt(s)", sampler, n);
        }
    }
    out
}

/// One line on judge health; empty when nothing went wrong.
#[must_use]
pub fn format_counts(counts: &RunCounts) -> String {
    let mut parts = Vec::new();
    if counts.samples_skipped > 0 {
        parts.push(format!("skipped={}", counts.samples_skipped));
    }
    if counts.samples_failed > 0 {
        parts.push(format!("failed={}", counts.samples_failed));
    }
    if counts.judge_failures > 0 {
        parts.push(format!(
            "judge_failures={}/{}",
            counts.judge_failures, counts.judge_calls
        ));
    }
    if counts.samples_without_contributors > 0 {
        parts.push(format!("neutral_verdicts={}", counts.samples_without_contributors));
    }
    for (kind, n) in &counts.parser_fallbacks {
        parts.push(format!("{}={}", kind, n));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!("Judge health: {}", parts.join(" "))
    }
}

pub fn print_summary(artifact: &BenchmarkArtifact) {
    let rule = "=".repeat(RULE_WIDTH);
    eprintln!();
    eprintln!("STATISTICAL QUALITY ANALYSIS: {}", artifact.benchmark_name);
    eprintln!("{}", rule);
    eprintln!("Timestamp: {}", artifact.timestamp);
    eprintln!("Model: {}", artifact.model_name);
    eprintln!("Total samples: {}", artifact.samples.len());
    eprintln!("Samplers analyzed: {}", artifact.verdict.sampler_stats.len());
    eprintln!();
    eprint!("{}", format_summary(&artifact.verdict));
    let health = format_counts(&artifact.counts);
    if !health.is_empty() {
        eprintln!("{}", health);
    }
    eprintln!("{}", rule);
}
