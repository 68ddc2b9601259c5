#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const CONFIG: &str = r#"
benchmark_name: smoke
model_name: tiny-model
parallel_samples: 2
judge:
  provider: fake
  fake_score: 6.5
  models:
    - model: judge-a
    - model: judge-b
"#;

fn write_inputs(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let config = dir.join("jury.yaml");
    fs::write(&config, CONFIG).unwrap();

    let mut samples = Vec::new();
    for sampler in ["min_p", "top_k"] {
        for prompt in ["a dragon", "a lighthouse"] {
            for rep in 0..2 {
                samples.push(serde_json::json!({
                    "prompt": prompt,
                    "sampler_name": sampler,
                    "sampler_config": {"temperature": 0.8, "type": sampler},
                    "generated_text": format!("Once upon a time, {} ({} #{})", prompt, sampler, rep),
                    "repetition_index": rep,
                }));
            }
        }
    }
    let samples_path = dir.join("samples.json");
    fs::write(&samples_path, serde_json::to_string(&samples).unwrap()).unwrap();
    (config, samples_path)
}

fn jury() -> Command {
    let mut cmd = Command::cargo_bin("jury").unwrap();
    cmd.env("RUST_LOG", "warn");
    cmd
}

#[test]
fn judge_with_fake_provider_writes_artifact() {
    let dir = tempdir().unwrap();
    let (config, samples) = write_inputs(dir.path());
    let out = dir.path().join("out").join("run.json");

    jury()
        .args(["judge", "--config"])
        .arg(&config)
        .arg("--samples")
        .arg(&samples)
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("QUALITY RANKING"))
        .stderr(predicate::str::contains("Best overall quality: min_p"));

    let v: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(v["schema_version"], 1);
    assert_eq!(v["benchmark_name"], "smoke");
    assert_eq!(v["samples"].as_array().unwrap().len(), 8);
    assert_eq!(v["counts"]["judge_calls"], 16);
    assert_eq!(v["counts"]["judge_failures"], 0);
    let first = &v["samples"][0]["verdict"];
    assert_eq!(first["overall_score"], 6.5);
    assert_eq!(first["contributing_judge_count"], 2);
    assert_eq!(v["verdict"]["sampler_stats"]["top_k"]["overall_mean"], 6.5);

    jury()
        .arg("analyze")
        .arg(&out)
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"highest_quality_sampler\": \"min_p\""));
}

#[test]
fn empty_samples_exit_with_no_data() {
    let dir = tempdir().unwrap();
    let (config, _) = write_inputs(dir.path());
    let empty = dir.path().join("empty.json");
    fs::write(&empty, "[]").unwrap();

    jury()
        .args(["judge", "--config"])
        .arg(&config)
        .arg("--samples")
        .arg(&empty)
        .arg("--out")
        .arg(dir.path().join("run.json"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No samples were judged"));
    assert!(!dir.path().join("run.json").exists());
}

#[test]
fn missing_samples_file_is_a_config_error() {
    let dir = tempdir().unwrap();
    let (config, _) = write_inputs(dir.path());
    jury()
        .args(["judge", "--config"])
        .arg(&config)
        .arg("--samples")
        .arg(dir.path().join("nope.json"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("failed to read samples"));
}

#[test]
fn http_provider_without_api_key_fails_fast() {
    let dir = tempdir().unwrap();
    let (config, samples) = write_inputs(dir.path());
    jury()
        .env_remove("OPENROUTER_API_KEY")
        .args(["judge", "--provider", "openai-compat", "--config"])
        .arg(&config)
        .arg("--samples")
        .arg(&samples)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("failed to build judge client"));
}

#[test]
fn validate_lists_judges() {
    let dir = tempdir().unwrap();
    let (config, _) = write_inputs(dir.path());
    jury()
        .args(["validate", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Config OK: 2 judge(s)"))
        .stdout(predicate::str::contains("judge-a (free-form)"));
}

#[test]
fn validate_rejects_unknown_consensus_method() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("bad.yaml");
    fs::write(
        &config,
        "judge:\n  models: [{model: j}]\n  consensus_method: majority\n",
    )
    .unwrap();
    jury()
        .args(["validate", "--config"])
        .arg(&config)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown consensus method 'majority'"));
}
