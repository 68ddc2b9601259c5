use crate::report::{BenchmarkArtifact, SCHEMA_VERSION};
use anyhow::Context;
use std::path::Path;

pub fn write_json(artifact: &BenchmarkArtifact, out: &Path) -> anyhow::Result<()> {
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let body = serde_json::to_string_pretty(artifact)?;
    std::fs::write(out, body).with_context(|| format!("failed to write {}", out.display()))?;
    Ok(())
}

pub fn read_json(path: &Path) -> anyhow::Result<BenchmarkArtifact> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let artifact: BenchmarkArtifact = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse artifact {}", path.display()))?;
    if artifact.schema_version != SCHEMA_VERSION {
        anyhow::bail!(
            "unsupported artifact schema_version {} in {} (expected {})",
            artifact.schema_version,
            path.display(),
            SCHEMA_VERSION
        );
    }
    Ok(artifact)
}
