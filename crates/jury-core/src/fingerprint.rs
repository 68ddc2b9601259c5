use sha2::{Digest, Sha256};

pub fn sha256_hex(s: &str) -> String {
    let mut h = Sha256::new();
    h.update(s.as_bytes());
    hex::encode(h.finalize())
}

/// Stable identifier for one generated sample, used as the join key by
/// downstream tooling. Same (prompt, sampler, text, repetition) -> same id.
pub fn sample_id(prompt: &str, sampler_name: &str, text: &str, repetition: u32) -> String {
    let parts = [
        format!("prompt={}", prompt),
        format!("sampler={}", sampler_name),
        format!("repetition={}", repetition),
        format!("text={}", text),
    ];
    let digest = sha256_hex(&parts.join("\n"));
    digest[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_id_is_deterministic_and_sensitive() {
        let a = sample_id("p", "greedy", "text", 1);
        assert_eq!(a, sample_id("p", "greedy", "text", 1));
        assert_eq!(a.len(), 16);
        assert_ne!(a, sample_id("p", "greedy", "text", 2));
        assert_ne!(a, sample_id("p", "min_p", "text", 1));
    }
}
