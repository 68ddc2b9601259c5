//! The handful of statistics the aggregator and analyzer need.

use serde::{Deserialize, Serialize};

/// Two-sided 95% Student-t critical values, indexed by degrees of freedom 1..=10.
const T_TABLE_95: [f64; 10] = [12.71, 4.30, 3.18, 2.78, 2.57, 2.45, 2.36, 2.31, 2.26, 2.23];
const Z_95: f64 = 1.96;
/// Below this sample size the t-table is consulted.
const SMALL_SAMPLE: usize = 30;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    if all_equal(values) {
        return Some(values[0]);
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Bessel-corrected standard deviation; 0 for fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    spread(values, 1)
}

pub fn population_std(values: &[f64]) -> f64 {
    spread(values, 0)
}

fn spread(values: &[f64], ddof: usize) -> f64 {
    if values.len() < 2 || all_equal(values) {
        return 0.0;
    }
    let Some(m) = mean(values) else {
        return 0.0;
    };
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() - ddof) as f64).sqrt()
}

fn all_equal(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

/// Critical value for a 95% interval over `n` samples.
pub fn critical_value(n: usize) -> f64 {
    if n >= SMALL_SAMPLE {
        return Z_95;
    }
    let df = n.saturating_sub(1);
    match df {
        1..=10 => T_TABLE_95[df - 1],
        _ => Z_95,
    }
}

/// 95% confidence interval for the mean. A single value collapses to a
/// point; no values give `None`.
pub fn confidence_interval(values: &[f64]) -> Option<(f64, f64)> {
    let m = mean(values)?;
    if values.len() < 2 {
        return Some((m, m));
    }
    let margin = critical_value(values.len()) * sample_std(values) / (values.len() as f64).sqrt();
    Some((m - margin, m + margin))
}

/// Standardised mean difference `(mean(a) - mean(b)) / pooled_std`.
/// 0 when either side has fewer than two values or the pooled std is 0.
pub fn cohens_d(a: &[f64], b: &[f64]) -> f64 {
    if a.len() < 2 || b.len() < 2 {
        return 0.0;
    }
    let (Some(mean_a), Some(mean_b)) = (mean(a), mean(b)) else {
        return 0.0;
    };
    let (na, nb) = (a.len() as f64, b.len() as f64);
    let (sa, sb) = (sample_std(a), sample_std(b));
    let pooled = (((na - 1.0) * sa.powi(2) + (nb - 1.0) * sb.powi(2)) / (na + nb - 2.0)).sqrt();
    if pooled == 0.0 || !pooled.is_finite() {
        return 0.0;
    }
    (mean_a - mean_b) / pooled
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

impl Summary {
    pub fn of(values: &[f64]) -> Option<Self> {
        let mean = mean(values)?;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            mean,
            std: sample_std(values),
            min,
            max,
            count: values.len(),
        })
    }
}
