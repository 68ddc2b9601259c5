//! Criterion catalog: the weighted dimensions every judge scores.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub name: String,
    pub description: String,
    /// Relative importance in (0, 1]; only used for fallback weighted scoring.
    pub weight: f64,
}

impl Criterion {
    pub fn new(name: impl Into<String>, description: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            weight,
        }
    }

    pub fn display_name(&self) -> String {
        display_name(&self.name)
    }
}

/// Ordered, immutable set of criteria. Built once at startup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CriterionCatalog {
    criteria: Vec<Criterion>,
}

impl CriterionCatalog {
    pub fn new(criteria: Vec<Criterion>) -> Result<Self, ConfigError> {
        if criteria.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }
        let mut seen = HashSet::new();
        for c in &criteria {
            if !seen.insert(c.name.as_str()) {
                return Err(ConfigError::DuplicateCriterion {
                    name: c.name.clone(),
                });
            }
            if !(c.weight > 0.0 && c.weight <= 1.0) {
                return Err(ConfigError::InvalidWeight {
                    name: c.name.clone(),
                    weight: c.weight,
                });
            }
        }
        Ok(Self { criteria })
    }

    /// Default rubric for creative-writing samples.
    pub fn creative_writing() -> Self {
        Self {
            criteria: vec![
                Criterion::new(
                    "narrative_structure",
                    "Story organization, pacing, and plot coherence",
                    0.30,
                ),
                Criterion::new(
                    "creativity_execution",
                    "Creative premise handling and original elements",
                    0.25,
                ),
                Criterion::new(
                    "character_voice",
                    "Character development and authentic voice",
                    0.20,
                ),
                Criterion::new(
                    "prose_quality",
                    "Writing craft, style, and language use",
                    0.15,
                ),
                Criterion::new("engagement", "Reader interest and emotional impact", 0.10),
            ],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Criterion> {
        self.criteria.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.criteria.iter().map(|c| c.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&Criterion> {
        self.criteria.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Weighted average over the criteria present in `scores`, weights
    /// renormalised over that subset. Unknown names are ignored.
    pub fn weighted_average(&self, scores: &BTreeMap<String, f64>) -> Option<f64> {
        let mut weighted = 0.0;
        let mut total_weight = 0.0;
        for c in &self.criteria {
            if let Some(score) = scores.get(&c.name) {
                weighted += score * c.weight;
                total_weight += c.weight;
            }
        }
        if total_weight > 0.0 {
            Some(weighted / total_weight)
        } else {
            None
        }
    }
}

impl<'de> Deserialize<'de> for CriterionCatalog {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let criteria = Vec::<Criterion>::deserialize(deserializer)?;
        CriterionCatalog::new(criteria).map_err(serde::de::Error::custom)
    }
}

/// `narrative_structure` -> `Narrative Structure`.
pub fn display_name(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
