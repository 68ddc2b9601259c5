//! Judge prompt construction.

use crate::criteria::CriterionCatalog;
use crate::model::SamplerConfig;
use serde_json::{json, Map, Value};

pub const SYSTEM_PROMPT: &str = "You are an expert literary critic and creative writing evaluator. \
Your task is to objectively assess creative writing samples based on specific criteria.

You will evaluate texts on a 1-10 scale for each criterion, where:
- 1-2: Poor quality with major issues
- 3-4: Below average with notable problems
- 5-6: Average quality, adequate but unremarkable
- 7-8: Good quality with strong elements
- 9-10: Excellent quality, exceptional work

Be objective, consistent, and provide specific reasoning for your scores. \
Focus on the writing quality rather than personal preferences about content or themes.

Respond ONLY in the specified JSON format with no additional text.";

/// Judges known to honour `response_format: json_schema`. Entries ending in
/// `/` match any model under that provider prefix.
const STRUCTURED_OUTPUT_MODELS: &[&str] = &[
    "openai/gpt-4o",
    "openai/gpt-4o-mini",
    "openai/gpt-4o-2024-08-06",
    "openai/gpt-4o-2024-11-20",
    "openai/gpt-4-turbo",
    "openai/gpt-4-turbo-2024-04-09",
    "openai/gpt-4.1-nano",
    "openai/chatgpt-4o-latest",
    "google/gemini-2.0-flash-001",
    "google/gemini-2.0-flash-lite-001",
    "google/gemini-2.5-flash-preview",
    "google/gemini-2.5-flash-preview-04-17",
    "google/gemini-2.5-flash-preview-05-20",
    "google/gemini-2.5-pro-preview",
    "google/gemini-2.5-pro-preview-03-25",
    "mistralai/mistral-small-3.2-24b-instruct",
    "mistralai/mistral-small-24b-instruct-2501",
    "mistralai/mistral-medium-3",
    "mistralai/ministral-8b",
    "fireworks/",
];

pub fn supports_structured_output(model: &str) -> bool {
    STRUCTURED_OUTPUT_MODELS
        .iter()
        .any(|m| *m == model || (m.ends_with('/') && model.starts_with(m)))
}

pub fn build_user_prompt(
    text: &str,
    prompt: &str,
    sampler_config: &SamplerConfig,
    catalog: &CriterionCatalog,
) -> String {
    let criteria_text = catalog
        .iter()
        .map(|c| format!("- **{}**: {}", c.display_name(), c.description))
        .collect::<Vec<_>>()
        .join("\n");

    let layout_rows = catalog
        .names()
        .map(|name| {
            format!(
                "        \"{}\": {{\"score\": X.X, \"reasoning\": \"detailed explanation\"}}",
                name
            )
        })
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        "**TASK**: Evaluate the following creative writing sample based on the specified criteria.

**ORIGINAL PROMPT**: {prompt}

**GENERATED TEXT**:
{text}

**SAMPLING CONFIGURATION**: {sampler}

**EVALUATION CRITERIA**:
{criteria_text}

**INSTRUCTIONS**:
1. Score each criterion on a 1-10 scale
2. Provide specific reasoning for each score
3. Calculate an overall weighted score
4. Give a brief summary assessment

**REQUIRED JSON RESPONSE FORMAT**:
{{
    \"criterion_scores\": {{
{layout_rows}
    }},
    \"overall_score\": X.X,
    \"summary\": \"Brief 2-3 sentence assessment of the text's overall quality and notable strengths/weaknesses\"
}}",
        prompt = prompt,
        text = text,
        sampler = sampler_config.describe(),
        criteria_text = criteria_text,
        layout_rows = layout_rows,
    )
}

/// Strict schema for structured-output judges; every catalog criterion is required.
pub fn response_schema(catalog: &CriterionCatalog) -> Value {
    let mut properties = Map::new();
    for name in catalog.names() {
        properties.insert(
            name.to_string(),
            json!({
                "type": "object",
                "properties": {
                    "score": { "type": "number", "minimum": 1.0, "maximum": 10.0 },
                    "reasoning": { "type": "string" }
                },
                "required": ["score", "reasoning"],
                "additionalProperties": false
            }),
        );
    }
    let required: Vec<&str> = catalog.names().collect();

    json!({
        "type": "object",
        "properties": {
            "criterion_scores": {
                "type": "object",
                "properties": properties,
                "required": required,
                "additionalProperties": false
            },
            "overall_score": {
                "type": "number",
                "minimum": 1.0,
                "maximum": 10.0,
                "description": "Overall weighted score based on all criteria"
            },
            "summary": {
                "type": "string",
                "description": "Brief 2-3 sentence assessment of the text's overall quality and notable strengths/weaknesses"
            }
        },
        "required": ["criterion_scores", "overall_score", "summary"],
        "additionalProperties": false
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_output_detection() {
        assert!(supports_structured_output("openai/gpt-4o"));
        assert!(supports_structured_output("fireworks/llama-v3-70b"));
        assert!(!supports_structured_output("openai/gpt-4o-extra"));
        assert!(!supports_structured_output("meta-llama/llama-3-8b"));
    }

    #[test]
    fn user_prompt_embeds_everything() {
        let catalog = CriterionCatalog::creative_writing();
        let cfg = SamplerConfig::new()
            .with("temperature", 0.9)
            .with("type", "top_p");
        let p = build_user_prompt("Once upon a time", "Write a fable", &cfg, &catalog);
        assert!(p.contains("**ORIGINAL PROMPT**: Write a fable"));
        assert!(p.contains("Once upon a time"));
        assert!(p.contains("Temperature: 0.9, Sampler: top_p"));
        assert!(p.contains("**Narrative Structure**: Story organization"));
        assert!(p.contains("\"engagement\": {\"score\": X.X"));
    }

    #[test]
    fn schema_requires_every_criterion() {
        let catalog = CriterionCatalog::creative_writing();
        let schema = response_schema(&catalog);
        let required = schema["properties"]["criterion_scores"]["required"]
            .as_array()
            .unwrap();
        assert_eq!(required.len(), 5);
        assert_eq!(required[0], "narrative_structure");
    }
}
