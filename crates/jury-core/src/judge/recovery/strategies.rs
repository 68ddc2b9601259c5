use super::{parse_record, ParsedJudgment, RecoveryStrategy};
use crate::criteria::CriterionCatalog;
use crate::model::{clamp_score, CriterionOpinion, RecoveryStrategyKind};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Triple-backtick fence, optional `json` tag.
    static ref FENCE_JSON: Regex = Regex::new(r"(?s)```json\s*(.*?)```").unwrap();
    static ref FENCE_ANY: Regex = Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)```").unwrap();
    static ref SINGLE_TICK: Regex = Regex::new(r"`([^`]+)`").unwrap();

    /// `7/10`, `8.5 / 10`; not `7/100`.
    static ref SCORE_MENTION: Regex = Regex::new(r"(\d+(?:\.\d+)?)\s*/\s*10\b").unwrap();
}

const RECORD_MARKERS: [&str; 2] = ["criterion_scores", "overall_score"];

/// The whole response is the record.
#[derive(Debug, Clone, Copy, Default)]
pub struct WholeDocument;

impl RecoveryStrategy for WholeDocument {
    fn kind(&self) -> RecoveryStrategyKind {
        RecoveryStrategyKind::WholeDocument
    }

    fn try_parse(&self, text: &str, catalog: &CriterionCatalog) -> Option<ParsedJudgment> {
        parse_record(text, catalog)
    }
}

/// Record inside a fenced code block (```` ```json ````, bare ```` ``` ```` or single backticks).
#[derive(Debug, Clone, Copy, Default)]
pub struct FencedBlock;

impl RecoveryStrategy for FencedBlock {
    fn kind(&self) -> RecoveryStrategyKind {
        RecoveryStrategyKind::FencedBlock
    }

    fn try_parse(&self, text: &str, catalog: &CriterionCatalog) -> Option<ParsedJudgment> {
        [&*FENCE_JSON, &*FENCE_ANY, &*SINGLE_TICK]
            .iter()
            .flat_map(|re| re.captures_iter(text))
            .filter_map(|caps| caps.get(1))
            .find_map(|m| parse_record(m.as_str(), catalog))
    }
}

/// First balanced `{...}` span that mentions a record field and parses.
#[derive(Debug, Clone, Copy, Default)]
pub struct BraceScan;

impl RecoveryStrategy for BraceScan {
    fn kind(&self) -> RecoveryStrategyKind {
        RecoveryStrategyKind::BraceScan
    }

    fn try_parse(&self, text: &str, catalog: &CriterionCatalog) -> Option<ParsedJudgment> {
        balanced_spans(text)
            .into_iter()
            .filter(|span| RECORD_MARKERS.iter().any(|m| span.contains(m)))
            .find_map(|span| parse_record(span, catalog))
    }
}

/// Outermost `{...}` rewritten as JSON: bare keys quoted, single-quoted
/// strings turned into double-quoted ones, trailing commas dropped. String
/// contents are never touched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Repair;

impl RecoveryStrategy for Repair {
    fn kind(&self) -> RecoveryStrategyKind {
        RecoveryStrategyKind::Repair
    }

    fn try_parse(&self, text: &str, catalog: &CriterionCatalog) -> Option<ParsedJudgment> {
        let start = text.find('{')?;
        let end = text.rfind('}')?;
        if end <= start {
            return None;
        }
        parse_record(&repair_json(&text[start..=end]), catalog)
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Quote {
    None,
    Double,
    Single,
}

fn next_significant(chars: &[char], from: usize) -> Option<char> {
    chars[from..].iter().copied().find(|c| !c.is_whitespace())
}

fn repair_json(span: &str) -> String {
    let chars: Vec<char> = span.chars().collect();
    let mut out = String::with_capacity(span.len() + 16);
    let mut quote = Quote::None;
    // Last non-whitespace character emitted outside a string.
    let mut last = None;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match quote {
            Quote::Double => {
                out.push(c);
                if c == '\\' {
                    if let Some(&n) = chars.get(i + 1) {
                        out.push(n);
                        i += 1;
                    }
                } else if c == '"' {
                    quote = Quote::None;
                    last = Some('"');
                }
            }
            Quote::Single => match c {
                '\\' if chars.get(i + 1) == Some(&'\'') => {
                    out.push('\'');
                    i += 1;
                }
                '\\' => {
                    out.push(c);
                    if let Some(&n) = chars.get(i + 1) {
                        out.push(n);
                        i += 1;
                    }
                }
                '"' => out.push_str("\\\""),
                '\'' => {
                    out.push('"');
                    quote = Quote::None;
                    last = Some('"');
                }
                _ => out.push(c),
            },
            Quote::None => match c {
                '"' => {
                    out.push('"');
                    quote = Quote::Double;
                }
                '\'' => {
                    out.push('"');
                    quote = Quote::Single;
                }
                ',' if matches!(next_significant(&chars, i + 1), Some('}') | Some(']')) => {}
                c if (c.is_ascii_alphabetic() || c == '_') && matches!(last, Some('{') | Some(',')) => {
                    let mut j = i;
                    while j < chars.len() && (chars[j].is_ascii_alphanumeric() || chars[j] == '_') {
                        j += 1;
                    }
                    let ident: String = chars[i..j].iter().collect();
                    if next_significant(&chars, j) == Some(':') {
                        out.push('"');
                        out.push_str(&ident);
                        out.push('"');
                    } else {
                        out.push_str(&ident);
                    }
                    last = chars[..j].last().copied();
                    i = j;
                    continue;
                }
                c => {
                    out.push(c);
                    if !c.is_whitespace() {
                        last = Some(c);
                    }
                }
            },
        }
        i += 1;
    }
    out
}

/// Average of every `<n>/10` mention, applied to all catalog criteria.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreMentions;

impl RecoveryStrategy for ScoreMentions {
    fn kind(&self) -> RecoveryStrategyKind {
        RecoveryStrategyKind::ScoreMentions
    }

    fn try_parse(&self, text: &str, catalog: &CriterionCatalog) -> Option<ParsedJudgment> {
        let scores: Vec<f64> = SCORE_MENTION
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .filter_map(|m| m.as_str().parse::<f64>().ok())
            .filter(|s| s.is_finite())
            .collect();
        if scores.is_empty() {
            return None;
        }
        let score = clamp_score(scores.iter().sum::<f64>() / scores.len() as f64);
        let reasoning = format!("Extracted from unstructured text: {:.1}/10", score);
        let per_criterion = catalog
            .names()
            .map(|name| {
                (
                    name.to_string(),
                    CriterionOpinion {
                        score,
                        reasoning: reasoning.clone(),
                    },
                )
            })
            .collect();
        Some(ParsedJudgment {
            overall_score: score,
            per_criterion,
            summary: format!(
                "Score extracted from unstructured judge response ({} mention(s))",
                scores.len()
            ),
        })
    }
}

/// Every balanced `{...}` substring, in order of its opening brace. Braces
/// inside JSON string literals are ignored.
fn balanced_spans(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    for (start, _) in text.match_indices('{') {
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        for (offset, &b) in bytes[start..].iter().enumerate() {
            if in_string {
                match b {
                    _ if escaped => escaped = false,
                    b'\\' => escaped = true,
                    b'"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        spans.push(&text[start..=start + offset]);
                        break;
                    }
                }
                _ => {}
            }
        }
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_spans_respect_nesting_and_strings() {
        let text = r#"x {"a": {"b": "}"}} y {"c": 1}"#;
        let spans = balanced_spans(text);
        assert_eq!(spans[0], r#"{"a": {"b": "}"}}"#);
        assert!(spans.contains(&r#"{"c": 1}"#));
    }

    #[test]
    fn repair_leaves_string_contents_alone() {
        assert_eq!(
            repair_json("{'reasoning': 'Vivid, tone: warm', n: 1,}"),
            r#"{"reasoning": "Vivid, tone: warm", "n": 1}"#
        );
        assert_eq!(
            repair_json(r#"{"a": "x, y: [1,]", 'b': 'say "hi"'}"#),
            r#"{"a": "x, y: [1,]", "b": "say \"hi\""}"#
        );
        assert_eq!(repair_json(r"{k: 'it\'s', v: [true, null,]}"), r#"{"k": "it's", "v": [true, null]}"#);
    }

    #[test]
    fn unbalanced_input_yields_nothing() {
        assert!(balanced_spans("{{{ no close").is_empty());
        assert!(balanced_spans("}}} {").is_empty());
    }
}
