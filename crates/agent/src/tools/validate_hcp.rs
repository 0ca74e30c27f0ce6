//! Name validation tool: deterministically normalizes the HCP name, then asks
//! the oracle for a likely specialty. Only the normalized name is
//! authoritative; the specialty note travels in the reply.

use async_trait::async_trait;
use serde::Deserialize;

use fieldrep_core::{Field, RecordPatch};

use crate::llm::{extract_json, LlmClient, LlmError};

use super::{cleaned, InteractionTool, ToolContext, ToolError, ToolOutcome};

#[derive(Clone, Copy, Debug, Default)]
pub struct ValidateHcpTool;

#[derive(Debug, Default, Deserialize)]
struct ValidationExtraction {
    #[serde(default)]
    likely_specialty: Option<String>,
    #[serde(default)]
    validation_notes: Option<String>,
}

/// Salutations recognized (lowercased, trailing dot stripped). Repeats
/// collapse: "dr. dr. smith" normalizes to a single title.
const SALUTATIONS: &[&str] = &["dr", "doctor", "prof", "professor"];

/// Filler words around a name in utterances like "check the name dr smith".
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "check", "confirm", "correct", "for", "if", "is", "name", "of", "please",
    "right", "spelled", "spelling", "that", "the", "this", "validate", "verify", "whether",
];

const MAX_NAME_TOKENS: usize = 3;

/// Deterministic normalization. Returns `None` when no plausible name token
/// survives filtering.
fn normalize_name(source: &str) -> Option<String> {
    let mut professor = false;
    let mut tokens = Vec::new();
    for raw in source.split_whitespace() {
        let word = raw.trim_matches(|c: char| !c.is_alphanumeric() && c != '-' && c != '\'');
        if word.is_empty() {
            continue;
        }
        let lower = word.trim_end_matches('.').to_ascii_lowercase();
        if SALUTATIONS.contains(&lower.as_str()) {
            if lower.starts_with("prof") {
                professor = true;
            }
            continue;
        }
        if STOPWORDS.contains(&lower.as_str()) {
            continue;
        }
        tokens.push(title_case(word));
        if tokens.len() == MAX_NAME_TOKENS {
            break;
        }
    }
    if tokens.is_empty() {
        return None;
    }
    let title = if professor { "Prof." } else { "Dr." };
    Some(format!("{title} {}", tokens.join(" ")))
}

/// Title-cases one name token. Hyphens and apostrophes start a new segment,
/// so "garcia-lopez" and "o'brien" both capitalize each part.
fn title_case(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut at_segment_start = true;
    for c in word.chars() {
        if c == '-' || c == '\'' {
            out.push(c);
            at_segment_start = true;
        } else if at_segment_start {
            out.extend(c.to_uppercase());
            at_segment_start = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

impl ValidateHcpTool {
    fn prompt(name: &str) -> String {
        format!(
            r#"You are a medical industry data specialist. Assess this healthcare professional name: "{name}"

Return ONLY a JSON object (no markdown) with:
1. likely_specialty: the most plausible medical specialty given any context, or "General Practice"
2. validation_notes: one short note about the name (formatting, ambiguity), or null"#
        )
    }
}

#[async_trait]
impl InteractionTool for ValidateHcpTool {
    fn name(&self) -> &'static str {
        "validate_hcp"
    }

    fn authority(&self) -> &'static [Field] {
        &[Field::HcpName]
    }

    async fn run(
        &self,
        llm: &dyn LlmClient,
        ctx: &ToolContext<'_>,
    ) -> Result<ToolOutcome, ToolError> {
        let source = if ctx.record.hcp_name.trim().is_empty() {
            ctx.utterance
        } else {
            ctx.record.hcp_name.as_str()
        };
        let normalized = normalize_name(source)
            .ok_or_else(|| ToolError::NoPlausibleName(source.to_string()))?;

        // The oracle pass is advisory; an unconfigured or failing oracle
        // still leaves a usable normalization.
        let extraction = match llm.complete(&Self::prompt(&normalized)).await {
            Ok(reply) => serde_json::from_value::<ValidationExtraction>(extract_json(&reply)?)
                .unwrap_or_default(),
            Err(LlmError::MissingApiKey) => ValidationExtraction::default(),
            Err(err) => return Err(err.into()),
        };

        let specialty = cleaned(extraction.likely_specialty)
            .unwrap_or_else(|| "General Practice".to_string());
        let mut aside = format!("Likely specialty: {specialty}");
        if let Some(notes) = cleaned(extraction.validation_notes) {
            aside.push_str(&format!("\n{notes}"));
        }

        Ok(ToolOutcome {
            patch: RecordPatch { hcp_name: Some(normalized.clone()), ..RecordPatch::default() },
            ack: format!("Validated the HCP name as {normalized}."),
            aside: Some(aside),
        })
    }
}
