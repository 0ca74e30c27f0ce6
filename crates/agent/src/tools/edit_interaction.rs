//! Correction tool: identifies only the fields the user wants to change and
//! proposes exactly those, preserving everything else.

use std::str::FromStr;

use async_trait::async_trait;
use serde::Deserialize;

use fieldrep_core::{Field, InteractionRecord, RecordPatch, Sentiment};

use crate::llm::{extract_json, LlmClient};

use super::{
    cleaned, cleaned_list, parse_iso_date, render_history, InteractionTool, ToolContext,
    ToolError, ToolOutcome, USER_DESCRIBABLE_FIELDS,
};

#[derive(Clone, Copy, Debug, Default)]
pub struct EditInteractionTool;

#[derive(Debug, Default, Deserialize)]
struct EditExtraction {
    #[serde(default)]
    hcp_name: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    sentiment: Option<String>,
    #[serde(default)]
    materials_shared: Option<Vec<String>>,
    #[serde(default)]
    discussion_summary: Option<String>,
    #[serde(default)]
    products_discussed: Option<Vec<String>>,
    #[serde(default)]
    follow_up_date: Option<String>,
}

fn record_snapshot(record: &InteractionRecord) -> String {
    serde_json::json!({
        "hcp_name": record.hcp_name,
        "date": record.date.map(|d| d.to_string()),
        "sentiment": record.sentiment.to_string(),
        "materials_shared": record.materials_shared.iter().map(|m| m.as_str()).collect::<Vec<_>>(),
        "discussion_summary": record.discussion_summary,
        "products_discussed": record.products_discussed,
        "follow_up_date": record.follow_up_date.map(|d| d.to_string()),
    })
    .to_string()
}

impl EditInteractionTool {
    fn prompt(ctx: &ToolContext<'_>) -> String {
        format!(
            r#"You are an expert medical sales assistant. The user wants to correct or extend an existing HCP interaction record.

Current record:
{snapshot}

Recent conversation:
{history}

User's correction: "{utterance}"

Identify ONLY the fields the user wants to change and return them as a JSON object (no markdown, no explanation). Changeable fields:
- hcp_name (string)
- date (YYYY-MM-DD)
- sentiment ("Positive", "Negative", or "Neutral")
- materials_shared (array drawn only from ["brochures", "samples", "clinical_data", "presentation"])
- discussion_summary (string)
- products_discussed (array of strings)
- follow_up_date (YYYY-MM-DD)

If the user says "sentiment was negative", return {{"sentiment": "Negative"}}. If nothing changed, return {{}}."#,
            snapshot = record_snapshot(ctx.record),
            history = render_history(ctx.history),
            utterance = ctx.utterance,
        )
    }
}

#[async_trait]
impl InteractionTool for EditInteractionTool {
    fn name(&self) -> &'static str {
        "edit_interaction"
    }

    fn authority(&self) -> &'static [Field] {
        USER_DESCRIBABLE_FIELDS
    }

    async fn run(
        &self,
        llm: &dyn LlmClient,
        ctx: &ToolContext<'_>,
    ) -> Result<ToolOutcome, ToolError> {
        let reply = llm.complete(&Self::prompt(ctx)).await?;
        let extraction: EditExtraction =
            serde_json::from_value(extract_json(&reply)?).unwrap_or_default();

        let patch = RecordPatch {
            hcp_name: cleaned(extraction.hcp_name),
            date: parse_iso_date(extraction.date),
            sentiment: cleaned(extraction.sentiment)
                .and_then(|s| Sentiment::from_str(&s).ok()),
            materials_shared: cleaned_list(extraction.materials_shared),
            discussion_summary: cleaned(extraction.discussion_summary),
            products_discussed: cleaned_list(extraction.products_discussed),
            follow_up_date: parse_iso_date(extraction.follow_up_date),
            key_insights: None,
        };

        if patch.is_empty() {
            return Ok(ToolOutcome::nothing_extracted(
                "I didn't find a concrete correction in that, so the record is unchanged.",
            ));
        }

        Ok(ToolOutcome {
            patch,
            ack: "Updated the record with your correction.".to_string(),
            aside: None,
        })
    }
}
