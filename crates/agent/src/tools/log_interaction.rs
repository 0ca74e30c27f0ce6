//! Primary tool: extracts a full or partial set of record fields from a
//! natural-language description of a new encounter.

use std::str::FromStr;

use async_trait::async_trait;
use serde::Deserialize;

use fieldrep_core::{Field, RecordPatch, Sentiment};

use crate::llm::{extract_json, LlmClient};

use super::{
    cleaned, cleaned_list, parse_iso_date, render_history, InteractionTool, ToolContext,
    ToolError, ToolOutcome, USER_DESCRIBABLE_FIELDS,
};

#[derive(Clone, Copy, Debug, Default)]
pub struct LogInteractionTool;

#[derive(Debug, Default, Deserialize)]
struct LogExtraction {
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

impl LogInteractionTool {
    fn prompt(ctx: &ToolContext<'_>) -> String {
        format!(
            r#"You are an expert medical sales assistant. Extract structured information from the user's message about their HCP interaction.

Recent conversation:
{history}

User message: "{utterance}"

Today's date is {today}.

Return ONLY a JSON object (no markdown, no explanation) with these fields:
1. hcp_name: the healthcare professional's name (e.g. "Dr. Smith"), or null
2. date: meeting date in YYYY-MM-DD format; use {today} if not specified
3. sentiment: "Positive", "Negative", or "Neutral"
4. materials_shared: array drawn only from ["brochures", "samples", "clinical_data", "presentation"]
5. discussion_summary: brief summary of what was discussed, or null
6. products_discussed: array of product names mentioned
7. follow_up_date: YYYY-MM-DD if a follow-up was mentioned, else null

Use null for strings and [] for arrays when a field cannot be extracted."#,
            history = render_history(ctx.history),
            utterance = ctx.utterance,
            today = ctx.today,
        )
    }
}

#[async_trait]
impl InteractionTool for LogInteractionTool {
    fn name(&self) -> &'static str {
        "log_interaction"
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
        let extraction: LogExtraction =
            serde_json::from_value(extract_json(&reply)?).unwrap_or_default();

        let mut patch = RecordPatch {
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
                "I couldn't pull any interaction details out of that, so nothing was changed. \
                 Try mentioning who you met and what was discussed.",
            ));
        }

        // An interaction being logged happened; when no date was extracted
        // it defaults to today rather than staying unset.
        if patch.date.is_none() && ctx.record.date.is_none() {
            patch.date = Some(ctx.today);
        }

        let ack = match &patch.hcp_name {
            Some(name) => format!("Logged your interaction with {name}."),
            None => "Logged the interaction details.".to_string(),
        };

        Ok(ToolOutcome { patch, ack, aside: None })
    }
}
