//! Analysis tool: turns the current record into strategic insights. Writes
//! `key_insights` and nothing else - the one machine-authored field.

use async_trait::async_trait;
use serde::Deserialize;

use fieldrep_core::{Field, RecordPatch, Sentiment};

use crate::llm::{extract_json, LlmClient};

use super::{cleaned, cleaned_list, InteractionTool, ToolContext, ToolError, ToolOutcome};

#[derive(Clone, Copy, Debug, Default)]
pub struct ExtractInsightsTool;

#[derive(Debug, Default, Deserialize)]
struct InsightExtraction {
    #[serde(default)]
    opportunities: Option<Vec<String>>,
    #[serde(default)]
    concerns: Option<Vec<String>>,
    #[serde(default)]
    recommended_actions: Option<Vec<String>>,
    #[serde(default)]
    priority_level: Option<String>,
}

impl ExtractInsightsTool {
    fn prompt(ctx: &ToolContext<'_>) -> String {
        let record = ctx.record;
        let products = if record.products_discussed.is_empty() {
            "None".to_string()
        } else {
            record.products_discussed.join(", ")
        };
        let materials = if record.materials_shared.is_empty() {
            "None".to_string()
        } else {
            record
                .materials_shared
                .iter()
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let discussion = if record.discussion_summary.trim().is_empty() {
            "No discussion summary"
        } else {
            record.discussion_summary.as_str()
        };

        format!(
            r#"You are a medical sales analyst. Analyze this HCP interaction and extract strategic insights.

Interaction:
- HCP: {hcp}
- Sentiment: {sentiment}
- Discussion: {discussion}
- Products discussed: {products}
- Materials shared: {materials}

Return ONLY a JSON object (no markdown) with:
1. opportunities: 2-3 sales opportunities or positive signals
2. concerns: objections or negative signals (empty array if none)
3. recommended_actions: 2-3 specific next actions
4. priority_level: "High", "Medium", or "Low""#,
            hcp = if record.hcp_name.trim().is_empty() { "Unknown HCP" } else { &record.hcp_name },
            sentiment = record.sentiment,
        )
    }

    fn fallback_priority(sentiment: Sentiment) -> &'static str {
        match sentiment {
            Sentiment::Positive => "High",
            Sentiment::Neutral => "Medium",
            Sentiment::Negative => "Low",
        }
    }

    fn format_insights(
        priority: &str,
        opportunities: &[String],
        concerns: &[String],
        actions: &[String],
    ) -> String {
        let mut text = format!("Priority: {priority}");
        for (heading, items) in [
            ("Opportunities", opportunities),
            ("Concerns", concerns),
            ("Recommended actions", actions),
        ] {
            if items.is_empty() {
                continue;
            }
            text.push_str(&format!("\n\n{heading}:"));
            for item in items {
                text.push_str(&format!("\n- {item}"));
            }
        }
        text
    }
}

#[async_trait]
impl InteractionTool for ExtractInsightsTool {
    fn name(&self) -> &'static str {
        "extract_insights"
    }

    fn authority(&self) -> &'static [Field] {
        &[Field::KeyInsights]
    }

    async fn run(
        &self,
        llm: &dyn LlmClient,
        ctx: &ToolContext<'_>,
    ) -> Result<ToolOutcome, ToolError> {
        if ctx.record.is_blank() {
            return Ok(ToolOutcome::nothing_extracted(
                "There's nothing recorded yet to analyze. Log the interaction first.",
            ));
        }

        let reply = llm.complete(&Self::prompt(ctx)).await?;
        let extraction: InsightExtraction =
            serde_json::from_value(extract_json(&reply)?).unwrap_or_default();

        let opportunities = cleaned_list(extraction.opportunities);
        let concerns = cleaned_list(extraction.concerns);
        let actions = cleaned_list(extraction.recommended_actions);
        let priority = cleaned(extraction.priority_level)
            .unwrap_or_else(|| Self::fallback_priority(ctx.record.sentiment).to_string());

        let insights = Self::format_insights(&priority, &opportunities, &concerns, &actions);

        Ok(ToolOutcome {
            patch: RecordPatch { key_insights: Some(insights), ..RecordPatch::default() },
            ack: format!("Analysis complete - priority {priority}. Key insights updated."),
            aside: None,
        })
    }
}
