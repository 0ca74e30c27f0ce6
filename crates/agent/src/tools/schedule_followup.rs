//! Follow-up tool: suggests a follow-up date plus talking points. Only the
//! date is authoritative; talking points and preparation notes travel in the
//! chat reply, never into the record.

use async_trait::async_trait;
use chrono::Duration;
use serde::Deserialize;

use fieldrep_core::{Field, RecordPatch};

use crate::llm::{extract_json, LlmClient};

use super::{
    cleaned, cleaned_list, parse_iso_date, render_history, InteractionTool, ToolContext,
    ToolError, ToolOutcome,
};

#[derive(Clone, Copy, Debug, Default)]
pub struct ScheduleFollowUpTool;

#[derive(Debug, Default, Deserialize)]
struct ScheduleExtraction {
    #[serde(default)]
    follow_up_date: Option<String>,
    #[serde(default)]
    talking_points: Option<Vec<String>>,
    #[serde(default)]
    preparation_notes: Option<String>,
}

impl ScheduleFollowUpTool {
    fn prompt(ctx: &ToolContext<'_>) -> String {
        let hcp = if ctx.record.hcp_name.trim().is_empty() {
            "the HCP"
        } else {
            ctx.record.hcp_name.as_str()
        };
        format!(
            r#"You are a medical sales coach helping schedule a follow-up meeting with {hcp}.

Recent conversation:
{history}

User request: "{utterance}"
Today's date: {today}

Return ONLY a JSON object (no markdown) with:
1. follow_up_date: the date implied by the request in YYYY-MM-DD format ("next week" means about {next_week}; default one week out when unspecified)
2. talking_points: 3-4 specific topics to cover in the follow-up
3. preparation_notes: what to prepare before the meeting"#,
            history = render_history(ctx.history),
            utterance = ctx.utterance,
            today = ctx.today,
            next_week = ctx.today + Duration::days(7),
        )
    }
}

#[async_trait]
impl InteractionTool for ScheduleFollowUpTool {
    fn name(&self) -> &'static str {
        "schedule_follow_up"
    }

    fn authority(&self) -> &'static [Field] {
        &[Field::FollowUpDate]
    }

    async fn run(
        &self,
        llm: &dyn LlmClient,
        ctx: &ToolContext<'_>,
    ) -> Result<ToolOutcome, ToolError> {
        let reply = llm.complete(&Self::prompt(ctx)).await?;
        let extraction: ScheduleExtraction =
            serde_json::from_value(extract_json(&reply)?).unwrap_or_default();

        let follow_up_date = parse_iso_date(extraction.follow_up_date)
            .unwrap_or_else(|| ctx.today + Duration::days(7));
        let talking_points = cleaned_list(extraction.talking_points);
        let preparation_notes = cleaned(extraction.preparation_notes);

        let mut aside = String::new();
        if !talking_points.is_empty() {
            aside.push_str("Talking points:");
            for point in &talking_points {
                aside.push_str(&format!("\n- {point}"));
            }
        }
        if let Some(notes) = &preparation_notes {
            if !aside.is_empty() {
                aside.push_str("\n\n");
            }
            aside.push_str(&format!("Preparation: {notes}"));
        }

        Ok(ToolOutcome {
            patch: RecordPatch { follow_up_date: Some(follow_up_date), ..RecordPatch::default() },
            ack: format!("Follow-up pencilled in for {follow_up_date}."),
            aside: (!aside.is_empty()).then_some(aside),
        })
    }
}
