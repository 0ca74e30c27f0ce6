//! The five interaction tools. Each is a pure transformation from
//! `(utterance, record, history)` to a sparse patch plus an acknowledgment;
//! the extraction oracle is the only suspending call.
//!
//! A tool declares the fields it is authoritative to set. Declarations are
//! enforced by the merge engine, not by trusting the tool or the oracle - a
//! hallucinated out-of-authority field never reaches the record.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use fieldrep_core::{Field, InteractionRecord, RecordPatch};

use crate::llm::{LlmClient, LlmError};
use crate::session::Turn;

pub mod edit_interaction;
pub mod extract_insights;
pub mod log_interaction;
pub mod schedule_followup;
pub mod validate_hcp;

pub use edit_interaction::EditInteractionTool;
pub use extract_insights::ExtractInsightsTool;
pub use log_interaction::LogInteractionTool;
pub use schedule_followup::ScheduleFollowUpTool;
pub use validate_hcp::ValidateHcpTool;

/// Read-only view of the turn handed to a tool.
pub struct ToolContext<'a> {
    pub utterance: &'a str,
    pub record: &'a InteractionRecord,
    pub history: &'a [Turn],
    pub today: NaiveDate,
}

/// What a tool proposes for one turn.
///
/// An empty patch with an explanatory ack is a valid outcome - extraction
/// finding zero matches is not an error. `aside` carries reply-only material
/// (talking points, specialty notes) that must never be merged.
#[derive(Debug)]
pub struct ToolOutcome {
    pub patch: RecordPatch,
    pub ack: String,
    pub aside: Option<String>,
}

impl ToolOutcome {
    pub fn nothing_extracted(ack: impl Into<String>) -> Self {
        Self { patch: RecordPatch::default(), ack: ack.into(), aside: None }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("could not normalize `{0}` into a plausible HCP name")]
    NoPlausibleName(String),
}

#[async_trait]
pub trait InteractionTool: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fields this tool is allowed to set. Enforced downstream by the merge
    /// engine.
    fn authority(&self) -> &'static [Field];

    async fn run(
        &self,
        llm: &dyn LlmClient,
        ctx: &ToolContext<'_>,
    ) -> Result<ToolOutcome, ToolError>;
}

/// Fields a user can describe directly in conversation. `key_insights` is
/// machine-generated and deliberately absent.
pub const USER_DESCRIBABLE_FIELDS: &[Field] = &[
    Field::HcpName,
    Field::Date,
    Field::Sentiment,
    Field::MaterialsShared,
    Field::DiscussionSummary,
    Field::ProductsDiscussed,
    Field::FollowUpDate,
];

/// Renders the bounded history window for inclusion in a prompt.
pub(crate) fn render_history(history: &[Turn]) -> String {
    if history.is_empty() {
        return "(no prior conversation)".to_string();
    }
    history
        .iter()
        .map(|turn| {
            let speaker = match turn.role {
                crate::session::Role::User => "user",
                crate::session::Role::Assistant => "assistant",
            };
            format!("{speaker}: {}", turn.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Keeps only values that carry content; extraction output uses "null" and
/// empty strings interchangeably for "not found".
pub(crate) fn cleaned(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null"))
}

pub(crate) fn parse_iso_date(value: Option<String>) -> Option<NaiveDate> {
    cleaned(value).and_then(|v| NaiveDate::parse_from_str(&v, "%Y-%m-%d").ok())
}

pub(crate) fn cleaned_list(values: Option<Vec<String>>) -> Vec<String> {
    values
        .unwrap_or_default()
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{cleaned, cleaned_list, parse_iso_date};

    #[test]
    fn cleaned_drops_null_markers_and_whitespace() {
        assert_eq!(cleaned(Some(" Dr. Smith ".into())), Some("Dr. Smith".to_string()));
        assert_eq!(cleaned(Some("null".into())), None);
        assert_eq!(cleaned(Some("  ".into())), None);
        assert_eq!(cleaned(None), None);
    }

    #[test]
    fn parse_iso_date_ignores_unparseable_values() {
        assert!(parse_iso_date(Some("2026-08-25".into())).is_some());
        assert!(parse_iso_date(Some("next tuesday".into())).is_none());
    }

    #[test]
    fn cleaned_list_filters_empty_entries() {
        let values = cleaned_list(Some(vec![
            "Product X".into(),
            " ".into(),
            "null".into(),
            "Product Y".into(),
        ]));
        assert_eq!(values, vec!["Product X", "Product Y"]);
    }
}
