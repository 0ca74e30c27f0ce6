//! Per-turn orchestration: route, run the tool, merge under its authority,
//! compose the reply, commit to the session.
//!
//! The session is mutated only after the whole turn succeeds. A failed turn
//! leaves record and history exactly as they were, so the user can simply
//! rephrase.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use thiserror::Error;

use fieldrep_core::{Changeset, InteractionRecord};

use crate::compose::compose;
use crate::llm::LlmClient;
use crate::router::{Intent, IntentRouter};
use crate::session::{Role, Session, HISTORY_WINDOW};
use crate::tools::{
    EditInteractionTool, ExtractInsightsTool, InteractionTool, LogInteractionTool,
    ScheduleFollowUpTool, ToolContext, ToolError, ValidateHcpTool,
};

/// Result of one successful turn. `record` is the post-merge state already
/// committed to the session.
#[derive(Debug)]
pub struct TurnOutcome {
    pub record: InteractionRecord,
    pub reply: String,
    pub intent: Intent,
    pub changeset: Changeset,
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("extraction failed: {0}")]
    Extraction(String),
    #[error("could not identify an HCP name in `{0}`")]
    NoPlausibleName(String),
}

impl TurnError {
    /// Safe, actionable phrasing for the chat surface.
    pub fn user_message(&self) -> String {
        match self {
            Self::Extraction(_) => {
                "I couldn't process that just now. Nothing was changed - please try rephrasing."
                    .to_string()
            }
            Self::NoPlausibleName(_) => {
                "I couldn't find a name to validate. Try something like \"verify Dr. Smith\"."
                    .to_string()
            }
        }
    }
}

impl From<ToolError> for TurnError {
    fn from(error: ToolError) -> Self {
        match error {
            ToolError::Llm(inner) => Self::Extraction(inner.to_string()),
            ToolError::NoPlausibleName(raw) => Self::NoPlausibleName(raw),
        }
    }
}

/// Owns the router, the five tools, and the shared oracle handle. Stateless
/// across turns; all conversation state lives in [`Session`].
pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    router: IntentRouter,
    log_tool: LogInteractionTool,
    edit_tool: EditInteractionTool,
    schedule_tool: ScheduleFollowUpTool,
    insights_tool: ExtractInsightsTool,
    validate_tool: ValidateHcpTool,
}

impl AgentRuntime {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            router: IntentRouter::new(),
            log_tool: LogInteractionTool,
            edit_tool: EditInteractionTool,
            schedule_tool: ScheduleFollowUpTool,
            insights_tool: ExtractInsightsTool,
            validate_tool: ValidateHcpTool,
        }
    }

    fn tool_for(&self, intent: Intent) -> &dyn InteractionTool {
        match intent {
            Intent::LogInteraction => &self.log_tool,
            Intent::EditInteraction => &self.edit_tool,
            Intent::ScheduleFollowUp => &self.schedule_tool,
            Intent::ExtractInsights => &self.insights_tool,
            Intent::ValidateHcp => &self.validate_tool,
        }
    }

    /// Processes one utterance against `session`. The caller holds the
    /// session lock, which is what serializes turns within a session.
    pub async fn handle_turn(
        &self,
        session: &mut Session,
        utterance: &str,
    ) -> Result<TurnOutcome, TurnError> {
        self.handle_turn_at(session, utterance, Utc::now().date_naive()).await
    }

    /// Like [`Self::handle_turn`] with an explicit "today", so date
    /// defaulting is testable.
    pub async fn handle_turn_at(
        &self,
        session: &mut Session,
        utterance: &str,
        today: NaiveDate,
    ) -> Result<TurnOutcome, TurnError> {
        let history = session.recent_turns(HISTORY_WINDOW).to_vec();
        let intent = self.router.classify(utterance, session.current_record(), &history);
        let tool = self.tool_for(intent);

        tracing::debug!(
            event_name = "agent.turn.routed",
            session_id = %session.id,
            intent = intent.as_str(),
        );

        let ctx = ToolContext {
            utterance,
            record: session.current_record(),
            history: &history,
            today,
        };
        let outcome = tool.run(self.llm.as_ref(), &ctx).await?;

        let (record, changeset) =
            session.current_record().apply_patch(&outcome.patch, tool.authority());
        let reply = compose(&outcome.ack, &changeset, outcome.aside.as_deref());

        tracing::info!(
            event_name = "agent.turn.merged",
            session_id = %session.id,
            intent = intent.as_str(),
            changed_fields = changeset.changes.len(),
            rejected_fields = changeset.rejected.len(),
        );

        // Commit only now: a turn that errored above never touches history
        // or the record.
        session.append_turn(Role::User, utterance);
        session.replace_record(record.clone());
        session.append_turn(Role::Assistant, reply.clone());

        Ok(TurnOutcome { record, reply, intent, changeset })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use fieldrep_core::{Field, Material, Sentiment};

    use crate::llm::{LlmClient, LlmError, ScriptedLlm};
    use crate::router::Intent;
    use crate::session::Session;

    use super::{AgentRuntime, TurnError};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 25).expect("valid date")
    }

    #[tokio::test]
    async fn log_then_schedule_builds_the_record_incrementally() {
        let llm = Arc::new(ScriptedLlm::new([
            r#"{
                "hcp_name": "Dr. Smith",
                "date": "2026-08-25",
                "sentiment": "Positive",
                "materials_shared": ["brochures"],
                "discussion_summary": "Discussed Product X efficacy data",
                "products_discussed": ["Product X"]
            }"#,
            r#"{
                "follow_up_date": "2026-09-01",
                "talking_points": ["Trial results", "Dosing questions"],
                "preparation_notes": "Bring the efficacy deck"
            }"#,
        ]));
        let runtime = AgentRuntime::new(llm);
        let mut session = Session::new();

        let first = runtime
            .handle_turn_at(
                &mut session,
                "Met Dr. Smith today, shared brochures about Product X, went really well",
                today(),
            )
            .await
            .expect("first turn");

        assert_eq!(first.intent, Intent::LogInteraction);
        assert_eq!(first.record.hcp_name, "Dr. Smith");
        assert_eq!(first.record.sentiment, Sentiment::Positive);
        assert!(first.record.materials_shared.contains(&Material::Brochures));
        assert!(first.reply.contains("Dr. Smith"));

        let second = runtime
            .handle_turn_at(&mut session, "schedule a follow-up next week", today())
            .await
            .expect("second turn");

        assert_eq!(second.intent, Intent::ScheduleFollowUp);
        assert_eq!(second.record.follow_up_date, NaiveDate::from_ymd_opt(2026, 9, 1));
        // Everything from the first turn survives the second merge.
        assert_eq!(second.record.hcp_name, "Dr. Smith");
        assert_eq!(second.record.products_discussed, vec!["Product X"]);
        assert!(second.reply.contains("Trial results"), "talking points appear in the reply");
        assert!(second.record.key_insights.is_empty(), "but never in the record");

        // Two turns, each committing a user and an assistant message.
        assert_eq!(session.turns().len(), 4);
    }

    #[tokio::test]
    async fn correction_changes_one_field_and_preserves_the_rest() {
        let llm = Arc::new(ScriptedLlm::new([
            r#"{
                "hcp_name": "Dr. Smith",
                "date": "2026-08-25",
                "sentiment": "Positive",
                "products_discussed": ["Product X", "Product Y"]
            }"#,
            r#"{"hcp_name": "Dr. John"}"#,
        ]));
        let runtime = AgentRuntime::new(llm);
        let mut session = Session::new();

        runtime
            .handle_turn_at(&mut session, "met Dr. Smith, talked Product X and Y, positive", today())
            .await
            .expect("log turn");
        let outcome = runtime
            .handle_turn_at(&mut session, "Actually the name was Dr. John", today())
            .await
            .expect("edit turn");

        assert_eq!(outcome.intent, Intent::EditInteraction);
        assert_eq!(outcome.record.hcp_name, "Dr. John");
        assert_eq!(outcome.record.sentiment, Sentiment::Positive);
        assert_eq!(outcome.record.products_discussed, vec!["Product X", "Product Y"]);
        assert_eq!(outcome.changeset.changes.len(), 1);
        assert!(outcome.changeset.changes.contains_key(&Field::HcpName));
    }

    struct FailingLlm;

    #[async_trait::async_trait]
    impl LlmClient for FailingLlm {
        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            Err(LlmError::EmptyCompletion)
        }
    }

    #[tokio::test]
    async fn failed_turn_leaves_the_session_untouched() {
        let runtime = AgentRuntime::new(Arc::new(FailingLlm));
        let mut session = Session::new();

        let err = runtime
            .handle_turn_at(&mut session, "met Dr. Smith today", today())
            .await
            .expect_err("oracle failure");

        assert!(matches!(err, TurnError::Extraction(_)));
        assert!(err.user_message().contains("Nothing was changed"));
        assert_eq!(session.turns().len(), 0);
        assert!(session.current_record().is_blank());
    }

    #[tokio::test]
    async fn rejected_materials_surface_in_the_reply() {
        let llm = Arc::new(ScriptedLlm::new([r#"{
            "hcp_name": "Dr. Patel",
            "materials_shared": ["samples", "branded pens"]
        }"#]));
        let runtime = AgentRuntime::new(llm);
        let mut session = Session::new();

        let outcome = runtime
            .handle_turn_at(&mut session, "dropped off samples and branded pens with Dr. Patel", today())
            .await
            .expect("turn");

        assert!(outcome.record.materials_shared.contains(&Material::Samples));
        assert_eq!(outcome.changeset.rejected.len(), 1);
        assert!(outcome.reply.contains("Note:"), "rejection is explained to the user");
    }
}
