//! Intent routing: classifies an utterance into exactly one of the five tool
//! intents.
//!
//! The router is deliberately deterministic - cue tables over normalized
//! text, no oracle call - so turn behavior is testable without live model
//! output. Ambiguity is not an error: anything unmatched falls back to the
//! default conversational path, edit when the record already has data and
//! log otherwise.

use fieldrep_core::InteractionRecord;

use crate::session::{Role, Turn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    LogInteraction,
    EditInteraction,
    ScheduleFollowUp,
    ExtractInsights,
    ValidateHcp,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LogInteraction => "log_interaction",
            Self::EditInteraction => "edit_interaction",
            Self::ScheduleFollowUp => "schedule_follow_up",
            Self::ExtractInsights => "extract_insights",
            Self::ValidateHcp => "validate_hcp",
        }
    }
}

const VALIDATE_CUES: &[&str] = &[
    "verify",
    "validate",
    "is the name",
    "name correct",
    "name right",
    "right name",
    "correct name",
    "check the name",
    "check hcp",
    "normalize",
    "spelled",
    "spelling",
];

const SCHEDULE_CUES: &[&str] = &[
    "follow-up",
    "follow up",
    "followup",
    "schedule",
    "book a",
    "next visit",
    "next meeting",
    "plan a visit",
    "remind me",
];

const INSIGHT_CUES: &[&str] = &[
    "insight",
    "analyze",
    "analyse",
    "analysis",
    "opportunit",
    "summarize the interaction",
    "what should i",
    "key takeaway",
];

const EDIT_CUES: &[&str] = &[
    "actually",
    "sorry",
    "i meant",
    "correction",
    "change the",
    "change it",
    "update the",
    "should be",
    "wasn't",
    "was not",
    "instead of",
    "not ",
];

// Bare timing words are only a scheduling request when the assistant just
// proposed a follow-up; otherwise "next week" inside a narration stays on
// the log/edit path.
const TIMING_HINTS: &[&str] = &["next week", "next month", "tomorrow", "in a few days"];

#[derive(Clone, Copy, Debug, Default)]
pub struct IntentRouter;

impl IntentRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(
        &self,
        utterance: &str,
        record: &InteractionRecord,
        recent: &[Turn],
    ) -> Intent {
        let text = utterance.to_ascii_lowercase();
        let has_data = !record.is_blank();

        if contains_any(&text, VALIDATE_CUES) {
            return Intent::ValidateHcp;
        }
        if contains_any(&text, SCHEDULE_CUES) {
            return Intent::ScheduleFollowUp;
        }
        if contains_any(&text, TIMING_HINTS) && assistant_proposed_follow_up(recent) {
            return Intent::ScheduleFollowUp;
        }
        if contains_any(&text, INSIGHT_CUES) {
            return Intent::ExtractInsights;
        }
        // Corrections only make sense against existing data; on a blank
        // record even "actually..." starts a fresh log.
        if has_data && contains_any(&text, EDIT_CUES) {
            return Intent::EditInteraction;
        }

        if has_data {
            Intent::EditInteraction
        } else {
            Intent::LogInteraction
        }
    }
}

fn contains_any(text: &str, cues: &[&str]) -> bool {
    cues.iter().any(|cue| text.contains(cue))
}

fn assistant_proposed_follow_up(recent: &[Turn]) -> bool {
    recent
        .iter()
        .rev()
        .find(|turn| turn.role == Role::Assistant)
        .is_some_and(|turn| turn.content.to_ascii_lowercase().contains("follow-up"))
}
