//! Deterministic reply composition. The oracle never writes the user-facing
//! reply; it is assembled from the tool's ack, the merge changeset, and any
//! reply-only aside.

use fieldrep_core::Changeset;

/// Builds the final reply for one turn.
///
/// Order is fixed: ack, applied changes, rejections, aside. A no-op changeset
/// contributes nothing, so "nothing extracted" turns read as a single line.
pub fn compose(ack: &str, changeset: &Changeset, aside: Option<&str>) -> String {
    let mut reply = ack.trim().to_string();

    if !changeset.changes.is_empty() {
        reply.push_str("\n\nUpdated:");
        for (field, change) in &changeset.changes {
            reply.push_str(&format!("\n- {}: {}", field.label(), change.new));
        }
    }

    for rejection in &changeset.rejected {
        reply.push_str(&format!("\n\nNote: {}", rejection.message));
    }

    if let Some(aside) = aside {
        let aside = aside.trim();
        if !aside.is_empty() {
            reply.push_str("\n\n");
            reply.push_str(aside);
        }
    }

    reply
}

#[cfg(test)]
mod tests {
    use fieldrep_core::{Changeset, Field, FieldChange, FieldViolation};

    use super::compose;

    fn changeset_with(field: Field, new: &str) -> Changeset {
        let mut changeset = Changeset::default();
        changeset
            .changes
            .insert(field, FieldChange { old: "(empty)".to_string(), new: new.to_string() });
        changeset
    }

    #[test]
    fn lists_applied_changes_under_the_ack() {
        let mut changeset = changeset_with(Field::HcpName, "Dr. Smith");
        changeset.changes.insert(
            Field::Sentiment,
            FieldChange { old: "Neutral".to_string(), new: "Positive".to_string() },
        );

        let reply = compose("Logged your interaction with Dr. Smith.", &changeset, None);

        assert!(reply.starts_with("Logged your interaction with Dr. Smith."));
        assert!(reply.contains("Updated:"));
        assert!(reply.contains("- HCP name: Dr. Smith"));
        assert!(reply.contains("- Sentiment: Positive"));
    }

    #[test]
    fn noop_changeset_is_just_the_ack() {
        let reply = compose("Nothing to change.", &Changeset::default(), None);
        assert_eq!(reply, "Nothing to change.");
    }

    #[test]
    fn surfaces_rejections_as_notes() {
        let mut changeset = changeset_with(Field::HcpName, "Dr. Smith");
        changeset.rejected.push(FieldViolation {
            field: Field::MaterialsShared,
            message: "unrecognized material `stickers` was ignored".to_string(),
        });

        let reply = compose("Logged it.", &changeset, None);
        assert!(reply.contains("Note: unrecognized material `stickers` was ignored"));
    }

    #[test]
    fn appends_the_aside_last() {
        let changeset = changeset_with(Field::FollowUpDate, "2026-09-01");
        let reply =
            compose("Follow-up pencilled in.", &changeset, Some("Talking points:\n- Next steps"));

        let updated_at = reply.find("Updated:").expect("updated block");
        let aside_at = reply.find("Talking points:").expect("aside block");
        assert!(aside_at > updated_at);
    }
}
