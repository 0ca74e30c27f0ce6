//! Merge engine: folds a tool's sparse [`RecordPatch`] into the session's
//! [`InteractionRecord`].
//!
//! Rules, in order:
//! 1. Patch fields outside the calling tool's authority are discarded before
//!    anything else - a tool can never write a field it does not own, even
//!    when the extraction oracle hallucinates one.
//! 2. Scalars overwrite only when the patch carries a non-empty value;
//!    omission means "leave unchanged". There is no per-field clear signal.
//! 3. `materials_shared` and `products_discussed` accumulate: new values are
//!    unioned into the existing collection, never wholesale replaced.
//!    `products_discussed` keeps first-seen order with case-insensitive
//!    dedup; `materials_shared` is an unordered set.
//! 4. Material strings outside the closed vocabulary are reported in the
//!    changeset's rejection list, not silently dropped or coerced.
//!
//! The merge is a deterministic, total function of `(record, patch)`:
//! idempotent for scalars, monotonically additive for collections.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Serialize;

use crate::domain::record::{Field, FieldViolation, InteractionRecord, Material, RecordPatch};

/// Authority set for callers allowed to write every field, such as the
/// explicit PATCH endpoint on a persisted interaction.
pub const ALL_FIELDS: &[Field] = &[
    Field::HcpName,
    Field::Date,
    Field::Sentiment,
    Field::MaterialsShared,
    Field::DiscussionSummary,
    Field::ProductsDiscussed,
    Field::FollowUpDate,
    Field::KeyInsights,
];

/// Old and new rendered values for one altered field. Display-only: feeds
/// acknowledgment text and tracing, never storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub old: String,
    pub new: String,
}

/// Field-level differences produced by one merge.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Changeset {
    pub changes: BTreeMap<Field, FieldChange>,
    pub rejected: Vec<FieldViolation>,
}

impl Changeset {
    /// True when the merge altered nothing and rejected nothing.
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty() && self.rejected.is_empty()
    }
}

/// Applies `patch` to `record` under `authority`, returning the next record
/// and the changeset. The input record is never mutated.
pub fn apply(
    record: &InteractionRecord,
    patch: &RecordPatch,
    authority: &[Field],
) -> (InteractionRecord, Changeset) {
    let mut next = record.clone();
    let mut changeset = Changeset::default();
    let allowed = |field: Field| authority.contains(&field);

    if allowed(Field::HcpName) {
        if let Some(value) = non_empty(patch.hcp_name.as_deref()) {
            set_string(&mut next.hcp_name, Field::HcpName, value, &mut changeset);
            next.touched.insert(Field::HcpName);
        }
    }

    if allowed(Field::Date) {
        if let Some(date) = patch.date {
            if next.date != Some(date) {
                changeset.changes.insert(
                    Field::Date,
                    FieldChange { old: render_date(next.date), new: date.to_string() },
                );
                next.date = Some(date);
            }
            next.touched.insert(Field::Date);
        }
    }

    if allowed(Field::Sentiment) {
        if let Some(sentiment) = patch.sentiment {
            if next.sentiment != sentiment {
                changeset.changes.insert(
                    Field::Sentiment,
                    FieldChange { old: next.sentiment.to_string(), new: sentiment.to_string() },
                );
                next.sentiment = sentiment;
            }
            next.touched.insert(Field::Sentiment);
        }
    }

    if allowed(Field::MaterialsShared) && !patch.materials_shared.is_empty() {
        let before = render_materials(&next.materials_shared);
        let mut touched = false;
        for raw in &patch.materials_shared {
            if raw.trim().is_empty() {
                continue;
            }
            match Material::from_str(raw) {
                Ok(material) => {
                    next.materials_shared.insert(material);
                    touched = true;
                }
                Err(error) => changeset.rejected.push(FieldViolation {
                    field: Field::MaterialsShared,
                    message: error.to_string(),
                }),
            }
        }
        if touched {
            next.touched.insert(Field::MaterialsShared);
            let after = render_materials(&next.materials_shared);
            if after != before {
                changeset
                    .changes
                    .insert(Field::MaterialsShared, FieldChange { old: before, new: after });
            }
        }
    }

    if allowed(Field::DiscussionSummary) {
        if let Some(value) = non_empty(patch.discussion_summary.as_deref()) {
            set_string(&mut next.discussion_summary, Field::DiscussionSummary, value, &mut changeset);
            next.touched.insert(Field::DiscussionSummary);
        }
    }

    if allowed(Field::ProductsDiscussed) && !patch.products_discussed.is_empty() {
        let before = next.products_discussed.join(", ");
        let mut touched = false;
        for raw in &patch.products_discussed {
            let product = raw.trim();
            if product.is_empty() {
                continue;
            }
            let already_known = next
                .products_discussed
                .iter()
                .any(|existing| existing.eq_ignore_ascii_case(product));
            if !already_known {
                next.products_discussed.push(product.to_string());
            }
            touched = true;
        }
        if touched {
            next.touched.insert(Field::ProductsDiscussed);
            let after = next.products_discussed.join(", ");
            if after != before {
                changeset
                    .changes
                    .insert(Field::ProductsDiscussed, FieldChange { old: before, new: after });
            }
        }
    }

    if allowed(Field::FollowUpDate) {
        if let Some(date) = patch.follow_up_date {
            if next.follow_up_date != Some(date) {
                changeset.changes.insert(
                    Field::FollowUpDate,
                    FieldChange { old: render_date(next.follow_up_date), new: date.to_string() },
                );
                next.follow_up_date = Some(date);
            }
            next.touched.insert(Field::FollowUpDate);
        }
    }

    if allowed(Field::KeyInsights) {
        if let Some(value) = non_empty(patch.key_insights.as_deref()) {
            set_string(&mut next.key_insights, Field::KeyInsights, value, &mut changeset);
            next.touched.insert(Field::KeyInsights);
        }
    }

    (next, changeset)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn set_string(slot: &mut String, field: Field, value: &str, changeset: &mut Changeset) {
    if slot != value {
        changeset.changes.insert(
            field,
            FieldChange { old: std::mem::take(slot), new: value.to_string() },
        );
        *slot = value.to_string();
    }
}

fn render_date(date: Option<chrono::NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_default()
}

fn render_materials(materials: &std::collections::BTreeSet<Material>) -> String {
    materials.iter().map(Material::as_str).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::domain::record::{Field, InteractionRecord, Material, RecordPatch, Sentiment};

    use super::{apply, ALL_FIELDS};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn scalar_merge_is_idempotent() {
        let record = InteractionRecord::default();
        let patch =
            RecordPatch { sentiment: Some(Sentiment::Positive), ..RecordPatch::default() };

        let (once, first) = apply(&record, &patch, ALL_FIELDS);
        let (twice, second) = apply(&once, &patch, ALL_FIELDS);

        assert_eq!(once, twice);
        assert_eq!(first.changes.len(), 1);
        assert!(second.changes.is_empty(), "reapplying the same scalar patch changes nothing");
    }

    #[test]
    fn collections_accumulate_across_patches() {
        let record = InteractionRecord::default();
        let first = RecordPatch {
            materials_shared: vec!["brochures".to_string()],
            ..RecordPatch::default()
        };
        let second = RecordPatch {
            materials_shared: vec!["samples".to_string()],
            ..RecordPatch::default()
        };

        let (record, _) = apply(&record, &first, ALL_FIELDS);
        let (record, _) = apply(&record, &second, ALL_FIELDS);

        assert!(record.materials_shared.contains(&Material::Brochures));
        assert!(record.materials_shared.contains(&Material::Samples));
        assert_eq!(record.materials_shared.len(), 2);
    }

    #[test]
    fn out_of_authority_fields_are_discarded() {
        let record = InteractionRecord {
            hcp_name: "Dr. Smith".to_string(),
            sentiment: Sentiment::Positive,
            ..InteractionRecord::default()
        };
        // A schedule-style patch where the oracle hallucinated extra fields.
        let patch = RecordPatch {
            hcp_name: Some("Dr. Hallucinated".to_string()),
            sentiment: Some(Sentiment::Negative),
            materials_shared: vec!["samples".to_string()],
            follow_up_date: Some(date(2026, 9, 1)),
            ..RecordPatch::default()
        };

        let (next, changeset) = apply(&record, &patch, &[Field::FollowUpDate]);

        assert_eq!(next.hcp_name, "Dr. Smith");
        assert_eq!(next.sentiment, Sentiment::Positive);
        assert!(next.materials_shared.is_empty());
        assert_eq!(next.follow_up_date, Some(date(2026, 9, 1)));
        assert_eq!(changeset.changes.len(), 1);
        assert!(changeset.changes.contains_key(&Field::FollowUpDate));
    }

    #[test]
    fn unrecognized_material_is_rejected_not_dropped() {
        let record = InteractionRecord::default();
        let patch = RecordPatch {
            materials_shared: vec!["samples".to_string(), "branded pens".to_string()],
            ..RecordPatch::default()
        };

        let (next, changeset) = apply(&record, &patch, ALL_FIELDS);

        assert!(next.materials_shared.contains(&Material::Samples));
        assert_eq!(next.materials_shared.len(), 1);
        assert_eq!(changeset.rejected.len(), 1);
        assert_eq!(changeset.rejected[0].field, Field::MaterialsShared);
        assert!(changeset.rejected[0].message.contains("branded pens"));
    }

    #[test]
    fn products_keep_first_seen_order() {
        let record = InteractionRecord::default();
        let a = RecordPatch {
            products_discussed: vec!["Product A".to_string()],
            ..RecordPatch::default()
        };
        let b = RecordPatch {
            products_discussed: vec!["Product B".to_string()],
            ..RecordPatch::default()
        };

        let (forward, _) = apply(&apply(&record, &a, ALL_FIELDS).0, &b, ALL_FIELDS);
        let (reverse, _) = apply(&apply(&record, &b, ALL_FIELDS).0, &a, ALL_FIELDS);

        assert_eq!(forward.products_discussed, vec!["Product A", "Product B"]);
        assert_eq!(reverse.products_discussed, vec!["Product B", "Product A"]);
    }

    #[test]
    fn products_dedup_case_insensitively() {
        let record = InteractionRecord {
            products_discussed: vec!["Product X".to_string()],
            ..InteractionRecord::default()
        };
        let patch = RecordPatch {
            products_discussed: vec!["product x".to_string(), "Product Y".to_string()],
            ..RecordPatch::default()
        };

        let (next, _) = apply(&record, &patch, ALL_FIELDS);
        assert_eq!(next.products_discussed, vec!["Product X", "Product Y"]);
    }

    #[test]
    fn omitted_fields_are_left_unchanged() {
        let mut record = InteractionRecord {
            hcp_name: "Dr. Smith".to_string(),
            date: Some(date(2026, 8, 25)),
            sentiment: Sentiment::Positive,
            products_discussed: vec!["Product X".to_string()],
            ..InteractionRecord::default()
        };
        record.derive_provenance();

        let patch = RecordPatch {
            hcp_name: Some("Dr. John".to_string()),
            ..RecordPatch::default()
        };
        let (next, changeset) = apply(&record, &patch, ALL_FIELDS);

        assert_eq!(next.hcp_name, "Dr. John");
        assert_eq!(next.sentiment, Sentiment::Positive);
        assert_eq!(next.products_discussed, vec!["Product X"]);
        assert_eq!(next.date, Some(date(2026, 8, 25)));
        assert_eq!(changeset.changes.len(), 1);
    }

    #[test]
    fn empty_strings_never_overwrite_confirmed_values() {
        let mut record =
            InteractionRecord { hcp_name: "Dr. Smith".to_string(), ..InteractionRecord::default() };
        record.derive_provenance();

        let patch = RecordPatch { hcp_name: Some("  ".to_string()), ..RecordPatch::default() };
        let (next, changeset) = apply(&record, &patch, ALL_FIELDS);

        assert_eq!(next.hcp_name, "Dr. Smith");
        assert!(changeset.is_noop());
    }

    #[test]
    fn merge_records_provenance_for_applied_fields() {
        let record = InteractionRecord::default();
        let patch = RecordPatch {
            hcp_name: Some("Dr. Smith".to_string()),
            date: Some(date(2026, 8, 25)),
            ..RecordPatch::default()
        };

        let (next, _) = apply(&record, &patch, ALL_FIELDS);

        assert!(next.touched.contains(&Field::HcpName));
        assert!(next.touched.contains(&Field::Date));
        assert!(!next.touched.contains(&Field::Sentiment));
    }
}
