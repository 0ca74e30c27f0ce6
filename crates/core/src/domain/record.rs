use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Every patchable field of an [`InteractionRecord`].
///
/// Used for tool authority declarations, changeset keys, provenance tracking,
/// and save-time validation errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    HcpName,
    Date,
    Sentiment,
    MaterialsShared,
    DiscussionSummary,
    ProductsDiscussed,
    FollowUpDate,
    KeyInsights,
}

impl Field {
    pub fn label(&self) -> &'static str {
        match self {
            Field::HcpName => "HCP name",
            Field::Date => "date",
            Field::Sentiment => "sentiment",
            Field::MaterialsShared => "materials shared",
            Field::DiscussionSummary => "discussion summary",
            Field::ProductsDiscussed => "products discussed",
            Field::FollowUpDate => "follow-up date",
            Field::KeyInsights => "key insights",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl FromStr for Sentiment {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Self::Positive),
            "neutral" => Ok(Self::Neutral),
            "negative" => Ok(Self::Negative),
            other => Err(DomainError::UnknownSentiment(other.to_string())),
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Positive => "Positive",
            Self::Neutral => "Neutral",
            Self::Negative => "Negative",
        };
        f.write_str(label)
    }
}

/// Closed vocabulary for `materials_shared`. Parsing rejects anything outside
/// it; the merge engine reports rejections instead of silently dropping them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Material {
    Brochures,
    Samples,
    ClinicalData,
    Presentation,
}

impl Material {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Brochures => "brochures",
            Self::Samples => "samples",
            Self::ClinicalData => "clinical_data",
            Self::Presentation => "presentation",
        }
    }
}

impl FromStr for Material {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        // Extraction output is free text; accept singular/plural spacing
        // variants but nothing semantically new.
        match value.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "brochure" | "brochures" => Ok(Self::Brochures),
            "sample" | "samples" => Ok(Self::Samples),
            "clinical_data" => Ok(Self::ClinicalData),
            "presentation" | "presentations" => Ok(Self::Presentation),
            _ => Err(DomainError::UnknownMaterial(value.trim().to_string())),
        }
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A required field missing or an invalid value, surfaced verbatim to the
/// user at save time or inside a merge changeset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: Field,
    pub message: String,
}

/// The structured interaction under construction.
///
/// `touched` is field-level provenance: which fields a tool has ever set.
/// A blank record (no touched fields) is distinguishable from one whose
/// values merely equal the defaults, so the merge engine never mistakes
/// "still default" for "confirmed by the user".
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub hcp_name: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub sentiment: Sentiment,
    #[serde(default)]
    pub materials_shared: BTreeSet<Material>,
    #[serde(default)]
    pub discussion_summary: String,
    #[serde(default)]
    pub products_discussed: Vec<String>,
    #[serde(default)]
    pub follow_up_date: Option<NaiveDate>,
    #[serde(default)]
    pub key_insights: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub touched: BTreeSet<Field>,
}

impl InteractionRecord {
    /// True when no tool has ever written to this record.
    pub fn is_blank(&self) -> bool {
        self.touched.is_empty()
    }

    /// Checks the record is complete enough to persist. One violation per
    /// missing required field; an empty list means the record may be saved.
    pub fn validate_for_save(&self) -> Vec<FieldViolation> {
        let mut violations = Vec::new();
        if self.hcp_name.trim().is_empty() {
            violations.push(FieldViolation {
                field: Field::HcpName,
                message: "HCP name is required before saving".to_string(),
            });
        }
        if self.date.is_none() {
            violations.push(FieldViolation {
                field: Field::Date,
                message: "interaction date is required before saving".to_string(),
            });
        }
        violations
    }

    /// Folds a sparse patch into this record under the caller's field
    /// authority. Pure; see [`crate::merge`] for the overwrite/accumulate
    /// rules.
    pub fn apply_patch(
        &self,
        patch: &RecordPatch,
        authority: &[Field],
    ) -> (InteractionRecord, crate::merge::Changeset) {
        crate::merge::apply(self, patch, authority)
    }

    /// Rebuilds provenance from stored values. Used when a persisted record
    /// is loaded back into a session: every non-empty field counts as
    /// confirmed so later turns route and merge as edits, not fresh logs.
    pub fn derive_provenance(&mut self) {
        self.touched.clear();
        if !self.hcp_name.trim().is_empty() {
            self.touched.insert(Field::HcpName);
        }
        if self.date.is_some() {
            self.touched.insert(Field::Date);
        }
        // Sentiment defaults to Neutral; a stored record counts as having
        // confirmed it either way once other fields exist.
        if !self.is_blank() || self.sentiment != Sentiment::Neutral {
            self.touched.insert(Field::Sentiment);
        }
        if !self.materials_shared.is_empty() {
            self.touched.insert(Field::MaterialsShared);
        }
        if !self.discussion_summary.trim().is_empty() {
            self.touched.insert(Field::DiscussionSummary);
        }
        if !self.products_discussed.is_empty() {
            self.touched.insert(Field::ProductsDiscussed);
        }
        if self.follow_up_date.is_some() {
            self.touched.insert(Field::FollowUpDate);
        }
        if !self.key_insights.trim().is_empty() {
            self.touched.insert(Field::KeyInsights);
        }
    }
}

/// A sparse set of field updates proposed by one tool for one turn.
///
/// Omitted fields always mean "leave unchanged"; there is no per-field clear
/// signal, only the whole-session reset. Materials and products arrive as raw
/// extraction strings and are validated during the merge, not here.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPatch {
    #[serde(default)]
    pub hcp_name: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub sentiment: Option<Sentiment>,
    #[serde(default)]
    pub materials_shared: Vec<String>,
    #[serde(default)]
    pub discussion_summary: Option<String>,
    #[serde(default)]
    pub products_discussed: Vec<String>,
    #[serde(default)]
    pub follow_up_date: Option<NaiveDate>,
    #[serde(default)]
    pub key_insights: Option<String>,
}

impl RecordPatch {
    /// True when the patch proposes nothing at all - a valid outcome of
    /// extraction finding zero matches, not an error.
    pub fn is_empty(&self) -> bool {
        self.hcp_name.as_deref().map_or(true, |v| v.trim().is_empty())
            && self.date.is_none()
            && self.sentiment.is_none()
            && self.materials_shared.is_empty()
            && self.discussion_summary.as_deref().map_or(true, |v| v.trim().is_empty())
            && self.products_discussed.is_empty()
            && self.follow_up_date.is_none()
            && self.key_insights.as_deref().map_or(true, |v| v.trim().is_empty())
    }
}
