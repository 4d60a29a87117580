//! Structured-result payloads that generation backends are instructed to
//! return.
//!
//! The JSON field names here are the wire contract embedded in every prompt,
//! so they are camelCase and must not drift from the prompt templates.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Single-sided result: one community's new culture and population delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct CultureUpdate {
    /// Replacement culture description.
    pub new_culture: String,
    /// Signed population delta.
    #[serde(default)]
    #[ts(type = "number")]
    pub population_change: i64,
}

/// Two-sided result for flows that touch two communities.
///
/// Every field defaults so that a backend which answered in the
/// single-sided shape still decodes; both cultures then come back empty and
/// the caller can retry as a [`CultureUpdate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TwoSidedUpdate {
    /// New culture for side A.
    #[serde(default, rename = "newCultureA")]
    pub new_culture_a: String,
    /// Population delta for side A.
    #[serde(default, rename = "populationChangeA")]
    #[ts(type = "number")]
    pub population_change_a: i64,
    /// New culture for side B.
    #[serde(default, rename = "newCultureB")]
    pub new_culture_b: String,
    /// Population delta for side B.
    #[serde(default, rename = "populationChangeB")]
    #[ts(type = "number")]
    pub population_change_b: i64,
}

impl TwoSidedUpdate {
    /// Whether neither culture field carries any text.
    pub fn is_blank(&self) -> bool {
        self.new_culture_a.trim().is_empty() && self.new_culture_b.trim().is_empty()
    }

    /// Promote a single-sided answer to side A, leaving side B untouched.
    pub fn side_a_only(update: CultureUpdate) -> Self {
        Self {
            new_culture_a: update.new_culture,
            population_change_a: update.population_change,
            ..Self::default()
        }
    }
}

/// Outcome tag of a diplomacy round.
///
/// Unrecognized tags are preserved verbatim in [`DiplomacyOutcome::Other`];
/// every variant is applied the same way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DiplomacyOutcome {
    /// The communities made peace.
    Peace,
    /// The communities went to war.
    War,
    /// The communities started trading.
    Trade,
    /// The communities formed an alliance.
    Alliance,
    /// No tag was given.
    #[default]
    Unspecified,
    /// An unrecognized tag.
    Other(String),
}

impl DiplomacyOutcome {
    /// Canonical lowercase label.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Peace => "peace",
            Self::War => "war",
            Self::Trade => "trade",
            Self::Alliance => "alliance",
            Self::Unspecified => "",
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for DiplomacyOutcome {
    fn from(tag: String) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "peace" => Self::Peace,
            "war" => Self::War,
            "trade" => Self::Trade,
            "alliance" => Self::Alliance,
            "" => Self::Unspecified,
            _ => Self::Other(tag),
        }
    }
}

impl From<DiplomacyOutcome> for String {
    fn from(outcome: DiplomacyOutcome) -> Self {
        outcome.as_str().to_owned()
    }
}

/// Result of a diplomacy round between communities A and B.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct DiplomacyReport {
    /// Outcome tag (`peace`, `war`, `trade`, `alliance`, or anything else).
    #[serde(default)]
    #[ts(as = "String")]
    pub outcome: DiplomacyOutcome,
    /// What happened; appended to both cultures.
    pub description: String,
    /// Population delta for side A.
    #[serde(default, rename = "populationChangeA", alias = "popChangeA")]
    #[ts(type = "number")]
    pub population_change_a: i64,
    /// Population delta for side B.
    #[serde(default, rename = "populationChangeB", alias = "popChangeB")]
    #[ts(type = "number")]
    pub population_change_b: i64,
}

/// Result of a merge request: one fused culture description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct MergedCulture {
    /// The fused culture.
    pub merged_culture: String,
}
