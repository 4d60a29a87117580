//! Core entity structs: communities, agents, and simulation audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{AgentId, CommunityId, SimulationId};

// ---------------------------------------------------------------------------
// Community
// ---------------------------------------------------------------------------

/// A simulated community whose culture and population evolve over time.
///
/// `population` is unsigned, so the "never negative" rule is enforced by
/// the type; [`Community::apply_population_change`] clamps at zero instead
/// of wrapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Community {
    /// Unique identifier, immutable after creation.
    pub id: CommunityId,
    /// Display name.
    pub name: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Current population.
    pub population: u64,
    /// Free-text culture description.
    #[serde(default)]
    pub culture: String,
    /// When the culture was last changed.
    pub updated_at: DateTime<Utc>,
}

impl Community {
    /// Create a community stamped with the current time.
    pub fn new(
        id: impl Into<CommunityId>,
        name: impl Into<String>,
        population: u64,
        culture: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            population,
            culture: culture.into(),
            updated_at: Utc::now(),
        }
    }

    /// Builder-style setter for the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Replace the culture and refresh the timestamp.
    pub fn update_culture(&mut self, culture: impl Into<String>) {
        self.culture = culture.into();
        self.updated_at = Utc::now();
    }

    /// Append `text` to the current culture, separated by `marker`.
    ///
    /// An empty current culture is replaced outright so the result never
    /// starts with a dangling marker.
    pub fn append_culture(&mut self, marker: &str, text: &str) {
        let combined = if self.culture.is_empty() {
            text.to_owned()
        } else {
            format!("{}{marker}{text}", self.culture)
        };
        self.update_culture(combined);
    }

    /// Add a signed delta to the population, clamping at zero.
    pub const fn apply_population_change(&mut self, delta: i64) {
        self.population = apply_delta(self.population, delta);
    }
}

/// Add a signed delta to an unsigned population, saturating at both ends.
pub const fn apply_delta(population: u64, delta: i64) -> u64 {
    if delta < 0 {
        population.saturating_sub(delta.unsigned_abs())
    } else {
        population.saturating_add(delta.unsigned_abs())
    }
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// A named personality that belongs to exactly one community.
///
/// Agents are simulation input only; no flow mutates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Agent {
    /// Unique agent identifier.
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// Owning community.
    pub community_id: CommunityId,
    /// Free-text personality descriptor.
    pub personality: String,
}

impl Agent {
    /// Create an agent owned by `community_id`.
    pub fn new(
        id: impl Into<AgentId>,
        name: impl Into<String>,
        community_id: impl Into<CommunityId>,
        personality: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            community_id: community_id.into(),
            personality: personality.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Simulation audit records
// ---------------------------------------------------------------------------

/// Type tag written for two-community interference records.
pub const SIMULATION_KIND_INTERFERENCE: &str = "interference";

/// Type tag written for diplomacy records.
pub const SIMULATION_KIND_DIPLOMACY: &str = "diplomacy";

/// A simulation record before the store has assigned its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationDraft {
    /// Free-form type tag (e.g. `"interference"`).
    pub kind: String,
    /// Communities involved, in the order they were passed to the flow.
    pub communities: Vec<CommunityId>,
    /// The applied structured result, serialized as JSON text.
    pub result_json: String,
}

impl SimulationDraft {
    /// Stamp the draft with an identifier and creation time.
    pub fn into_result(self, id: SimulationId, created_at: DateTime<Utc>) -> SimulationResult {
        SimulationResult {
            id,
            kind: self.kind,
            communities: self.communities,
            result_json: self.result_json,
            created_at,
        }
    }
}

/// Append-only audit record of one simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct SimulationResult {
    /// Generated identifier.
    pub id: SimulationId,
    /// Free-form type tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Communities involved.
    pub communities: Vec<CommunityId>,
    /// The structured result payload serialized as text.
    pub result_json: String,
    /// Assigned when the record is saved.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn negative_delta_clamps_at_zero() {
        let mut comm = Community::new("comm-1", "DesertTribe", 10, "desert survival");
        comm.apply_population_change(-50);
        assert_eq!(comm.population, 0);
    }

    #[test]
    fn positive_delta_adds() {
        let mut comm = Community::new("comm-1", "DesertTribe", 100, "desert survival");
        comm.apply_population_change(15);
        assert_eq!(comm.population, 115);
    }

    #[test]
    fn extreme_deltas_saturate() {
        assert_eq!(apply_delta(u64::MAX, i64::MAX), u64::MAX);
        assert_eq!(apply_delta(5, i64::MIN), 0);
    }

    #[test]
    fn update_culture_refreshes_timestamp() {
        let mut comm = Community::new("comm-1", "DesertTribe", 100, "desert survival");
        let before = comm.updated_at;
        comm.update_culture("festival of dance");
        assert_eq!(comm.culture, "festival of dance");
        assert!(comm.updated_at >= before);
    }

    #[test]
    fn append_culture_uses_marker() {
        let mut comm = Community::new("comm-1", "DesertTribe", 100, "desert survival");
        comm.append_culture(" | ", "raw text");
        assert_eq!(comm.culture, "desert survival | raw text");

        let mut empty = Community::new("comm-2", "Nowhere", 0, "");
        empty.append_culture(" | ", "raw text");
        assert_eq!(empty.culture, "raw text");
    }

    #[test]
    fn simulation_result_serializes_type_tag() {
        let draft = SimulationDraft {
            kind: SIMULATION_KIND_INTERFERENCE.to_owned(),
            communities: vec![CommunityId::new("a"), CommunityId::new("b")],
            result_json: "{}".to_owned(),
        };
        let result = draft.into_result(SimulationId::new(), Utc::now());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json.get("type"), Some(&serde_json::json!("interference")));
        assert_eq!(json.get("communities"), Some(&serde_json::json!(["a", "b"])));
    }
}
