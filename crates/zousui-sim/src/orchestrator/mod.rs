//! Simulation orchestrators.
//!
//! Every orchestrator follows the same ordering within one call: read all
//! the entities it needs, build a prompt, call the generator, interpret the
//! result, mutate the in-memory copies, then persist. Nothing is read back
//! after mutation starts, and no write is undone if a later one fails.
//!
//! - [`evolution`] -- one community evolves from its own members
//! - [`interference`] -- outside interference on one or two communities
//! - [`diplomacy`] -- two communities meet
//! - [`merge`] -- two communities become one

pub mod diplomacy;
pub mod evolution;
pub mod interference;
pub mod merge;

use std::sync::Arc;

use tracing::error;
use zousui_store::EntityStore;
use zousui_types::{Community, CommunityId, SimulationDraft, SimulationResult};

use crate::config::SimConfig;
use crate::error::SimError;
use crate::generator::AggregatingGenerator;
use crate::parse::SingleSided;
use crate::prompt::PromptEngine;

pub use diplomacy::{Diplomacy, DiplomacyRound};
pub use evolution::CultureEvolution;
pub use interference::{Interference, PairInterference, PairOutcome};
pub use merge::Merge;

/// Text conventions shared by the orchestrators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimSettings {
    /// Inserted between an existing culture and appended text.
    pub append_marker: String,
    /// Joins both cultures when a merge response is unusable.
    pub merge_separator: String,
}

impl Default for SimSettings {
    fn default() -> Self {
        let config = SimConfig::default();
        Self::from_config(&config)
    }
}

impl SimSettings {
    /// Extract the orchestrator settings from the full configuration.
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            append_marker: config.append_marker.clone(),
            merge_separator: config.merge_separator.clone(),
        }
    }
}

/// Collaborators every orchestrator needs. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SimulationDeps {
    /// Entity store.
    pub store: EntityStore,
    /// Generator all prompts are sent through.
    pub generator: Arc<AggregatingGenerator>,
    /// Prompt templates.
    pub prompts: Arc<PromptEngine>,
    /// Text conventions.
    pub settings: Arc<SimSettings>,
}

// ---------------------------------------------------------------------------
// Shared steps
// ---------------------------------------------------------------------------

fn load_community(store: &EntityStore, id: &CommunityId) -> Result<Community, SimError> {
    Ok(store.communities.get(id)?)
}

fn ensure_distinct(a: &CommunityId, b: &CommunityId) -> Result<(), SimError> {
    if a == b {
        return Err(SimError::InvalidInput(format!(
            "a community cannot interact with itself: {a}"
        )));
    }
    Ok(())
}

/// Save one community. Every store failure here is a persistence failure.
fn persist_community(store: &EntityStore, community: &Community) -> Result<(), SimError> {
    store.communities.save(community).map_err(|e| {
        error!(community_id = %community.id, error = %e, "failed to save community");
        SimError::Persistence(e)
    })
}

fn persist_record(
    store: &EntityStore,
    draft: SimulationDraft,
) -> Result<SimulationResult, SimError> {
    let kind = draft.kind.clone();
    store.simulations.save(draft).map_err(|e| {
        error!(kind = %kind, error = %e, "failed to save simulation record");
        SimError::Persistence(e)
    })
}

/// Apply a single-sided outcome to `community`.
///
/// A structured answer replaces the culture (unless it came back blank)
/// and shifts the population. Unstructured text is appended verbatim after
/// `marker` and leaves the population alone.
fn apply_single_sided(community: &mut Community, outcome: SingleSided, marker: &str) {
    match outcome {
        SingleSided::Structured(update) => {
            if !update.new_culture.trim().is_empty() {
                community.update_culture(update.new_culture);
            }
            community.apply_population_change(update.population_change);
        }
        SingleSided::Unstructured(raw) => community.append_culture(marker, &raw),
    }
}
