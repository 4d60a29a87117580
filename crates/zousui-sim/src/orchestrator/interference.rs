//! Interference from multiple intelligences on one or two communities.

use minijinja::context;
use serde::Serialize;
use tracing::{debug, info, warn};
use zousui_types::{
    Community, CommunityId, SIMULATION_KIND_INTERFERENCE, SimulationDraft, SimulationResult,
    TwoSidedUpdate,
};

use super::{
    SimulationDeps, apply_single_sided, ensure_distinct, load_community, persist_community,
    persist_record,
};
use crate::context::RequestContext;
use crate::error::SimError;
use crate::parse::{interpret_single, interpret_two_sided};
use crate::prompt::PromptKind;

// ---------------------------------------------------------------------------
// Single community
// ---------------------------------------------------------------------------

/// Applies outside interference to one community.
#[derive(Debug, Clone)]
pub struct Interference {
    deps: SimulationDeps,
}

impl Interference {
    /// Create the orchestrator.
    pub const fn new(deps: SimulationDeps) -> Self {
        Self { deps }
    }

    /// Run one interference step and return the stored community.
    ///
    /// `user_input` describes the intervention and is passed through to
    /// every backend. Output that does not decode is appended to the
    /// culture verbatim.
    ///
    /// # Errors
    ///
    /// - [`SimError::NotFound`] if the community does not exist
    /// - [`SimError::Generation`] or [`SimError::Interrupted`] from the generator
    /// - [`SimError::Persistence`] if the save fails
    pub async fn execute(
        &self,
        ctx: &RequestContext,
        community_id: &CommunityId,
        user_input: Option<&str>,
    ) -> Result<Community, SimError> {
        ctx.check()?;
        let user_input = user_input.unwrap_or_default();
        debug!(community_id = %community_id, "interference started");

        let store = &self.deps.store;
        let mut community = load_community(store, community_id)?;
        let agents = store.agents.get_by_community(community_id)?;

        let prompt = self.deps.prompts.render(
            PromptKind::Interference,
            context! { community => &community, agents => &agents, user_input => user_input },
        )?;
        debug!(community_id = %community_id, prompt = %prompt, "interference prompt built");

        let response = self.deps.generator.generate(ctx, &prompt, user_input).await?;
        debug!(community_id = %community_id, response = %response, "interference response received");

        apply_single_sided(
            &mut community,
            interpret_single(&response),
            &self.deps.settings.append_marker,
        );
        persist_community(store, &community)?;

        info!(
            community_id = %community.id,
            population = community.population,
            "interference applied"
        );
        Ok(community)
    }
}

// ---------------------------------------------------------------------------
// Two communities
// ---------------------------------------------------------------------------

/// Result of a two-community interference.
#[derive(Debug, Clone, Serialize)]
pub struct PairOutcome {
    /// Community A as stored.
    pub a: Community,
    /// Community B as stored.
    pub b: Community,
    /// The audit record that was appended.
    pub record: SimulationResult,
}

/// Applies outside interference to two communities at once and records it.
#[derive(Debug, Clone)]
pub struct PairInterference {
    deps: SimulationDeps,
}

impl PairInterference {
    /// Create the orchestrator.
    pub const fn new(deps: SimulationDeps) -> Self {
        Self { deps }
    }

    /// Run one two-community interference.
    ///
    /// A backend that answers in the single-sided shape changes community
    /// A only. Saves A, then B, then an `interference` audit record; a
    /// failed save is reported without undoing the ones before it.
    ///
    /// # Errors
    ///
    /// - [`SimError::InvalidInput`] if both identifiers are the same
    /// - [`SimError::NotFound`] if either community does not exist
    /// - [`SimError::Generation`] or [`SimError::Interrupted`] from the generator
    /// - [`SimError::Parse`] if the answer fits neither shape (nothing is changed)
    /// - [`SimError::Persistence`] if a save fails
    pub async fn execute(
        &self,
        ctx: &RequestContext,
        community_a: &CommunityId,
        community_b: &CommunityId,
        user_input: &str,
    ) -> Result<PairOutcome, SimError> {
        ctx.check()?;
        ensure_distinct(community_a, community_b)?;
        debug!(community_a = %community_a, community_b = %community_b, "pair interference started");

        let store = &self.deps.store;
        let mut a = load_community(store, community_a)?;
        let mut b = load_community(store, community_b)?;

        let prompt = self.deps.prompts.render(
            PromptKind::InterferencePair,
            context! { a => &a, b => &b, user_input => user_input },
        )?;
        debug!(prompt = %prompt, "pair interference prompt built");

        let response = self.deps.generator.generate(ctx, &prompt, user_input).await?;
        debug!(response = %response, "pair interference response received");

        let update = interpret_two_sided(&response).inspect_err(|e| {
            warn!(
                community_a = %community_a,
                community_b = %community_b,
                error = %e,
                "pair interference response unusable, nothing applied"
            );
        })?;
        apply_two_sided(&mut a, &mut b, &update);

        let result_json = serde_json::to_string(&update)?;

        persist_community(store, &a)?;
        persist_community(store, &b)?;
        let record = persist_record(
            store,
            SimulationDraft {
                kind: SIMULATION_KIND_INTERFERENCE.to_owned(),
                communities: vec![a.id.clone(), b.id.clone()],
                result_json,
            },
        )?;

        info!(
            community_a = %a.id,
            community_b = %b.id,
            simulation_id = %record.id,
            "pair interference applied"
        );
        Ok(PairOutcome { a, b, record })
    }
}

/// Apply each side of `update`; blank cultures leave that side's culture.
fn apply_two_sided(a: &mut Community, b: &mut Community, update: &TwoSidedUpdate) {
    if !update.new_culture_a.trim().is_empty() {
        a.update_culture(update.new_culture_a.clone());
    }
    a.apply_population_change(update.population_change_a);

    if !update.new_culture_b.trim().is_empty() {
        b.update_culture(update.new_culture_b.clone());
    }
    b.apply_population_change(update.population_change_b);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_a_only_update_leaves_b_untouched() {
        let mut a = Community::new("a", "A", 100, "sand");
        let mut b = Community::new("b", "B", 300, "sea");
        let before = b.clone();

        let update = TwoSidedUpdate {
            new_culture_a: "X".to_owned(),
            population_change_a: 5,
            ..TwoSidedUpdate::default()
        };
        apply_two_sided(&mut a, &mut b, &update);

        assert_eq!(a.culture, "X");
        assert_eq!(a.population, 105);
        assert_eq!(b, before);
    }

    #[test]
    fn both_sides_clamp_at_zero() {
        let mut a = Community::new("a", "A", 3, "sand");
        let mut b = Community::new("b", "B", 7, "sea");
        let update = TwoSidedUpdate {
            new_culture_a: "ruins".to_owned(),
            population_change_a: -10,
            new_culture_b: "exodus".to_owned(),
            population_change_b: -8,
        };
        apply_two_sided(&mut a, &mut b, &update);
        assert_eq!((a.population, b.population), (0, 0));
        assert_eq!(b.culture, "exodus");
    }
}
