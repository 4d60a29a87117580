//! Single-community culture evolution.

use minijinja::context;
use tracing::{debug, info};
use zousui_types::{Community, CommunityId};

use super::{SimulationDeps, apply_single_sided, load_community, persist_community};
use crate::context::RequestContext;
use crate::error::SimError;
use crate::parse::interpret_single;
use crate::prompt::PromptKind;

/// Evolves one community's culture from its current state and members.
#[derive(Debug, Clone)]
pub struct CultureEvolution {
    deps: SimulationDeps,
}

impl CultureEvolution {
    /// Create the orchestrator.
    pub const fn new(deps: SimulationDeps) -> Self {
        Self { deps }
    }

    /// Run one evolution step and return the stored community.
    ///
    /// Unstructured backend output is appended to the culture rather than
    /// failing the call.
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
    ) -> Result<Community, SimError> {
        ctx.check()?;
        debug!(community_id = %community_id, "culture evolution started");

        let store = &self.deps.store;
        let mut community = load_community(store, community_id)?;
        let agents = store.agents.get_by_community(community_id)?;

        let prompt = self.deps.prompts.render(
            PromptKind::Evolution,
            context! { community => &community, agents => &agents },
        )?;
        debug!(community_id = %community_id, prompt = %prompt, "evolution prompt built");

        let response = self.deps.generator.generate(ctx, &prompt, "").await?;
        debug!(community_id = %community_id, response = %response, "evolution response received");

        apply_single_sided(
            &mut community,
            interpret_single(&response),
            &self.deps.settings.append_marker,
        );
        persist_community(store, &community)?;

        info!(
            community_id = %community.id,
            population = community.population,
            agents = agents.len(),
            "culture evolution applied"
        );
        Ok(community)
    }
}
