//! Inbound trigger surface: one method per orchestrator.
//!
//! A transport layer (the CLI runner today) holds one [`Simulator`] and
//! maps its own requests onto these calls. Nothing here knows about
//! framing, status codes, or output formats.

use std::path::Path;
use std::sync::Arc;

use tracing::info;
use zousui_store::EntityStore;
use zousui_types::{Community, CommunityId};

use crate::community::CommunityService;
use crate::config::SimConfig;
use crate::context::RequestContext;
use crate::error::SimError;
use crate::generator::AggregatingGenerator;
use crate::llm::create_backend;
use crate::orchestrator::{
    CultureEvolution, Diplomacy, DiplomacyRound, Interference, Merge, PairInterference,
    PairOutcome, SimSettings, SimulationDeps,
};
use crate::prompt::PromptEngine;

/// Every simulation trigger, wired to one store and one generator.
#[derive(Debug, Clone)]
pub struct Simulator {
    communities: CommunityService,
    evolution: CultureEvolution,
    interference: Interference,
    pair_interference: PairInterference,
    diplomacy: Diplomacy,
    merge: Merge,
    generator: Arc<AggregatingGenerator>,
}

impl Simulator {
    /// Wire every orchestrator to `deps`.
    pub fn new(deps: SimulationDeps) -> Self {
        Self {
            communities: CommunityService::new(deps.store.clone()),
            evolution: CultureEvolution::new(deps.clone()),
            interference: Interference::new(deps.clone()),
            pair_interference: PairInterference::new(deps.clone()),
            diplomacy: Diplomacy::new(deps.clone()),
            generator: Arc::clone(&deps.generator),
            merge: Merge::new(deps),
        }
    }

    /// Build backends, templates, and the generator from `config`.
    ///
    /// # Errors
    ///
    /// [`SimError::Config`] or [`SimError::Template`] if the templates or
    /// backend list are unusable.
    pub fn from_config(config: &SimConfig, store: EntityStore) -> Result<Self, SimError> {
        let prompts = Arc::new(PromptEngine::new(
            config.templates_dir.as_deref().map(Path::new),
        )?);
        let backends = config.backends.iter().map(create_backend).collect::<Vec<_>>();
        for backend in &backends {
            info!(backend = backend.name(), kind = backend.kind(), "backend configured");
        }

        let generator = AggregatingGenerator::new(backends, config.aggregation, Arc::clone(&prompts))?
            .with_fallback_token(config.inspiration_fallback.clone());
        info!(mode = ?config.aggregation, "generator ready");

        Ok(Self::new(SimulationDeps {
            store,
            generator: Arc::new(generator),
            prompts,
            settings: Arc::new(SimSettings::from_config(config)),
        }))
    }

    /// Community, agent, and history operations.
    pub const fn communities(&self) -> &CommunityService {
        &self.communities
    }

    /// The shared generator.
    pub fn generator(&self) -> &AggregatingGenerator {
        &self.generator
    }

    /// Evolve one community's culture.
    pub async fn evolve(
        &self,
        ctx: &RequestContext,
        community_id: &CommunityId,
    ) -> Result<Community, SimError> {
        self.evolution.execute(ctx, community_id).await
    }

    /// Apply interference to one community.
    pub async fn interfere(
        &self,
        ctx: &RequestContext,
        community_id: &CommunityId,
        user_input: Option<&str>,
    ) -> Result<Community, SimError> {
        self.interference.execute(ctx, community_id, user_input).await
    }

    /// Apply interference to two communities and record it.
    pub async fn interfere_pair(
        &self,
        ctx: &RequestContext,
        community_a: &CommunityId,
        community_b: &CommunityId,
        user_input: &str,
    ) -> Result<PairOutcome, SimError> {
        self.pair_interference
            .execute(ctx, community_a, community_b, user_input)
            .await
    }

    /// Run a diplomacy round between two communities.
    pub async fn diplomacy(
        &self,
        ctx: &RequestContext,
        community_a: &CommunityId,
        community_b: &CommunityId,
    ) -> Result<DiplomacyRound, SimError> {
        self.diplomacy.execute(ctx, community_a, community_b).await
    }

    /// Merge two communities into `new_id`.
    pub async fn merge(
        &self,
        ctx: &RequestContext,
        community_a: &CommunityId,
        community_b: &CommunityId,
        new_id: &CommunityId,
        new_name: &str,
    ) -> Result<Community, SimError> {
        self.merge
            .execute(ctx, community_a, community_b, new_id, new_name)
            .await
    }
}
