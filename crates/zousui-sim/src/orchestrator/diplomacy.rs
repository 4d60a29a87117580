//! Two-community diplomacy.

use minijinja::context;
use serde::Serialize;
use tracing::{debug, info, warn};
use zousui_types::{
    Community, CommunityId, DiplomacyReport, SIMULATION_KIND_DIPLOMACY, SimulationDraft,
    SimulationResult,
};

use super::{SimulationDeps, ensure_distinct, load_community, persist_community, persist_record};
use crate::context::RequestContext;
use crate::error::SimError;
use crate::parse::interpret_diplomacy;
use crate::prompt::PromptKind;

/// Everything a diplomacy round produced.
#[derive(Debug, Clone, Serialize)]
pub struct DiplomacyRound {
    /// Community A as stored.
    pub a: Community,
    /// Community B as stored.
    pub b: Community,
    /// The decoded report.
    pub report: DiplomacyReport,
    /// The audit record that was appended.
    pub record: SimulationResult,
}

/// Lets two communities meet and records the outcome.
#[derive(Debug, Clone)]
pub struct Diplomacy {
    deps: SimulationDeps,
}

impl Diplomacy {
    /// Create the orchestrator.
    pub const fn new(deps: SimulationDeps) -> Self {
        Self { deps }
    }

    /// Run one diplomacy round.
    ///
    /// Every outcome tag is applied the same way: the description is
    /// appended to both cultures and each side's population delta is
    /// applied. Saves A, then B, then a `diplomacy` audit record.
    ///
    /// # Errors
    ///
    /// - [`SimError::InvalidInput`] if both identifiers are the same
    /// - [`SimError::NotFound`] if either community does not exist
    /// - [`SimError::Generation`] or [`SimError::Interrupted`] from the generator
    /// - [`SimError::Parse`] if the report cannot be decoded (nothing is changed)
    /// - [`SimError::Persistence`] if a save fails
    pub async fn execute(
        &self,
        ctx: &RequestContext,
        community_a: &CommunityId,
        community_b: &CommunityId,
    ) -> Result<DiplomacyRound, SimError> {
        ctx.check()?;
        ensure_distinct(community_a, community_b)?;
        debug!(community_a = %community_a, community_b = %community_b, "diplomacy started");

        let store = &self.deps.store;
        let mut a = load_community(store, community_a)?;
        let mut b = load_community(store, community_b)?;

        let prompt = self
            .deps
            .prompts
            .render(PromptKind::Diplomacy, context! { a => &a, b => &b })?;
        debug!(prompt = %prompt, "diplomacy prompt built");

        let response = self.deps.generator.generate(ctx, &prompt, "").await?;
        debug!(response = %response, "diplomacy response received");

        let report = interpret_diplomacy(&response).inspect_err(|e| {
            warn!(
                community_a = %community_a,
                community_b = %community_b,
                error = %e,
                "diplomacy response unusable, nothing applied"
            );
        })?;

        let marker = &self.deps.settings.append_marker;
        let description = report.description.trim();
        a.append_culture(marker, description);
        a.apply_population_change(report.population_change_a);
        b.append_culture(marker, description);
        b.apply_population_change(report.population_change_b);

        let result_json = serde_json::to_string(&report)?;

        persist_community(store, &a)?;
        persist_community(store, &b)?;
        let record = persist_record(
            store,
            SimulationDraft {
                kind: SIMULATION_KIND_DIPLOMACY.to_owned(),
                communities: vec![a.id.clone(), b.id.clone()],
                result_json,
            },
        )?;

        info!(
            community_a = %a.id,
            community_b = %b.id,
            outcome = report.outcome.as_str(),
            population_a = a.population,
            population_b = b.population,
            "diplomacy applied"
        );
        Ok(DiplomacyRound {
            a,
            b,
            report,
            record,
        })
    }
}
