//! Merging two communities into a new one.

use minijinja::context;
use tracing::{debug, error, info, warn};
use zousui_store::StoreError;
use zousui_types::{Community, CommunityId};

use super::{SimulationDeps, ensure_distinct, load_community};
use crate::context::RequestContext;
use crate::error::SimError;
use crate::parse::interpret_merge;
use crate::prompt::PromptKind;

/// Fuses two communities into a new one and removes the originals.
#[derive(Debug, Clone)]
pub struct Merge {
    deps: SimulationDeps,
}

impl Merge {
    /// Create the orchestrator.
    pub const fn new(deps: SimulationDeps) -> Self {
        Self { deps }
    }

    /// Merge `community_a` and `community_b` into a new community.
    ///
    /// The new community gets the summed population and either the merged
    /// culture from the backend or, when the answer is unusable, both
    /// cultures joined by the configured separator. It is inserted before
    /// A and then B are deleted, so a failure part-way never loses the
    /// originals and the result at once. A failed delete is reported, not
    /// undone.
    ///
    /// # Errors
    ///
    /// - [`SimError::InvalidInput`] for identical sources or a blank new id or name
    /// - [`SimError::NotFound`] if either source does not exist
    /// - [`SimError::AlreadyExists`] if `new_id` is taken
    /// - [`SimError::Generation`] or [`SimError::Interrupted`] from the generator
    /// - [`SimError::Persistence`] if the insert or a delete fails
    pub async fn execute(
        &self,
        ctx: &RequestContext,
        community_a: &CommunityId,
        community_b: &CommunityId,
        new_id: &CommunityId,
        new_name: &str,
    ) -> Result<Community, SimError> {
        ctx.check()?;
        ensure_distinct(community_a, community_b)?;
        if new_id.is_blank() {
            return Err(SimError::InvalidInput("new community id is empty".to_owned()));
        }
        if new_name.trim().is_empty() {
            return Err(SimError::InvalidInput("new community name is empty".to_owned()));
        }
        debug!(
            community_a = %community_a,
            community_b = %community_b,
            new_id = %new_id,
            "merge started"
        );

        let store = &self.deps.store;
        let a = load_community(store, community_a)?;
        let b = load_community(store, community_b)?;
        match store.communities.get(new_id) {
            Ok(_) => return Err(SimError::AlreadyExists(format!("community {new_id}"))),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let prompt = self
            .deps
            .prompts
            .render(PromptKind::Merge, context! { a => &a, b => &b })?;
        debug!(prompt = %prompt, "merge prompt built");

        let response = self.deps.generator.generate(ctx, &prompt, "").await?;
        debug!(response = %response, "merge response received");

        let culture = interpret_merge(&response).unwrap_or_else(|| {
            warn!(
                community_a = %a.id,
                community_b = %b.id,
                "falling back to concatenated cultures"
            );
            format!("{}{}{}", a.culture, self.deps.settings.merge_separator, b.culture)
        });

        let merged = Community::new(
            new_id.clone(),
            new_name.trim(),
            a.population.saturating_add(b.population),
            culture,
        )
        .with_description(format!("Merged from {} and {}", a.name, b.name));

        store.communities.insert(&merged).map_err(|e| match e {
            StoreError::AlreadyExists { .. } => SimError::AlreadyExists(e.to_string()),
            other => {
                error!(community_id = %merged.id, error = %other, "failed to save merged community");
                SimError::Persistence(other)
            }
        })?;
        for source in [&a.id, &b.id] {
            store.communities.delete(source).map_err(|e| {
                error!(community_id = %source, error = %e, "failed to delete merged source");
                SimError::Persistence(e)
            })?;
        }

        info!(
            community_id = %merged.id,
            community_a = %a.id,
            community_b = %b.id,
            population = merged.population,
            "communities merged"
        );
        Ok(merged)
    }
}
