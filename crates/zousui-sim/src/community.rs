//! Plain community, agent, and history operations that need no generation.

use tracing::{debug, info, warn};
use zousui_store::EntityStore;
use zousui_types::{Agent, Community, CommunityId, SimulationResult};

use crate::error::SimError;

/// Create, inspect, and delete communities; query agents and history.
#[derive(Debug, Clone)]
pub struct CommunityService {
    store: EntityStore,
}

impl CommunityService {
    /// Create the service over `store`.
    pub const fn new(store: EntityStore) -> Self {
        Self { store }
    }

    /// Insert a new community.
    ///
    /// # Errors
    ///
    /// - [`SimError::InvalidInput`] if the id or name is blank
    /// - [`SimError::AlreadyExists`] if the id is taken
    pub fn create(&self, community: Community) -> Result<Community, SimError> {
        if community.id.is_blank() {
            return Err(SimError::InvalidInput("community id is empty".to_owned()));
        }
        if community.name.trim().is_empty() {
            return Err(SimError::InvalidInput("community name is empty".to_owned()));
        }

        debug!(community_id = %community.id, "creating community");
        self.store.communities.insert(&community).inspect_err(|e| {
            warn!(community_id = %community.id, error = %e, "community not created");
        })?;
        info!(community_id = %community.id, "community created");
        Ok(community)
    }

    /// Fetch one community.
    pub fn get(&self, id: &CommunityId) -> Result<Community, SimError> {
        Ok(self.store.communities.get(id)?)
    }

    /// Every community, ordered by identifier.
    pub fn list(&self) -> Result<Vec<Community>, SimError> {
        Ok(self.store.communities.get_all()?)
    }

    /// Delete one community. Its agents are left in place.
    pub fn delete(&self, id: &CommunityId) -> Result<(), SimError> {
        self.store.communities.delete(id)?;
        info!(community_id = %id, "community deleted");
        Ok(())
    }

    /// Agents belonging to `id`.
    ///
    /// # Errors
    ///
    /// [`SimError::NotFound`] if the community does not exist.
    pub fn agents_of(&self, id: &CommunityId) -> Result<Vec<Agent>, SimError> {
        self.store.communities.get(id)?;
        Ok(self.store.agents.get_by_community(id)?)
    }

    /// Register an agent with an existing community.
    ///
    /// # Errors
    ///
    /// - [`SimError::InvalidInput`] if the agent id or name is blank
    /// - [`SimError::NotFound`] if the owning community does not exist
    pub fn add_agent(&self, agent: Agent) -> Result<Agent, SimError> {
        if agent.id.is_blank() || agent.name.trim().is_empty() {
            return Err(SimError::InvalidInput("agent id and name are required".to_owned()));
        }
        self.store.communities.get(&agent.community_id)?;
        self.store.agents.save(&agent).map_err(SimError::Persistence)?;
        info!(agent_id = %agent.id, community_id = %agent.community_id, "agent added");
        Ok(agent)
    }

    /// Every simulation audit record in save order.
    pub fn history(&self) -> Result<Vec<SimulationResult>, SimError> {
        Ok(self.store.simulations.get_all()?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn service() -> CommunityService {
        CommunityService::new(EntityStore::in_memory())
    }

    #[test]
    fn create_then_get() {
        let svc = service();
        let created = svc.create(Community::new("comm-1", "DesertTribe", 100, "dunes"));
        assert!(created.is_ok());
        let fetched = svc.get(&CommunityId::new("comm-1")).map(|c| c.name);
        assert_eq!(fetched.ok().as_deref(), Some("DesertTribe"));
    }

    #[test]
    fn create_rejects_duplicates_and_blanks() {
        let svc = service();
        assert!(svc.create(Community::new("comm-1", "DesertTribe", 100, "")).is_ok());
        assert!(matches!(
            svc.create(Community::new("comm-1", "Other", 1, "")),
            Err(SimError::AlreadyExists(_))
        ));
        assert!(matches!(
            svc.create(Community::new("  ", "Blank", 1, "")),
            Err(SimError::InvalidInput(_))
        ));
        assert!(matches!(
            svc.create(Community::new("comm-2", "", 1, "")),
            Err(SimError::InvalidInput(_))
        ));
    }

    #[test]
    fn delete_missing_is_not_found() {
        let svc = service();
        assert!(matches!(
            svc.delete(&CommunityId::new("ghost")),
            Err(SimError::NotFound(_))
        ));
    }

    #[test]
    fn agents_follow_their_community() {
        let svc = service();
        assert!(svc.create(Community::new("comm-1", "DesertTribe", 100, "")).is_ok());
        assert!(svc.add_agent(Agent::new("agent-1", "Aisha", "comm-1", "curious")).is_ok());
        assert!(matches!(
            svc.add_agent(Agent::new("agent-9", "Nobody", "comm-9", "lost")),
            Err(SimError::NotFound(_))
        ));

        let agents = svc.agents_of(&CommunityId::new("comm-1")).unwrap();
        assert_eq!(agents.len(), 1);
        assert!(matches!(
            svc.agents_of(&CommunityId::new("comm-9")),
            Err(SimError::NotFound(_))
        ));
    }

    #[test]
    fn history_starts_empty() {
        assert!(service().history().unwrap().is_empty());
    }
}
