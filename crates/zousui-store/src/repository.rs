//! Repository traits: the store contract the simulation core consumes.
//!
//! Every method hands out owned copies, so a caller never holds a borrow
//! into the store past the call that produced it. Implementations must be
//! safe for concurrent use: concurrent reads of an entity are allowed, and a
//! write to an entity excludes every other access to it. No cross-entity
//! transactions are offered.

use std::sync::Arc;

use zousui_types::{Agent, AgentId, Community, CommunityId, SimulationDraft, SimulationResult};

use crate::error::StoreError;
use crate::memory::{MemoryAgentStore, MemoryCommunityStore, MemorySimulationStore};

/// Read/write access to communities.
pub trait CommunityRepository: Send + Sync {
    /// Fetch one community.
    fn get(&self, id: &CommunityId) -> Result<Community, StoreError>;

    /// Insert or overwrite a community keyed by its identifier.
    fn save(&self, community: &Community) -> Result<(), StoreError>;

    /// Insert a community, failing with [`StoreError::AlreadyExists`] if the
    /// identifier is taken. The check and the write happen under one lock.
    fn insert(&self, community: &Community) -> Result<(), StoreError>;

    /// Every stored community, ordered by identifier.
    fn get_all(&self) -> Result<Vec<Community>, StoreError>;

    /// Remove a community.
    fn delete(&self, id: &CommunityId) -> Result<(), StoreError>;
}

/// Read/write access to agents.
pub trait AgentRepository: Send + Sync {
    /// Fetch one agent.
    fn get(&self, id: &AgentId) -> Result<Agent, StoreError>;

    /// Insert or overwrite an agent keyed by its identifier.
    fn save(&self, agent: &Agent) -> Result<(), StoreError>;

    /// Every stored agent, ordered by identifier.
    fn get_all(&self) -> Result<Vec<Agent>, StoreError>;

    /// Agents owned by `community_id`, ordered by identifier.
    fn get_by_community(&self, community_id: &CommunityId) -> Result<Vec<Agent>, StoreError>;
}

/// Append-only log of simulation audit records.
pub trait SimulationRepository: Send + Sync {
    /// Assign an identifier and creation time, then append.
    fn save(&self, draft: SimulationDraft) -> Result<SimulationResult, StoreError>;

    /// Every record in save order.
    fn get_all(&self) -> Result<Vec<SimulationResult>, StoreError>;
}

/// The full entity store handed to the simulation core.
///
/// Cheap to clone; all clones share the same underlying repositories.
#[derive(Clone)]
pub struct EntityStore {
    /// Community records.
    pub communities: Arc<dyn CommunityRepository>,
    /// Agent records.
    pub agents: Arc<dyn AgentRepository>,
    /// Simulation audit records.
    pub simulations: Arc<dyn SimulationRepository>,
}

impl EntityStore {
    /// Assemble a store from explicit repository implementations.
    pub fn new(
        communities: Arc<dyn CommunityRepository>,
        agents: Arc<dyn AgentRepository>,
        simulations: Arc<dyn SimulationRepository>,
    ) -> Self {
        Self {
            communities,
            agents,
            simulations,
        }
    }

    /// A process-lifetime store backed by in-memory maps.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryCommunityStore::new()),
            Arc::new(MemoryAgentStore::new()),
            Arc::new(MemorySimulationStore::new()),
        )
    }
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore").finish_non_exhaustive()
    }
}
