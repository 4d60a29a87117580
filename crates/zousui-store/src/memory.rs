//! In-memory repository implementations.
//!
//! Each repository guards its map with a [`RwLock`]: any number of readers,
//! or exactly one writer. Records are cloned in and out so nothing outside
//! the lock aliases stored data.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tracing::debug;
use zousui_types::{
    Agent, AgentId, Community, CommunityId, SimulationDraft, SimulationId, SimulationResult,
};

use crate::error::StoreError;
use crate::repository::{AgentRepository, CommunityRepository, SimulationRepository};

fn read<'a, T>(lock: &'a RwLock<T>, name: &'static str) -> Result<RwLockReadGuard<'a, T>, StoreError> {
    lock.read().map_err(|_poisoned| StoreError::Poisoned(name))
}

fn write<'a, T>(
    lock: &'a RwLock<T>,
    name: &'static str,
) -> Result<RwLockWriteGuard<'a, T>, StoreError> {
    lock.write().map_err(|_poisoned| StoreError::Poisoned(name))
}

// ---------------------------------------------------------------------------
// Communities
// ---------------------------------------------------------------------------

/// Community records keyed by identifier.
#[derive(Debug, Default)]
pub struct MemoryCommunityStore {
    communities: RwLock<BTreeMap<CommunityId, Community>>,
}

impl MemoryCommunityStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CommunityRepository for MemoryCommunityStore {
    fn get(&self, id: &CommunityId) -> Result<Community, StoreError> {
        read(&self.communities, "communities")?
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "community",
                id: id.to_string(),
            })
    }

    fn save(&self, community: &Community) -> Result<(), StoreError> {
        write(&self.communities, "communities")?.insert(community.id.clone(), community.clone());
        debug!(community_id = %community.id, "community saved");
        Ok(())
    }

    fn insert(&self, community: &Community) -> Result<(), StoreError> {
        let mut map = write(&self.communities, "communities")?;
        if map.contains_key(&community.id) {
            return Err(StoreError::AlreadyExists {
                entity: "community",
                id: community.id.to_string(),
            });
        }
        map.insert(community.id.clone(), community.clone());
        debug!(community_id = %community.id, "community inserted");
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<Community>, StoreError> {
        Ok(read(&self.communities, "communities")?.values().cloned().collect())
    }

    fn delete(&self, id: &CommunityId) -> Result<(), StoreError> {
        if write(&self.communities, "communities")?.remove(id).is_none() {
            return Err(StoreError::NotFound {
                entity: "community",
                id: id.to_string(),
            });
        }
        debug!(community_id = %id, "community deleted");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

/// Agent records keyed by identifier.
#[derive(Debug, Default)]
pub struct MemoryAgentStore {
    agents: RwLock<BTreeMap<AgentId, Agent>>,
}

impl MemoryAgentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl AgentRepository for MemoryAgentStore {
    fn get(&self, id: &AgentId) -> Result<Agent, StoreError> {
        read(&self.agents, "agents")?
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "agent",
                id: id.to_string(),
            })
    }

    fn save(&self, agent: &Agent) -> Result<(), StoreError> {
        write(&self.agents, "agents")?.insert(agent.id.clone(), agent.clone());
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<Agent>, StoreError> {
        Ok(read(&self.agents, "agents")?.values().cloned().collect())
    }

    fn get_by_community(&self, community_id: &CommunityId) -> Result<Vec<Agent>, StoreError> {
        Ok(read(&self.agents, "agents")?
            .values()
            .filter(|agent| &agent.community_id == community_id)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Simulation records
// ---------------------------------------------------------------------------

/// Append-only simulation log.
#[derive(Debug, Default)]
pub struct MemorySimulationStore {
    records: RwLock<Vec<SimulationResult>>,
}

impl MemorySimulationStore {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SimulationRepository for MemorySimulationStore {
    fn save(&self, draft: SimulationDraft) -> Result<SimulationResult, StoreError> {
        let record = draft.into_result(SimulationId::new(), Utc::now());
        write(&self.records, "simulations")?.push(record.clone());
        debug!(simulation_id = %record.id, kind = record.kind, "simulation record saved");
        Ok(record)
    }

    fn get_all(&self) -> Result<Vec<SimulationResult>, StoreError> {
        Ok(read(&self.records, "simulations")?.clone())
    }
}
