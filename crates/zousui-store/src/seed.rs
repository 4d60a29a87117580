//! Demo seed data.
//!
//! Two communities and two agents, enough to exercise every simulation
//! flow from a fresh process.

use tracing::info;
use zousui_types::{Agent, Community};

use crate::error::StoreError;
use crate::repository::EntityStore;

/// Communities inserted by [`seed_demo`].
pub fn demo_communities() -> Vec<Community> {
    vec![
        Community::new("comm-1", "DesertTribe", 100, "A culture built around desert survival skills")
            .with_description("Nomads of the dune sea"),
        Community::new("comm-2", "OceanicCity", 300, "A peaceful undersea nation that loves song and dance")
            .with_description("A city beneath the waves"),
    ]
}

/// Agents inserted by [`seed_demo`].
pub fn demo_agents() -> Vec<Agent> {
    vec![
        Agent::new("agent-1", "Aisha", "comm-1", "curious and gentle"),
        Agent::new("agent-2", "Jamal", "comm-1", "brave and combative"),
    ]
}

/// Insert the demo communities and agents.
///
/// Communities that already exist are overwritten so reseeding a running
/// store resets the demo state.
pub fn seed_demo(store: &EntityStore) -> Result<(), StoreError> {
    let communities = demo_communities();
    let agents = demo_agents();
    for community in &communities {
        store.communities.save(community)?;
    }
    for agent in &agents {
        store.agents.save(agent)?;
    }
    info!(
        communities = communities.len(),
        agents = agents.len(),
        "demo seed data inserted"
    );
    Ok(())
}
