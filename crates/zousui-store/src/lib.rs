//! Entity store for the zousui community simulation.
//!
//! Holds communities, agents, and the append-only simulation log for the
//! lifetime of the process. The simulation core only sees the repository
//! traits, so a different backing store can be swapped in without touching
//! the orchestration code.
//!
//! # Modules
//!
//! - [`repository`] -- Repository traits and the [`EntityStore`] bundle
//! - [`memory`] -- `RwLock`-guarded in-memory implementations
//! - [`seed`] -- Demo communities and agents
//! - [`error`] -- Shared error type

pub mod error;
pub mod memory;
pub mod repository;
pub mod seed;

pub use error::StoreError;
pub use memory::{MemoryAgentStore, MemoryCommunityStore, MemorySimulationStore};
pub use repository::{AgentRepository, CommunityRepository, EntityStore, SimulationRepository};
pub use seed::seed_demo;
