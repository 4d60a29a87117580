//! Shared type definitions for the zousui community simulation.
//!
//! This crate is the single source of truth for the entities the store
//! holds and the structured payloads generation backends are asked to
//! return. Types flow downstream to `TypeScript` via `ts-rs` for the web
//! frontend.
//!
//! # Modules
//!
//! - [`ids`] -- Typed identifiers for communities, agents, and records
//! - [`structs`] -- `Community`, `Agent`, and `SimulationResult`
//! - [`payload`] -- Structured-result shapes (single-sided, two-sided,
//!   diplomacy, merge)

pub mod ids;
pub mod payload;
pub mod structs;

pub use ids::{AgentId, CommunityId, SimulationId};
pub use payload::{CultureUpdate, DiplomacyOutcome, DiplomacyReport, MergedCulture, TwoSidedUpdate};
pub use structs::{
    Agent, Community, SIMULATION_KIND_DIPLOMACY, SIMULATION_KIND_INTERFERENCE, SimulationDraft,
    SimulationResult, apply_delta,
};
