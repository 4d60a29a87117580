//! Simulation core for the zousui community simulation.
//!
//! Orchestrators read communities from the entity store, render a prompt,
//! send it through the [`AggregatingGenerator`] (which may fan out to
//! several generation backends and synthesize their answers), interpret the
//! returned text with tolerant parsing, and persist the updated entities.
//!
//! # Modules
//!
//! - [`config`] -- Environment-driven configuration
//! - [`context`] -- Per-request cancellation and deadlines
//! - [`llm`] -- Generation backends (`OpenAI`-compatible, Anthropic, Gemini, mock)
//! - [`generator`] -- Multi-backend fan-out and synthesis
//! - [`prompt`] -- `minijinja` prompt templates
//! - [`parse`] -- Result interpretation with recovery strategies
//! - [`orchestrator`] -- Evolution, interference, diplomacy, and merge flows
//! - [`community`] -- Plain community, agent, and history operations
//! - [`simulator`] -- One entry point per inbound trigger
//! - [`error`] -- Error types

pub mod community;
pub mod config;
pub mod context;
pub mod error;
pub mod generator;
pub mod llm;
pub mod orchestrator;
pub mod parse;
pub mod prompt;
pub mod simulator;

pub use community::CommunityService;
pub use config::{AggregationMode, BackendType, LlmBackendConfig, SimConfig};
pub use context::{CancelHandle, Interrupt, RequestContext};
pub use error::{GenerationError, ParseError, SimError};
pub use generator::AggregatingGenerator;
pub use llm::{LlmBackend, MockBackend, MockReply, create_backend};
pub use orchestrator::{DiplomacyRound, PairOutcome, SimSettings, SimulationDeps};
pub use prompt::{PromptEngine, PromptKind};
pub use simulator::Simulator;
