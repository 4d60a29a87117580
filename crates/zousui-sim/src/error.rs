//! Error types for the simulation core.
//!
//! Errors follow the taxonomy the orchestrators care about: a single
//! backend failing is a [`GenerationError`] that the aggregator can absorb;
//! a structured decode failing is a [`ParseError`] that single-community
//! flows degrade around; everything an orchestrator surfaces to its caller
//! is a [`SimError`]. Nothing here is retried automatically.

use zousui_store::StoreError;

use crate::context::Interrupt;

/// Errors produced while obtaining generated text.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// One backend failed (network, auth, quota, malformed envelope).
    #[error("backend {backend} failed: {message}")]
    Backend {
        /// Profile name of the failing backend.
        backend: String,
        /// What went wrong.
        message: String,
    },

    /// A backend answered with no text.
    #[error("backend {backend} returned an empty response")]
    EmptyResponse {
        /// Profile name of the backend.
        backend: String,
    },

    /// Every backend in the fan-out failed or returned nothing.
    #[error("no backend available: all {attempted} backend call(s) failed")]
    NoBackendAvailable {
        /// How many backends were tried.
        attempted: usize,
    },

    /// The synthesis prompt could not be rendered.
    #[error("synthesis prompt failed: {0}")]
    Prompt(String),

    /// The fan-out succeeded but the synthesis call to the primary failed.
    #[error("synthesis call failed: {0}")]
    Synthesis(Box<Self>),

    /// The request was cancelled or ran out of time while waiting.
    #[error(transparent)]
    Interrupted(#[from] Interrupt),
}

/// A structured decode failed on every recovery strategy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not decode {expected} from response: {message}")]
pub struct ParseError {
    /// The shape the caller asked for (`single-sided`, `two-sided`, ...).
    pub expected: &'static str,
    /// The last decoder error.
    pub message: String,
    /// The raw backend text.
    pub raw: String,
}

/// Errors surfaced by orchestrators and the community service.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// A referenced community or agent does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A community with the requested identifier already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The caller passed unusable arguments.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Text generation failed.
    #[error("generation failed: {0}")]
    Generation(GenerationError),

    /// The backend output could not be interpreted and no recovery applies.
    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),

    /// A store write failed. Earlier writes in the same call are not undone.
    #[error("persistence failed: {0}")]
    Persistence(StoreError),

    /// A prompt template could not be loaded or rendered.
    #[error("template error: {0}")]
    Template(String),

    /// An audit record could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration is invalid or missing.
    #[error("config error: {0}")]
    Config(String),

    /// The request was cancelled or ran out of time.
    #[error(transparent)]
    Interrupted(Interrupt),
}

impl From<GenerationError> for SimError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Interrupted(reason) => Self::Interrupted(reason),
            other => Self::Generation(other),
        }
    }
}

impl From<Interrupt> for SimError {
    fn from(reason: Interrupt) -> Self {
        Self::Interrupted(reason)
    }
}

/// Read-path conversion: lookup misses and collisions keep their meaning,
/// anything else is a persistence failure.
impl From<StoreError> for SimError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::NotFound(err.to_string()),
            StoreError::AlreadyExists { .. } => Self::AlreadyExists(err.to_string()),
            other => Self::Persistence(other),
        }
    }
}
