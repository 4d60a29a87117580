//! Configuration types for the simulation core.
//!
//! All configuration is loaded from environment variables. The core needs
//! to know which generation backends to fan out to (in order; the first is
//! the primary that performs synthesis), how to combine them, and a few
//! text conventions used when applying results.

use std::time::Duration;

use crate::error::SimError;

/// Profile name that selects the built-in deterministic backend.
pub const MOCK_PROFILE: &str = "mock";

/// Complete simulation configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Backends in dispatch order. Never empty.
    pub backends: Vec<LlmBackendConfig>,
    /// How multiple backends are combined.
    pub aggregation: AggregationMode,
    /// Directory with prompt template overrides.
    pub templates_dir: Option<String>,
    /// Joins the two source cultures when a merge result is unusable.
    pub merge_separator: String,
    /// Separates the old culture from appended text.
    pub append_marker: String,
    /// Inspiration token used when a response has no words.
    pub inspiration_fallback: String,
    /// Whether to insert demo communities at startup.
    pub seed_demo: bool,
    /// Deadline the runner attaches to each request context.
    pub request_timeout: Option<Duration>,
}

/// Configuration for a single generation backend.
#[derive(Debug, Clone)]
pub struct LlmBackendConfig {
    /// Profile name (the env var prefix, lowercased). Used in logs.
    pub profile: String,
    /// The backend type.
    pub backend_type: BackendType,
    /// Base API URL (e.g. `https://api.openai.com/v1`).
    pub api_url: String,
    /// API key for authentication.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
}

/// Supported backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// `OpenAI`-compatible API (works with `OpenAI`, `DeepSeek`, Ollama).
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
    /// Google Gemini `generateContent` API.
    Gemini,
    /// Deterministic in-process backend.
    Mock,
}

impl BackendType {
    /// Default base URL when `<PROFILE>_API_URL` is unset.
    pub const fn default_api_url(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Self::Mock => "",
        }
    }

    /// Default model when `<PROFILE>_MODEL` is unset.
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Anthropic => "claude-3-5-haiku-latest",
            Self::Gemini => "gemini-2.0-flash-exp",
            Self::Mock => "mock",
        }
    }

    fn parse(raw: &str) -> Result<Self, SimError> {
        match raw.trim().to_lowercase().as_str() {
            "openai" | "deepseek" | "ollama" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "gemini" | "google" => Ok(Self::Gemini),
            "mock" => Ok(Self::Mock),
            other => Err(SimError::Config(format!("unknown backend type: {other}"))),
        }
    }
}

/// How the aggregating generator combines its backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AggregationMode {
    /// Fan out to every backend, merge, then synthesize on the primary.
    #[default]
    Synthesize,
    /// Ask one uniformly chosen backend and return its answer.
    RandomPick,
}

impl AggregationMode {
    fn parse(raw: &str) -> Result<Self, SimError> {
        match raw.trim().to_lowercase().as_str() {
            "synthesize" | "aggregate" => Ok(Self::Synthesize),
            "random" | "random_pick" | "random-pick" => Ok(Self::RandomPick),
            other => Err(SimError::Config(format!("unknown aggregation mode: {other}"))),
        }
    }
}

impl LlmBackendConfig {
    /// The configuration of the built-in mock backend.
    pub fn mock() -> Self {
        Self {
            profile: MOCK_PROFILE.to_owned(),
            backend_type: BackendType::Mock,
            api_url: String::new(),
            api_key: String::new(),
            model: BackendType::Mock.default_model().to_owned(),
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            backends: vec![LlmBackendConfig::mock()],
            aggregation: AggregationMode::default(),
            templates_dir: None,
            merge_separator: " + ".to_owned(),
            append_marker: " | ".to_owned(),
            inspiration_fallback: "innovation".to_owned(),
            seed_demo: true,
            request_timeout: None,
        }
    }
}

impl SimConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `ZOUSUI_BACKENDS` -- comma-separated profile list (default `mock`);
    ///   the first profile is the primary backend
    /// - `<PROFILE>_BACKEND` -- `openai`, `deepseek`, `ollama`, `anthropic`,
    ///   `claude`, `gemini`, or `mock` (defaults to the profile name)
    /// - `<PROFILE>_API_URL` -- base URL (per-type default)
    /// - `<PROFILE>_API_KEY` -- API key (required for HTTP backends)
    /// - `<PROFILE>_MODEL` -- model name (per-type default)
    /// - `ZOUSUI_AGGREGATION` -- `synthesize` (default) or `random`
    /// - `ZOUSUI_TEMPLATES_DIR` -- prompt template override directory
    /// - `ZOUSUI_MERGE_SEPARATOR` -- merge fallback separator (default ` + `)
    /// - `ZOUSUI_APPEND_MARKER` -- appended-text marker (default ` | `)
    /// - `ZOUSUI_INSPIRATION_FALLBACK` -- default inspiration token
    /// - `ZOUSUI_SEED_DEMO` -- seed demo data (default `true`)
    /// - `ZOUSUI_REQUEST_TIMEOUT_MS` -- per-request deadline (unset: none)
    pub fn from_env() -> Result<Self, SimError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SimError> {
        let defaults = Self::default();

        let profiles = lookup("ZOUSUI_BACKENDS").unwrap_or_else(|| MOCK_PROFILE.to_owned());
        let backends = profiles
            .split(',')
            .map(str::trim)
            .filter(|profile| !profile.is_empty())
            .map(|profile| load_backend_config(&lookup, profile))
            .collect::<Result<Vec<_>, _>>()?;
        if backends.is_empty() {
            return Err(SimError::Config(
                "ZOUSUI_BACKENDS must name at least one backend".to_owned(),
            ));
        }

        let aggregation = lookup("ZOUSUI_AGGREGATION")
            .map(|raw| AggregationMode::parse(&raw))
            .transpose()?
            .unwrap_or_default();

        let seed_demo = lookup("ZOUSUI_SEED_DEMO")
            .map(|raw| {
                raw.trim()
                    .parse::<bool>()
                    .map_err(|e| SimError::Config(format!("invalid ZOUSUI_SEED_DEMO: {e}")))
            })
            .transpose()?
            .unwrap_or(defaults.seed_demo);

        let request_timeout = lookup("ZOUSUI_REQUEST_TIMEOUT_MS")
            .map(|raw| {
                raw.trim().parse::<u64>().map(Duration::from_millis).map_err(|e| {
                    SimError::Config(format!("invalid ZOUSUI_REQUEST_TIMEOUT_MS: {e}"))
                })
            })
            .transpose()?;

        Ok(Self {
            backends,
            aggregation,
            templates_dir: lookup("ZOUSUI_TEMPLATES_DIR").filter(|dir| !dir.trim().is_empty()),
            merge_separator: lookup("ZOUSUI_MERGE_SEPARATOR").unwrap_or(defaults.merge_separator),
            append_marker: lookup("ZOUSUI_APPEND_MARKER").unwrap_or(defaults.append_marker),
            inspiration_fallback: lookup("ZOUSUI_INSPIRATION_FALLBACK")
                .filter(|token| !token.trim().is_empty())
                .unwrap_or(defaults.inspiration_fallback),
            seed_demo,
            request_timeout,
        })
    }
}

/// Load one backend profile from `<PROFILE>_*` variables.
fn load_backend_config(
    lookup: &impl Fn(&str) -> Option<String>,
    profile: &str,
) -> Result<LlmBackendConfig, SimError> {
    if profile.eq_ignore_ascii_case(MOCK_PROFILE) {
        return Ok(LlmBackendConfig::mock());
    }

    let prefix = profile.to_uppercase();
    let backend_type = BackendType::parse(
        &lookup(&format!("{prefix}_BACKEND")).unwrap_or_else(|| profile.to_owned()),
    )?;
    if backend_type == BackendType::Mock {
        return Ok(LlmBackendConfig {
            profile: profile.to_lowercase(),
            ..LlmBackendConfig::mock()
        });
    }

    let api_key = lookup(&format!("{prefix}_API_KEY"))
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| SimError::Config(format!("missing required env var {prefix}_API_KEY")))?;

    Ok(LlmBackendConfig {
        profile: profile.to_lowercase(),
        backend_type,
        api_url: lookup(&format!("{prefix}_API_URL"))
            .unwrap_or_else(|| backend_type.default_api_url().to_owned()),
        api_key,
        model: lookup(&format!("{prefix}_MODEL"))
            .unwrap_or_else(|| backend_type.default_model().to_owned()),
    })
}
