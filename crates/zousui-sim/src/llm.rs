//! Generation backend abstraction and implementations.
//!
//! Backends form a closed set dispatched through an enum, which sidesteps
//! the dyn-compatibility limits of async trait methods. The HTTP backends
//! speak the `OpenAI` chat completions, Anthropic Messages, and Gemini
//! `generateContent` APIs via `reqwest`; [`MockBackend`] answers in-process
//! from a script and records every call.
//!
//! Orchestration code never branches on the variant: it sends a prompt and
//! an auxiliary input and gets opaque text back.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::config::{BackendType, LlmBackendConfig};
use crate::error::GenerationError;

/// System instruction sent to every HTTP backend.
pub const SYSTEM_INSTRUCTION: &str = "You simulate how the cultures of small communities evolve. \
Always answer with exactly one JSON object in the format the prompt asks for, with no commentary.";

/// Upper bound on generated tokens per call.
const MAX_TOKENS: u32 = 1024;

// ---------------------------------------------------------------------------
// Unified backend enum
// ---------------------------------------------------------------------------

/// A generation backend that turns a prompt into text.
///
/// Every variant is safe to call concurrently through a shared reference.
#[derive(Debug)]
pub enum LlmBackend {
    /// `OpenAI`-compatible chat completions API.
    OpenAi(OpenAiBackend),
    /// Anthropic Messages API.
    Anthropic(AnthropicBackend),
    /// Google Gemini API.
    Gemini(GeminiBackend),
    /// Deterministic in-process backend.
    Mock(MockBackend),
}

impl LlmBackend {
    /// Send a prompt and return the generated text.
    ///
    /// `auxiliary` is free-form user input riding along with the prompt.
    /// The HTTP backends do not forward it (the aggregator already folds it
    /// into the synthesis prompt); the mock records it.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Backend`] if the call fails or the
    /// response envelope cannot be read.
    pub async fn generate(&self, prompt: &str, auxiliary: &str) -> Result<String, GenerationError> {
        match self {
            Self::OpenAi(backend) => backend.complete(prompt).await,
            Self::Anthropic(backend) => backend.complete(prompt).await,
            Self::Gemini(backend) => backend.complete(prompt).await,
            Self::Mock(backend) => backend.complete(prompt, auxiliary).await,
        }
    }

    /// Profile name for logging.
    pub fn name(&self) -> &str {
        match self {
            Self::OpenAi(backend) => &backend.profile,
            Self::Anthropic(backend) => &backend.profile,
            Self::Gemini(backend) => &backend.profile,
            Self::Mock(backend) => &backend.profile,
        }
    }

    /// Wire protocol family, for logging.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::OpenAi(_) => "openai-compatible",
            Self::Anthropic(_) => "anthropic",
            Self::Gemini(_) => "gemini",
            Self::Mock(_) => "mock",
        }
    }
}

fn backend_error(profile: &str, message: impl Into<String>) -> GenerationError {
    GenerationError::Backend {
        backend: profile.to_owned(),
        message: message.into(),
    }
}

/// Send a JSON body and return the decoded JSON reply, mapping HTTP
/// failures to [`GenerationError::Backend`].
async fn post_json(
    profile: &str,
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
) -> Result<serde_json::Value, GenerationError> {
    let response = request
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| backend_error(profile, format!("request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read error body".to_owned());
        return Err(backend_error(profile, format!("returned {status}: {error_body}")));
    }

    response
        .json()
        .await
        .map_err(|e| backend_error(profile, format!("response parse failed: {e}")))
}

// ---------------------------------------------------------------------------
// OpenAI-compatible backend
// ---------------------------------------------------------------------------

/// Backend for `OpenAI`-compatible chat completions APIs.
///
/// Works with `OpenAI`, `DeepSeek`, and Ollama endpoints.
/// Sends requests to `{api_url}/chat/completions`.
#[derive(Debug)]
pub struct OpenAiBackend {
    client: reqwest::Client,
    profile: String,
    api_url: String,
    api_key: String,
    model: String,
}

impl OpenAiBackend {
    /// Create a new `OpenAI`-compatible backend.
    pub fn new(config: &LlmBackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            profile: config.profile.clone(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.api_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_INSTRUCTION},
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.9,
            "max_tokens": MAX_TOKENS,
            "response_format": {"type": "json_object"}
        });

        let request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key));
        let json = post_json(&self.profile, request, &body).await?;
        extract_openai_content(&json).ok_or_else(|| {
            backend_error(&self.profile, "response missing choices[0].message.content")
        })
    }
}

/// Extract the text content from an `OpenAI` chat completions response.
fn extract_openai_content(json: &serde_json::Value) -> Option<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
}

// ---------------------------------------------------------------------------
// Anthropic Messages API backend
// ---------------------------------------------------------------------------

/// Backend for the Anthropic Messages API.
///
/// Uses the `x-api-key` header, a top-level `system` field, and returns
/// text under `content[0].text`.
#[derive(Debug)]
pub struct AnthropicBackend {
    client: reqwest::Client,
    profile: String,
    api_url: String,
    api_key: String,
    model: String,
}

impl AnthropicBackend {
    /// Create a new Anthropic Messages API backend.
    pub fn new(config: &LlmBackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            profile: config.profile.clone(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/messages", self.api_url);
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "system": SYSTEM_INSTRUCTION,
            "messages": [
                {"role": "user", "content": prompt}
            ]
        });

        let request = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01");
        let json = post_json(&self.profile, request, &body).await?;
        extract_anthropic_content(&json)
            .ok_or_else(|| backend_error(&self.profile, "response missing content[0].text"))
    }
}

/// Extract the text content from an Anthropic Messages API response.
fn extract_anthropic_content(json: &serde_json::Value) -> Option<String> {
    json.get("content")
        .and_then(|c| c.get(0))
        .and_then(|b| b.get("text"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
}

// ---------------------------------------------------------------------------
// Gemini backend
// ---------------------------------------------------------------------------

/// Backend for the Google Gemini `generateContent` API.
///
/// Sends requests to `{api_url}/models/{model}:generateContent` with the
/// system instruction in `systemInstruction`.
#[derive(Debug)]
pub struct GeminiBackend {
    client: reqwest::Client,
    profile: String,
    api_url: String,
    api_key: String,
    model: String,
}

impl GeminiBackend {
    /// Create a new Gemini backend.
    pub fn new(config: &LlmBackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            profile: config.profile.clone(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/models/{}:generateContent", self.api_url, self.model);
        let body = serde_json::json!({
            "systemInstruction": {"parts": [{"text": SYSTEM_INSTRUCTION}]},
            "contents": [
                {"role": "user", "parts": [{"text": prompt}]}
            ],
            "generationConfig": {"maxOutputTokens": MAX_TOKENS}
        });

        let request = self.client.post(&url).header("x-goog-api-key", &self.api_key);
        let json = post_json(&self.profile, request, &body).await?;
        extract_gemini_content(&json).ok_or_else(|| {
            backend_error(&self.profile, "response missing candidates[0].content.parts")
        })
    }
}

/// Concatenate the text parts of the first Gemini candidate.
fn extract_gemini_content(json: &serde_json::Value) -> Option<String> {
    let parts = json
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(serde_json::Value::as_array)?;

    let texts: Vec<&str> = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(serde_json::Value::as_str))
        .collect();
    if texts.is_empty() {
        return None;
    }
    Some(texts.concat())
}

// ---------------------------------------------------------------------------
// Mock backend
// ---------------------------------------------------------------------------

/// Reply returned by the mock when its script is exhausted.
pub const MOCK_DEFAULT_REPLY: &str =
    r#"{"newCulture": "A new festival culture centred on dance", "populationChange": 15}"#;

/// One scripted mock reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Answer with this text.
    Text(String),
    /// Fail with this message.
    Fail(String),
}

/// A call observed by a [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// The prompt received.
    pub prompt: String,
    /// The auxiliary input received.
    pub auxiliary: String,
}

#[derive(Debug)]
struct MockState {
    script: Mutex<VecDeque<MockReply>>,
    fallback: MockReply,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Option<Duration>,
}

/// Deterministic in-process backend.
///
/// Replies are taken from a script in order; once it runs out every call
/// gets the fallback reply. Clones share state, so a test can keep a clone
/// to inspect the calls a generator made.
#[derive(Debug, Clone)]
pub struct MockBackend {
    profile: String,
    state: Arc<MockState>,
}

impl MockBackend {
    /// A mock that always answers [`MOCK_DEFAULT_REPLY`].
    pub fn new(profile: impl Into<String>) -> Self {
        Self::with_fallback(profile, MockReply::Text(MOCK_DEFAULT_REPLY.to_owned()))
    }

    /// A mock that always answers `text`.
    pub fn fixed(profile: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_fallback(profile, MockReply::Text(text.into()))
    }

    /// A mock whose every call fails.
    pub fn failing(profile: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_fallback(profile, MockReply::Fail(message.into()))
    }

    fn with_fallback(profile: impl Into<String>, fallback: MockReply) -> Self {
        Self {
            profile: profile.into(),
            state: Arc::new(MockState {
                script: Mutex::new(VecDeque::new()),
                fallback,
                calls: Mutex::new(Vec::new()),
                delay: None,
            }),
        }
    }

    /// Queue replies to hand out before the fallback.
    #[must_use]
    pub fn scripted(self, replies: impl IntoIterator<Item = MockReply>) -> Self {
        self.state
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(replies);
        self
    }

    /// Sleep this long before answering each call.
    #[must_use]
    pub fn delayed(self, delay: Duration) -> Self {
        let state = MockState {
            script: Mutex::new(std::mem::take(
                &mut *self.state.script.lock().unwrap_or_else(PoisonError::into_inner),
            )),
            fallback: self.state.fallback.clone(),
            calls: Mutex::new(Vec::new()),
            delay: Some(delay),
        };
        Self {
            profile: self.profile,
            state: Arc::new(state),
        }
    }

    /// Calls received so far, in arrival order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.state
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    async fn complete(&self, prompt: &str, auxiliary: &str) -> Result<String, GenerationError> {
        self.state
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                prompt: prompt.to_owned(),
                auxiliary: auxiliary.to_owned(),
            });

        if let Some(delay) = self.state.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self
            .state
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| self.state.fallback.clone());

        match reply {
            MockReply::Text(text) => Ok(text),
            MockReply::Fail(message) => Err(backend_error(&self.profile, message)),
        }
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Create a backend from configuration.
pub fn create_backend(config: &LlmBackendConfig) -> LlmBackend {
    match config.backend_type {
        BackendType::OpenAi => LlmBackend::OpenAi(OpenAiBackend::new(config)),
        BackendType::Anthropic => LlmBackend::Anthropic(AnthropicBackend::new(config)),
        BackendType::Gemini => LlmBackend::Gemini(GeminiBackend::new(config)),
        BackendType::Mock => LlmBackend::Mock(MockBackend::new(config.profile.clone())),
    }
}
