//! The aggregating generator: one logical generation over many backends.
//!
//! In [`AggregationMode::Synthesize`] a request runs in two phases:
//!
//! 1. **Fan-out.** Every backend gets the same prompt concurrently. The
//!    futures are joined (not raced), so results come back in dispatch
//!    order no matter which backend finished first. Failures and blank
//!    answers are dropped; if nothing is left the request fails with
//!    [`GenerationError::NoBackendAvailable`].
//! 2. **Synthesis.** The surviving answers are joined with newlines, one
//!    random word from one random answer is picked as inspiration, and a
//!    synthesis prompt goes to the primary (first) backend. Its answer is
//!    the result.
//!
//! [`AggregationMode::RandomPick`] skips all that and asks one uniformly
//! chosen backend.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::join_all;
use minijinja::context;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::config::AggregationMode;
use crate::context::RequestContext;
use crate::error::{GenerationError, SimError};
use crate::llm::LlmBackend;
use crate::prompt::{PromptEngine, PromptKind};

/// Default inspiration token when the chosen answer has no words.
pub const DEFAULT_INSPIRATION: &str = "innovation";

/// Fans a prompt out to every configured backend and condenses the answers.
#[derive(Debug)]
pub struct AggregatingGenerator {
    backends: Vec<LlmBackend>,
    mode: AggregationMode,
    prompts: Arc<PromptEngine>,
    fallback_token: String,
    rng: Mutex<StdRng>,
}

impl AggregatingGenerator {
    /// Build a generator over `backends`; the first one is the primary.
    ///
    /// Randomness is seeded from the operating system.
    pub fn new(
        backends: Vec<LlmBackend>,
        mode: AggregationMode,
        prompts: Arc<PromptEngine>,
    ) -> Result<Self, SimError> {
        if backends.is_empty() {
            return Err(SimError::Config(
                "aggregating generator needs at least one backend".to_owned(),
            ));
        }
        Ok(Self {
            backends,
            mode,
            prompts,
            fallback_token: DEFAULT_INSPIRATION.to_owned(),
            rng: Mutex::new(StdRng::from_os_rng()),
        })
    }

    /// Replace the inspiration token used when an answer has no words.
    #[must_use]
    pub fn with_fallback_token(mut self, token: impl Into<String>) -> Self {
        self.fallback_token = token.into();
        self
    }

    /// Replace the randomness source, e.g. with a seeded one in tests.
    #[must_use]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    /// Configured backends in dispatch order.
    pub fn backends(&self) -> &[LlmBackend] {
        &self.backends
    }

    /// The active aggregation mode.
    pub const fn mode(&self) -> AggregationMode {
        self.mode
    }

    /// Produce one answer for `prompt`.
    ///
    /// `auxiliary` is free-form user input forwarded to every backend and
    /// woven into the synthesis prompt. The generator imposes no timeout;
    /// `ctx` carries the caller's cancellation and deadline.
    ///
    /// # Errors
    ///
    /// - [`GenerationError::NoBackendAvailable`] if every fan-out call failed
    /// - [`GenerationError::Synthesis`] if the synthesis call failed
    /// - [`GenerationError::Interrupted`] if `ctx` fired while waiting
    pub async fn generate(
        &self,
        ctx: &RequestContext,
        prompt: &str,
        auxiliary: &str,
    ) -> Result<String, GenerationError> {
        match self.mode {
            AggregationMode::Synthesize => self.synthesize(ctx, prompt, auxiliary).await,
            AggregationMode::RandomPick => self.random_pick(ctx, prompt, auxiliary).await,
        }
    }

    async fn synthesize(
        &self,
        ctx: &RequestContext,
        prompt: &str,
        auxiliary: &str,
    ) -> Result<String, GenerationError> {
        let calls = self.backends.iter().map(|backend| async move {
            (backend.name(), backend.generate(prompt, auxiliary).await)
        });
        let results = ctx.guard(join_all(calls)).await?;

        let attempted = results.len();
        let mut valid = Vec::with_capacity(attempted);
        for (backend, result) in results {
            match result {
                Ok(text) if !text.trim().is_empty() => {
                    debug!(backend, response = %text, "backend answered");
                    valid.push(text);
                }
                Ok(_) => warn!(backend, "backend returned an empty response"),
                Err(e) => warn!(backend, error = %e, "backend call failed"),
            }
        }
        if valid.is_empty() {
            return Err(GenerationError::NoBackendAvailable { attempted });
        }

        let merged = valid.join("\n");
        let keyword = self.pick_inspiration(&valid);
        let synthesis_prompt = self
            .prompts
            .render(
                PromptKind::Synthesis,
                context! { keyword => &keyword, user_input => auxiliary, merged => &merged },
            )
            .map_err(|e| GenerationError::Prompt(e.to_string()))?;

        let primary = self.primary()?;
        info!(
            backend = primary.name(),
            valid = valid.len(),
            attempted,
            keyword = %keyword,
            "synthesizing aggregated answers"
        );
        let answer = ctx
            .guard(primary.generate(&synthesis_prompt, auxiliary))
            .await?
            .map_err(|e| GenerationError::Synthesis(Box::new(e)))?;
        if answer.trim().is_empty() {
            return Err(GenerationError::Synthesis(Box::new(
                GenerationError::EmptyResponse {
                    backend: primary.name().to_owned(),
                },
            )));
        }
        Ok(answer)
    }

    async fn random_pick(
        &self,
        ctx: &RequestContext,
        prompt: &str,
        auxiliary: &str,
    ) -> Result<String, GenerationError> {
        let index = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            rng.random_range(0..self.backends.len().max(1))
        };
        let backend = self
            .backends
            .get(index)
            .ok_or(GenerationError::NoBackendAvailable { attempted: 0 })?;

        debug!(backend = backend.name(), "randomly picked backend");
        let answer = ctx.guard(backend.generate(prompt, auxiliary)).await??;
        if answer.trim().is_empty() {
            return Err(GenerationError::EmptyResponse {
                backend: backend.name().to_owned(),
            });
        }
        Ok(answer)
    }

    fn primary(&self) -> Result<&LlmBackend, GenerationError> {
        self.backends
            .first()
            .ok_or(GenerationError::NoBackendAvailable { attempted: 0 })
    }

    /// A uniformly random word from a uniformly random answer.
    fn pick_inspiration(&self, valid: &[String]) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        valid
            .choose(&mut *rng)
            .and_then(|answer| {
                let words: Vec<&str> = answer.split_whitespace().collect();
                words.choose(&mut *rng).map(|word| (*word).to_owned())
            })
            .unwrap_or_else(|| self.fallback_token.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::llm::MockBackend;

    fn generator(backends: Vec<LlmBackend>, mode: AggregationMode) -> AggregatingGenerator {
        let prompts = Arc::new(PromptEngine::builtin().unwrap());
        AggregatingGenerator::new(backends, mode, prompts)
            .unwrap()
            .with_rng(StdRng::seed_from_u64(7))
    }

    #[test]
    fn empty_backend_list_is_rejected() {
        let prompts = Arc::new(PromptEngine::builtin().unwrap());
        let result = AggregatingGenerator::new(Vec::new(), AggregationMode::Synthesize, prompts);
        assert!(matches!(result, Err(SimError::Config(_))));
    }

    #[test]
    fn inspiration_is_a_word_of_some_answer() {
        let generator = generator(
            vec![LlmBackend::Mock(MockBackend::new("m"))],
            AggregationMode::Synthesize,
        );
        let answers = vec!["dunes at dawn".to_owned(), "salt and tide".to_owned()];
        for _ in 0..20 {
            let word = generator.pick_inspiration(&answers);
            assert!(answers.iter().any(|a| a.split_whitespace().any(|w| w == word)));
        }
    }

    #[test]
    fn inspiration_falls_back_without_words() {
        let generator = generator(
            vec![LlmBackend::Mock(MockBackend::new("m"))],
            AggregationMode::Synthesize,
        );
        let generator = generator.with_fallback_token("spark");
        assert_eq!(generator.pick_inspiration(&["   ".to_owned()]), "spark");
        assert_eq!(generator.pick_inspiration(&[]), "spark");
    }

    #[test]
    fn seeded_rng_pins_inspiration() {
        let answers = vec!["one two three four five".to_owned()];
        let first = generator(vec![LlmBackend::Mock(MockBackend::new("m"))], AggregationMode::Synthesize)
            .pick_inspiration(&answers);
        let second = generator(vec![LlmBackend::Mock(MockBackend::new("m"))], AggregationMode::Synthesize)
            .pick_inspiration(&answers);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn random_pick_calls_exactly_one_backend() {
        let a = MockBackend::fixed("a", "from a");
        let b = MockBackend::fixed("b", "from b");
        let generator = generator(
            vec![LlmBackend::Mock(a.clone()), LlmBackend::Mock(b.clone())],
            AggregationMode::RandomPick,
        );

        let answer = generator
            .generate(&RequestContext::background(), "prompt", "")
            .await
            .unwrap();
        assert!(answer == "from a" || answer == "from b");
        assert_eq!(a.call_count().saturating_add(b.call_count()), 1);
    }

    #[tokio::test]
    async fn random_pick_is_not_biased_to_the_first_backend() {
        let mocks: Vec<MockBackend> = ["a", "b", "c"].into_iter().map(MockBackend::new).collect();
        let generator = generator(
            mocks.iter().cloned().map(LlmBackend::Mock).collect(),
            AggregationMode::RandomPick,
        );

        let ctx = RequestContext::background();
        for _ in 0..60 {
            assert!(generator.generate(&ctx, "prompt", "").await.is_ok());
        }
        for mock in &mocks {
            assert!(mock.call_count() > 0);
        }
    }
}
