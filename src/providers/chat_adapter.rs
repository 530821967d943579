/*!
 * Shared adapter plumbing for OpenAI-compatible chat providers.
 *
 * One call runs the full per-request cycle: pick a model with quota left,
 * reserve estimated tokens in the ledger, fire the HTTP request, classify
 * the outcome, check the reply keeps the block structure, and settle the
 * reservation. Retryable failures loop with exponential backoff and jitter;
 * a structural failure retries with a stricter system prompt.
 */

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, info, warn};
use rand::Rng;

use crate::block_codec::BlockCodec;
use crate::errors::{ErrorKind, TranslationError};
use crate::providers::chat_api::{ChatClient, ChatRequest};
use crate::providers::{ProviderResponse, TranslationProvider};
use crate::rate_limiter::RateLimiter;

/// Default system prompt, rendered with display language names
const SYSTEM_PROMPT_TEMPLATE: &str = "\
You are a professional subtitle translator translating from {source_language} \
to {target_language}. The input is a sequence of numbered blocks. Each block \
starts with a line ---BLOCK k--- and ends with a line ---END BLOCK k---. \
Translate only the text between the markers and keep line breaks inside a \
block. Reply with every block in the same order, repeating each marker line \
exactly as it appears in the input. Never merge, split, drop or reorder \
blocks. Do not write anything before the first marker or after the last one.";

/// Escalated prompt used after a reply broke the block structure
const STRICT_SYSTEM_PROMPT_TEMPLATE: &str = "\
You translate subtitles from {source_language} to {target_language}. Your \
previous reply broke the required format. Follow these rules exactly: \
1. Repeat every ---BLOCK k--- and ---END BLOCK k--- marker line from the \
input unchanged and in the same order. \
2. Between a pair of markers write only the translated text for that block. \
3. Write no notes, apologies or any other text outside the markers.";

/// Sampling temperature for translation calls
const TRANSLATION_TEMPERATURE: f32 = 0.3;

/// Fallback delay reported when every model window is saturated but the
/// ledger cannot name a reset time
const SATURATED_FALLBACK_SECS: u64 = 60;

/// Fill the language placeholders of a prompt template.
fn render_prompt(template: &str, source_language: &str, target_language: &str) -> String {
    template
        .replace("{source_language}", source_language)
        .replace("{target_language}", target_language)
}

/// Conservative token estimate for prompt text, roughly one token per four
/// characters. The same figure is charged to every token window on reserve.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64) / 4 + 1
}

/// Backoff delay before retry `attempt` (1-based): base doubles per attempt
/// with up to 25% random jitter on top.
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let backoff_ms = base_ms * (1u64 << (attempt - 1));
    let jitter_ms = rand::rng().random_range(0..=backoff_ms / 4);
    Duration::from_millis(backoff_ms + jitter_ms)
}

/// Rate-limit-aware adapter around one OpenAI-compatible endpoint
#[derive(Debug)]
pub struct ChatAdapter {
    /// Lowercase provider name
    name: String,
    /// HTTP client bound to the provider endpoint
    client: ChatClient,
    /// Candidate models in preference order
    models: Vec<String>,
    /// Fallback priority, lower = preferred
    priority: u32,
    /// Whether credentials were present at build time
    available: bool,
    /// Shared quota ledger
    limiter: Arc<RateLimiter>,
    /// Structure checker for replies
    codec: BlockCodec,
    /// Retry budget for retryable failures
    max_retries: u32,
    /// Base backoff in milliseconds
    backoff_base_ms: u64,
    /// Display name of the source language, e.g. "English"
    source_language: String,
    /// Display name of the target language, e.g. "Vietnamese"
    target_language: String,
}

impl ChatAdapter {
    /// Create a new adapter.
    pub fn new(
        name: impl Into<String>,
        client: ChatClient,
        models: Vec<String>,
        priority: u32,
        available: bool,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            name: name.into(),
            client,
            models,
            priority,
            available,
            limiter,
            codec: BlockCodec::new(),
            max_retries: 3,
            backoff_base_ms: 1000,
            source_language: "English".to_string(),
            target_language: "Vietnamese".to_string(),
        }
    }

    /// Set the retry budget
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base backoff in milliseconds
    pub fn with_backoff_base_ms(mut self, backoff_base_ms: u64) -> Self {
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    /// Set the display language names used in prompts
    pub fn with_languages(
        mut self,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
    ) -> Self {
        self.source_language = source_language.into();
        self.target_language = target_language.into();
        self
    }

    /// One full translate cycle against one model, without retries.
    async fn translate_once(
        &self,
        wire: &str,
        strict: bool,
    ) -> Result<ProviderResponse, TranslationError> {
        let Some(model) = self.limiter.pick_available(&self.name, &self.models) else {
            let retry_after_secs = self
                .limiter
                .seconds_until_available(&self.name, &self.models)
                .unwrap_or(SATURATED_FALLBACK_SECS);
            debug!(
                "{}: every model window is saturated, next slot in {}s",
                self.name, retry_after_secs
            );
            return Err(TranslationError::RateLimited {
                provider: self.name.clone(),
                retry_after_secs,
            });
        };

        let template = if strict {
            STRICT_SYSTEM_PROMPT_TEMPLATE
        } else {
            SYSTEM_PROMPT_TEMPLATE
        };
        let system_prompt = render_prompt(template, &self.source_language, &self.target_language);

        let estimate = estimate_tokens(&format!("{}\n{}", system_prompt, wire));
        let reservation = self.limiter.reserve(&self.name, &model, estimate)?;

        let request = ChatRequest::new(&model)
            .add_message("system", &system_prompt)
            .add_message("user", wire)
            .temperature(TRANSLATION_TEMPERATURE);

        let start = Instant::now();
        match self.client.complete(&request).await {
            Ok(completion) => {
                // The call was billed whatever the body looks like
                self.limiter.commit(&reservation, completion.usage);

                if let Some(problem) = self.codec.structure_mismatch(wire, &completion.text) {
                    warn!(
                        "{} ({}) returned a malformed reply: {}",
                        self.name, model, problem
                    );
                    return Err(TranslationError::Validation {
                        provider: self.name.clone(),
                        detail: problem,
                    });
                }

                let elapsed = start.elapsed();
                info!(
                    "{} ({}) translated {} tokens in {:.1}s",
                    self.name,
                    completion.model,
                    completion.usage.total_tokens,
                    elapsed.as_secs_f64()
                );
                Ok(ProviderResponse {
                    text: completion.text,
                    provider: self.name.clone(),
                    model: completion.model,
                    usage: completion.usage,
                    elapsed,
                })
            }
            Err(e) => {
                match e.kind() {
                    ErrorKind::RateLimit => {
                        // The server outranks the ledger; block the model's
                        // request windows until the reported reset and keep
                        // the reservation, the call consumed a slot.
                        if let Some(retry_after) = e.retry_after() {
                            warn!(
                                "{} ({}) rejected with 429, window blocked for {}s",
                                self.name,
                                model,
                                retry_after.as_secs()
                            );
                            self.limiter
                                .apply_server_retry_after(&self.name, &model, retry_after);
                        }
                    }
                    ErrorKind::Authentication | ErrorKind::Connection => {
                        // Nothing was consumed server-side
                        self.limiter.release_on_error(&reservation);
                    }
                    _ => {}
                }
                Err(e)
            }
        }
    }
}

#[async_trait]
impl TranslationProvider for ChatAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn translate_text(&self, wire: &str) -> Result<ProviderResponse, TranslationError> {
        let mut strict = false;
        let mut attempt: u32 = 0;

        loop {
            match self.translate_once(wire, strict).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if !e.is_retryable() || attempt >= self.max_retries {
                        return Err(e);
                    }
                    if e.kind() == ErrorKind::Validation {
                        strict = true;
                    }
                    attempt += 1;
                    let delay = backoff_delay(self.backoff_base_ms, attempt);
                    warn!(
                        "{} attempt {}/{} failed ({}), retrying in {}ms",
                        self.name,
                        attempt,
                        self.max_retries,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn test_connection(&self) -> Result<(), TranslationError> {
        let models = self.client.list_models().await?;
        debug!("{} lists {} models", self.name, models.len());
        Ok(())
    }
}
