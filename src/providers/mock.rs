/*!
 * Mock provider implementations for testing.
 *
 * This module provides scripted providers that simulate the outcomes an
 * adapter can produce:
 * - `MockProvider::working()` - Succeeds with a structurally valid reply
 * - `MockProvider::auth_failing()` - Fails with an authentication error
 * - `MockProvider::rate_limited(n)` - Fails with a rate-limit error
 * - `MockProvider::rejecting()` - Fails with a validation error
 * - `MockProvider::malformed()` - Succeeds but breaks the block structure
 */

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::block_codec::{render_wire, Block, BlockCodec};
use crate::errors::TranslationError;
use crate::providers::{ProviderResponse, TranslationProvider};
use crate::rate_limiter::TokenUsage;

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with every block body translated
    Working,
    /// Always fails with an authentication error
    AuthFailing,
    /// Always fails with a rate-limit error carrying this retry delay
    RateLimited { retry_after_secs: u64 },
    /// Always fails with a connection error
    ConnectionFailing,
    /// Always fails with a validation error, as an adapter does after its
    /// structural retries run out
    Rejecting,
    /// Succeeds but drops the final END marker from the reply
    Malformed,
    /// Connection errors for the first `fail_first` calls, then works
    FlakyThenWorking { fail_first: usize },
}

/// Scripted provider for manager and pipeline tests
#[derive(Debug)]
pub struct MockProvider {
    /// Provider name reported in errors and diagnostics
    name: String,
    /// Fallback priority, lower = preferred
    priority: u32,
    /// What `is_available` reports
    available: bool,
    /// Behavior mode
    behavior: MockBehavior,
    /// Shared call counter, clones observe the same count
    call_count: Arc<AtomicUsize>,
    /// Custom reply generator applied per block body (optional)
    custom_body: Option<fn(&str) -> String>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            name: "mock".to_string(),
            priority: 1,
            available: true,
            behavior,
            call_count: Arc::new(AtomicUsize::new(0)),
            custom_body: None,
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock provider whose credentials are rejected
    pub fn auth_failing() -> Self {
        Self::new(MockBehavior::AuthFailing)
    }

    /// Create a mock provider that is always over quota
    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self::new(MockBehavior::RateLimited { retry_after_secs })
    }

    /// Create a mock provider that cannot be reached
    pub fn connection_failing() -> Self {
        Self::new(MockBehavior::ConnectionFailing)
    }

    /// Create a mock provider that keeps producing malformed replies
    pub fn rejecting() -> Self {
        Self::new(MockBehavior::Rejecting)
    }

    /// Create a mock provider that succeeds with a broken reply
    pub fn malformed() -> Self {
        Self::new(MockBehavior::Malformed)
    }

    /// Create a mock provider that recovers after `fail_first` calls
    pub fn flaky_then_working(fail_first: usize) -> Self {
        Self::new(MockBehavior::FlakyThenWorking { fail_first })
    }

    /// Set the provider name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the fallback priority
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Set what `is_available` reports
    pub fn with_availability(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    /// Set a custom per-block translation function
    pub fn with_custom_body(mut self, generator: fn(&str) -> String) -> Self {
        self.custom_body = Some(generator);
        self
    }

    /// Number of translate calls observed so far, shared across clones
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Translate one block body, segment by segment so bundled blocks keep
    /// their blank-line structure.
    fn translate_body(&self, body: &str) -> String {
        body.split("\n\n")
            .map(|segment| match self.custom_body {
                Some(generator) => generator(segment),
                None => format!("[VI] {}", segment),
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Structurally valid reply with every block body translated.
    fn working_response(&self, wire: &str) -> Result<ProviderResponse, TranslationError> {
        let blocks =
            BlockCodec::parse_wire(wire).map_err(|e| TranslationError::Validation {
                provider: self.name.clone(),
                detail: format!("mock received unparseable input: {}", e),
            })?;

        let translated: Vec<Block> = blocks
            .iter()
            .map(|b| Block {
                tag: b.tag,
                text: self.translate_body(&b.text),
            })
            .collect();

        let prompt_tokens = (wire.chars().count() as u64) / 4 + 1;
        let completion_tokens = prompt_tokens;
        Ok(ProviderResponse {
            text: render_wire(&translated),
            provider: self.name.clone(),
            model: "mock-model".to_string(),
            usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            elapsed: Duration::from_millis(5),
        })
    }
}

impl Clone for MockProvider {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            priority: self.priority,
            available: self.available,
            behavior: self.behavior,
            call_count: Arc::clone(&self.call_count),
            custom_body: self.custom_body,
        }
    }
}

#[async_trait]
impl TranslationProvider for MockProvider {
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
        let count = self.call_count.fetch_add(1, Ordering::SeqCst);

        match self.behavior {
            MockBehavior::Working => self.working_response(wire),

            MockBehavior::AuthFailing => Err(TranslationError::Authentication {
                provider: self.name.clone(),
                detail: "HTTP 401: invalid api key".to_string(),
            }),

            MockBehavior::RateLimited { retry_after_secs } => {
                Err(TranslationError::RateLimited {
                    provider: self.name.clone(),
                    retry_after_secs,
                })
            }

            MockBehavior::ConnectionFailing => Err(TranslationError::Connection {
                provider: self.name.clone(),
                detail: "connection refused".to_string(),
            }),

            MockBehavior::Rejecting => Err(TranslationError::Validation {
                provider: self.name.clone(),
                detail: "reply kept breaking the block structure".to_string(),
            }),

            MockBehavior::Malformed => {
                let mut response = self.working_response(wire)?;
                // Drop the last line, taking the final END marker with it
                response.text = response
                    .text
                    .lines()
                    .take(response.text.lines().count().saturating_sub(1))
                    .collect::<Vec<_>>()
                    .join("\n");
                Ok(response)
            }

            MockBehavior::FlakyThenWorking { fail_first } => {
                if count < fail_first {
                    Err(TranslationError::Connection {
                        provider: self.name.clone(),
                        detail: format!("simulated outage (call #{})", count + 1),
                    })
                } else {
                    self.working_response(wire)
                }
            }
        }
    }

    async fn test_connection(&self) -> Result<(), TranslationError> {
        match self.behavior {
            MockBehavior::AuthFailing => Err(TranslationError::Authentication {
                provider: self.name.clone(),
                detail: "HTTP 401: invalid api key".to_string(),
            }),
            MockBehavior::ConnectionFailing => Err(TranslationError::Connection {
                provider: self.name.clone(),
                detail: "connection refused".to_string(),
            }),
            _ => Ok(()),
        }
    }
}
