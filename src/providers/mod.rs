/*!
 * Provider implementations for hosted translation APIs.
 *
 * This module contains the adapter trait plus the concrete providers:
 * - Groq: OpenAI-compatible hosted inference
 * - OpenRouter: OpenAI-compatible model aggregator
 * - Mock: scripted in-process provider for tests
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;

use crate::errors::TranslationError;
use crate::rate_limiter::TokenUsage;

/// Common trait for all translation providers
///
/// The manager holds adapters as trait objects and walks them in priority
/// order, so everything here must be object safe.
#[async_trait]
pub trait TranslationProvider: Send + Sync + Debug {
    /// Lowercase provider identifier used in logs and error diagnostics
    fn name(&self) -> &str;

    /// Priority for fallback ordering, lower = preferred
    fn priority(&self) -> u32;

    /// Whether the adapter is currently usable (credentials present)
    fn is_available(&self) -> bool;

    /// Translate one wire-format document
    ///
    /// # Arguments
    /// * `wire` - The delimited block document to translate
    ///
    /// # Returns
    /// * `Result<ProviderResponse, TranslationError>` - The translated wire
    ///   text with usage accounting, or a classified error
    async fn translate_text(&self, wire: &str) -> Result<ProviderResponse, TranslationError>;

    /// Probe connectivity and credentials without billing tokens
    async fn test_connection(&self) -> Result<(), TranslationError>;
}

/// Successful translation result returned by an adapter
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Translated wire-format text
    pub text: String,

    /// Provider that produced the translation
    pub provider: String,

    /// Model that produced the translation
    pub model: String,

    /// Token usage as reported by the server (zeros when not reported)
    pub usage: TokenUsage,

    /// Wall-clock time spent on the successful call
    pub elapsed: Duration,
}

pub mod chat_adapter;
pub mod chat_api;
pub mod groq;
pub mod mock;
pub mod openrouter;

pub use chat_adapter::ChatAdapter;
pub use chat_api::ChatClient;
