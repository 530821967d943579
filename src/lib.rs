/*!
 * # Sublate - SRT subtitle translation over hosted LLM APIs
 *
 * A Rust library for translating SubRip subtitle files while leaving the
 * numbering and timing untouched.
 *
 * ## Features
 *
 * - Parse and re-emit `.srt` files in canonical form
 * - Translate via OpenAI-compatible chat completion APIs:
 *   - Groq
 *   - OpenRouter
 * - Priority-ordered fallback across providers
 * - Client-side rate-limit accounting per provider and model
 * - Batch directory processing with skip-if-translated semantics
 * - ISO 639-1 and ISO 639-2 language code support
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Environment configuration and provider settings
 * - `subtitle_processor`: SRT parsing and formatting
 * - `block_codec`: The `---BLOCK k---` wire protocol
 * - `rate_limiter`: Sliding-window request and token accounting
 * - `providers`: Chat completion clients and the provider trait:
 *   - `providers::groq`: Groq factory and quota tables
 *   - `providers::openrouter`: OpenRouter factory and quota tables
 *   - `providers::mock`: Scriptable provider for tests
 * - `provider_manager`: Fallback dispatch over configured providers
 * - `pipeline`: File and directory translation driver
 * - `file_utils`: File system operations
 * - `language_utils`: ISO language code utilities
 * - `errors`: Error taxonomy shared across the crate
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod block_codec;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod pipeline;
pub mod provider_manager;
pub mod providers;
pub mod rate_limiter;
pub mod subtitle_processor;

// Re-export main types for easier usage
pub use app_config::{Config, ProviderId, ProviderSettings};
pub use block_codec::BlockCodec;
pub use errors::{ErrorKind, TranslationError};
pub use language_utils::{get_language_name, normalize_to_part2t, validate_language_code};
pub use pipeline::{FileOutcome, RunSummary, SubtitlePipeline};
pub use provider_manager::ProviderManager;
pub use rate_limiter::{RateLimiter, TokenUsage, WindowKind, WindowSpec};
pub use subtitle_processor::{SubtitleEntry, SubtitleTrack};
