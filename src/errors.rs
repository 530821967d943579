/*!
 * Error types for the sublate application.
 *
 * Every failure that can leave the translation pipeline is one of the
 * variants below, using the thiserror crate for ergonomic error definitions.
 * `ErrorKind` is the coarse tag used in diagnostics, fallback decisions and
 * tests; the variants carry the per-provider detail.
 */

use std::time::Duration;

use thiserror::Error;

/// Coarse classification of a `TranslationError`.
///
/// The provider manager and the retry loop branch on this tag rather than on
/// the full variant, and aggregated diagnostics print it per provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Credential rejected (HTTP 401/403)
    Authentication,
    /// Network failure, timeout or server-side 5xx
    Connection,
    /// A quota window is exhausted
    RateLimit,
    /// Response text failed block-structure validation
    Validation,
    /// Bad or missing configuration
    Configuration,
    /// No provider is enabled and under quota
    NoAvailableProviders,
    /// Translation failed for any other reason (malformed body, all
    /// providers exhausted, unusable input file)
    Translation,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorKind::Authentication => "authentication",
            ErrorKind::Connection => "connection",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Validation => "validation",
            ErrorKind::Configuration => "configuration",
            ErrorKind::NoAvailableProviders => "no_available_providers",
            ErrorKind::Translation => "translation",
        };
        write!(f, "{}", label)
    }
}

/// One provider's terminal failure inside an aggregated diagnostic.
#[derive(Debug, Clone)]
pub struct ProviderAttempt {
    /// Provider name as configured
    pub provider: String,
    /// Terminal error kind for that provider
    pub kind: ErrorKind,
    /// Human-readable detail
    pub detail: String,
}

impl ProviderAttempt {
    /// Record a terminal error against a provider name.
    pub fn from_error(provider: &str, error: &TranslationError) -> Self {
        Self {
            provider: provider.to_string(),
            kind: error.kind(),
            detail: error.to_string(),
        }
    }
}

impl std::fmt::Display for ProviderAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.provider, self.kind, self.detail)
    }
}

fn format_attempts(attempts: &[ProviderAttempt]) -> String {
    attempts
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised by the translation pipeline and everything below it.
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Credential rejected by the provider; the manager disables the
    /// provider for the remainder of the process
    #[error("authentication failed for {provider}: {detail}")]
    Authentication {
        /// Provider name
        provider: String,
        /// Detail from the HTTP response
        detail: String,
    },

    /// Network error, timeout or 5xx after the adapter's own retries
    #[error("connection error for {provider}: {detail}")]
    Connection {
        /// Provider name
        provider: String,
        /// Detail from reqwest or the HTTP response
        detail: String,
    },

    /// A quota window refused the call; not retried locally, the manager
    /// moves on to the next provider
    #[error("rate limit reached for {provider}, retry in {retry_after_secs}s")]
    RateLimited {
        /// Provider name
        provider: String,
        /// Seconds until the earliest offending window resets
        retry_after_secs: u64,
    },

    /// Response parsed as text but violated the block structure
    #[error("response failed block validation for {provider}: {detail}")]
    Validation {
        /// Provider name
        provider: String,
        /// What was wrong with the structure
        detail: String,
    },

    /// Bad or missing configuration; aborts the run
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The manager found no enabled, under-quota provider at dispatch time
    #[error("no providers are currently available")]
    NoAvailableProviders,

    /// Provider answered 2xx but the body was unusable
    #[error("unusable response from {provider}: {detail}")]
    InvalidResponse {
        /// Provider name
        provider: String,
        /// Parse failure detail
        detail: String,
    },

    /// Every candidate provider failed; carries the ordered per-provider
    /// terminal diagnostics
    #[error("translation failed, all providers exhausted: {}", format_attempts(.attempts))]
    AllProvidersFailed {
        /// One record per attempted provider, in dispatch order
        attempts: Vec<ProviderAttempt>,
    },

    /// Reading or writing a subtitle file failed
    #[error("file error: {0}")]
    File(String),
}

impl TranslationError {
    /// The coarse kind used by retry decisions and diagnostics.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TranslationError::Authentication { .. } => ErrorKind::Authentication,
            TranslationError::Connection { .. } => ErrorKind::Connection,
            TranslationError::RateLimited { .. } => ErrorKind::RateLimit,
            TranslationError::Validation { .. } => ErrorKind::Validation,
            TranslationError::Configuration(_) => ErrorKind::Configuration,
            TranslationError::NoAvailableProviders => ErrorKind::NoAvailableProviders,
            TranslationError::InvalidResponse { .. }
            | TranslationError::AllProvidersFailed { .. }
            | TranslationError::File(_) => ErrorKind::Translation,
        }
    }

    /// True for kinds an adapter may retry locally with backoff.
    /// Authentication and configuration are final; rate limits are
    /// surfaced to the manager instead of being waited out here.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Connection | ErrorKind::Validation
        )
    }

    /// The provider this error is attributed to, when there is one.
    pub fn provider(&self) -> Option<&str> {
        match self {
            TranslationError::Authentication { provider, .. }
            | TranslationError::Connection { provider, .. }
            | TranslationError::RateLimited { provider, .. }
            | TranslationError::Validation { provider, .. }
            | TranslationError::InvalidResponse { provider, .. } => Some(provider),
            _ => None,
        }
    }

    /// Suggested wait before the rate-limited provider is worth retrying.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            TranslationError::RateLimited {
                retry_after_secs, ..
            } => Some(Duration::from_secs(*retry_after_secs)),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
