/*!
 * Priority-ordered dispatch across translation providers.
 *
 * The manager owns the adapters and the shared quota ledger. Each translate
 * call walks the enabled providers from the most preferred down, returns the
 * first success, and otherwise aggregates every provider's terminal failure
 * into one diagnostic. A provider whose credentials are rejected is disabled
 * for the remainder of the process.
 */

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::app_config::{Config, ProviderId};
use crate::errors::{ErrorKind, ProviderAttempt, TranslationError};
use crate::language_utils;
use crate::providers::{groq, openrouter, ProviderResponse, TranslationProvider};
use crate::rate_limiter::{RateLimiter, RateLimiterSnapshot};

/// Fallback coordinator over every configured provider
pub struct ProviderManager {
    /// Adapters sorted by priority, build order breaking ties
    providers: Vec<Box<dyn TranslationProvider>>,
    /// Names disabled after a credential rejection
    disabled: Mutex<HashSet<String>>,
    /// Shared quota ledger
    limiter: Arc<RateLimiter>,
}

impl ProviderManager {
    /// Build adapters for every enabled provider in the configuration.
    pub fn from_config(config: &Config) -> Result<Self, TranslationError> {
        config.validate()?;

        let source_language = language_utils::get_language_name(&config.source_language)
            .map_err(|e| TranslationError::Configuration(e.to_string()))?;
        let target_language = language_utils::get_language_name(&config.target_language)
            .map_err(|e| TranslationError::Configuration(e.to_string()))?;

        let limiter = Arc::new(RateLimiter::new());
        let timeout = Duration::from_secs(config.request_timeout_secs);

        let mut providers: Vec<Box<dyn TranslationProvider>> = Vec::new();
        for settings in config.enabled_providers() {
            let adapter = match settings.id {
                ProviderId::Groq => groq::build(
                    settings,
                    timeout,
                    config.max_retries,
                    &source_language,
                    &target_language,
                    Arc::clone(&limiter),
                ),
                ProviderId::OpenRouter => openrouter::build(
                    settings,
                    timeout,
                    config.max_retries,
                    &source_language,
                    &target_language,
                    Arc::clone(&limiter),
                ),
            };
            providers.push(Box::new(adapter));
        }
        // Stable sort keeps configuration order within equal priorities
        providers.sort_by_key(|p| p.priority());

        info!(
            "Provider order: {}",
            providers
                .iter()
                .map(|p| format!("{} (priority {})", p.name(), p.priority()))
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            providers,
            disabled: Mutex::new(HashSet::new()),
            limiter,
        })
    }

    /// Build a manager over pre-built providers. Used by tests with mocks.
    pub fn from_providers(mut providers: Vec<Box<dyn TranslationProvider>>) -> Self {
        providers.sort_by_key(|p| p.priority());
        Self {
            providers,
            disabled: Mutex::new(HashSet::new()),
            limiter: Arc::new(RateLimiter::new()),
        }
    }

    /// Translate one wire document through the first provider that can.
    pub async fn translate(&self, wire: &str) -> Result<ProviderResponse, TranslationError> {
        let candidates: Vec<_> = {
            let disabled = self.disabled.lock();
            self.providers
                .iter()
                .filter(|p| p.is_available() && !disabled.contains(p.name()))
                .collect()
        };

        if candidates.is_empty() {
            return Err(TranslationError::NoAvailableProviders);
        }

        let mut attempts: Vec<ProviderAttempt> = Vec::new();
        let mut min_retry_after: Option<Duration> = None;

        for provider in candidates {
            debug!("Dispatching to {}", provider.name());
            match provider.translate_text(wire).await {
                Ok(response) => {
                    if !attempts.is_empty() {
                        info!(
                            "{} succeeded after {} other provider(s) failed",
                            provider.name(),
                            attempts.len()
                        );
                    }
                    return Ok(response);
                }
                Err(e) => {
                    warn!("Provider {} failed: {}", provider.name(), e);
                    if e.kind() == ErrorKind::Authentication {
                        warn!(
                            "Disabling {} for the rest of the run, credentials were rejected",
                            provider.name()
                        );
                        self.disabled.lock().insert(provider.name().to_string());
                    }
                    if let Some(retry_after) = e.retry_after() {
                        min_retry_after = Some(match min_retry_after {
                            Some(current) => current.min(retry_after),
                            None => retry_after,
                        });
                    }
                    attempts.push(ProviderAttempt::from_error(provider.name(), &e));
                }
            }
        }

        if let Some(retry_after) = min_retry_after {
            info!(
                "Every provider failed, the earliest quota window frees in {}s",
                retry_after.as_secs()
            );
        }
        Err(TranslationError::AllProvidersFailed { attempts })
    }

    /// Probe every provider concurrently, preserving provider order.
    pub async fn test_connections(&self) -> Vec<(String, Result<(), TranslationError>)> {
        let probes = self.providers.iter().map(|p| async move {
            let outcome = p.test_connection().await;
            (p.name().to_string(), outcome)
        });
        join_all(probes).await
    }

    /// Current state of the quota ledger.
    pub fn snapshot(&self) -> RateLimiterSnapshot {
        self.limiter.snapshot()
    }

    /// Number of providers the manager dispatches over.
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }
}

impl std::fmt::Debug for ProviderManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderManager")
            .field(
                "providers",
                &self.providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("disabled", &*self.disabled.lock())
            .finish_non_exhaustive()
    }
}
