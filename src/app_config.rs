use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::TranslationError;
use crate::language_utils;

/// Application configuration module
/// This module reads the environment-variable configuration surface,
/// applies provider defaults and validates the result. Construction goes
/// through a lookup function so tests can inject a map instead of mutating
/// the process environment.
/// Known translation providers
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    // @provider: Groq (OpenAI-compatible, very fast inference)
    Groq,
    // @provider: OpenRouter (OpenAI-compatible aggregator)
    OpenRouter,
}

impl ProviderId {
    /// Every known provider, in default priority order.
    pub const ALL: [ProviderId; 2] = [ProviderId::Groq, ProviderId::OpenRouter];

    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Groq => "Groq",
            Self::OpenRouter => "OpenRouter",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Groq => "groq",
            Self::OpenRouter => "openrouter",
        }
    }

    // @returns: Environment variable prefix (GROQ_API_KEY etc)
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Self::Groq => "GROQ",
            Self::OpenRouter => "OPENROUTER",
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProviderId {
    type Err = TranslationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "openrouter" => Ok(Self::OpenRouter),
            _ => Err(TranslationError::Configuration(format!(
                "Unknown provider: {}",
                s
            ))),
        }
    }
}

/// Per-provider settings resolved from the environment plus defaults.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProviderSettings {
    // @field: Which provider this is
    pub id: ProviderId,

    // @field: API key, empty when not configured
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Base URL of the OpenAI-compatible API
    pub endpoint: String,

    // @field: Candidate models, tried in order
    pub models: Vec<String>,

    // @field: Priority, lower = preferred
    pub priority: u32,

    // @field: Whether the manager builds an adapter for this provider
    pub enabled: bool,
}

/// Resolved application configuration.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Source language code (ISO)
    pub source_language: String,

    /// Target language code (ISO)
    pub target_language: String,

    /// Suffix appended to output file stems
    pub output_suffix: String,

    /// Per-adapter retry budget for retryable failures
    pub max_retries: u32,

    /// Per-HTTP-call deadline in seconds
    pub request_timeout_secs: u64,

    /// Character budget for bundling entries into one block, 0 = one
    /// entry per block
    pub block_char_budget: usize,

    /// All known providers with their resolved settings
    pub providers: Vec<ProviderSettings>,
}

impl Config {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self, TranslationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, TranslationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source_language = lookup("SOURCE_LANG").unwrap_or_else(default_source_lang);
        let target_language = lookup("TARGET_LANG").unwrap_or_else(default_target_lang);
        let output_suffix = lookup("OUTPUT_SUFFIX").unwrap_or_else(default_output_suffix);
        let max_retries = parse_var(&lookup, "MAX_RETRIES", default_max_retries())?;
        let request_timeout_secs = parse_var(
            &lookup,
            "REQUEST_TIMEOUT_SECONDS",
            default_request_timeout_secs(),
        )?;
        let block_char_budget =
            parse_var(&lookup, "BLOCK_CHAR_BUDGET", default_block_char_budget())?;

        let mut providers = Vec::with_capacity(ProviderId::ALL.len());
        for id in ProviderId::ALL {
            providers.push(ProviderSettings::from_lookup(id, &lookup)?);
        }

        Ok(Config {
            source_language,
            target_language,
            output_suffix,
            max_retries,
            request_timeout_secs,
            block_char_budget,
            providers,
        })
    }

    /// Providers the manager should build adapters for.
    pub fn enabled_providers(&self) -> Vec<&ProviderSettings> {
        self.providers.iter().filter(|p| p.enabled).collect()
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<(), TranslationError> {
        language_utils::validate_language_code(&self.source_language)
            .map_err(|e| TranslationError::Configuration(format!("SOURCE_LANG: {}", e)))?;
        language_utils::validate_language_code(&self.target_language)
            .map_err(|e| TranslationError::Configuration(format!("TARGET_LANG: {}", e)))?;

        if self.output_suffix.is_empty() {
            return Err(TranslationError::Configuration(
                "OUTPUT_SUFFIX must not be empty".to_string(),
            ));
        }
        if self.max_retries > 10 {
            return Err(TranslationError::Configuration(format!(
                "MAX_RETRIES must be at most 10, got {}",
                self.max_retries
            )));
        }
        if !(1..=600).contains(&self.request_timeout_secs) {
            return Err(TranslationError::Configuration(format!(
                "REQUEST_TIMEOUT_SECONDS must be between 1 and 600, got {}",
                self.request_timeout_secs
            )));
        }

        let enabled = self.enabled_providers();
        if enabled.is_empty() {
            return Err(TranslationError::Configuration(
                "No translation provider is enabled; set GROQ_API_KEY or OPENROUTER_API_KEY"
                    .to_string(),
            ));
        }
        for provider in enabled {
            if provider.api_key.is_empty() {
                return Err(TranslationError::Configuration(format!(
                    "{} is enabled but {}_API_KEY is not set",
                    provider.id.display_name(),
                    provider.id.env_prefix()
                )));
            }
            if provider.models.is_empty() {
                return Err(TranslationError::Configuration(format!(
                    "{}_MODEL is set but contains no model names",
                    provider.id.env_prefix()
                )));
            }
            Url::parse(&provider.endpoint).map_err(|e| {
                TranslationError::Configuration(format!(
                    "{}_ENDPOINT is not a valid URL ({}): {}",
                    provider.id.env_prefix(),
                    provider.endpoint,
                    e
                ))
            })?;
        }

        Ok(())
    }

    /// JSON dump of the effective configuration with API keys masked,
    /// for `--test` output and debug logs.
    pub fn masked_summary(&self) -> String {
        let mut masked = self.clone();
        for provider in &mut masked.providers {
            provider.api_key = mask_api_key(&provider.api_key);
        }
        serde_json::to_string_pretty(&masked).unwrap_or_else(|_| "<unprintable>".to_string())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: default_source_lang(),
            target_language: default_target_lang(),
            output_suffix: default_output_suffix(),
            max_retries: default_max_retries(),
            request_timeout_secs: default_request_timeout_secs(),
            block_char_budget: default_block_char_budget(),
            providers: ProviderId::ALL
                .iter()
                .map(|&id| ProviderSettings {
                    id,
                    api_key: String::new(),
                    endpoint: default_endpoint(id),
                    models: default_models(id),
                    priority: default_priority(id),
                    enabled: false,
                })
                .collect(),
        }
    }
}

impl ProviderSettings {
    /// Resolve one provider's settings from its `<PREFIX>_*` variables.
    pub fn from_lookup<F>(id: ProviderId, lookup: F) -> Result<Self, TranslationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = id.env_prefix();

        let api_key = lookup(&format!("{}_API_KEY", prefix))
            .map(|k| k.trim().to_string())
            .unwrap_or_default();

        let endpoint = lookup(&format!("{}_ENDPOINT", prefix))
            .unwrap_or_else(|| default_endpoint(id));

        let models = match lookup(&format!("{}_MODEL", prefix)) {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => default_models(id),
        };

        let priority = match lookup(&format!("{}_PRIORITY", prefix)) {
            Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
                TranslationError::Configuration(format!(
                    "{}_PRIORITY must be an integer, got '{}'",
                    prefix, raw
                ))
            })?,
            None => default_priority(id),
        };

        let enabled = match lookup(&format!("{}_ENABLED", prefix)) {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                TranslationError::Configuration(format!(
                    "{}_ENABLED must be a boolean, got '{}'",
                    prefix, raw
                ))
            })?,
            // A provider with a key is on unless switched off
            None => !api_key.is_empty(),
        };

        Ok(ProviderSettings {
            id,
            api_key,
            endpoint,
            models,
            priority,
            enabled,
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T, TranslationError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse::<T>().map_err(|_| {
            TranslationError::Configuration(format!(
                "{} must be a number, got '{}'",
                name, raw
            ))
        }),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn mask_api_key(key: &str) -> String {
    if key.is_empty() {
        return String::new();
    }
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

fn default_source_lang() -> String {
    "en".to_string()
}

fn default_target_lang() -> String {
    "vi".to_string()
}

fn default_output_suffix() -> String {
    "_vi".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_block_char_budget() -> usize {
    0
}

fn default_endpoint(id: ProviderId) -> String {
    match id {
        ProviderId::Groq => "https://api.groq.com/openai/v1".to_string(),
        ProviderId::OpenRouter => "https://openrouter.ai/api/v1".to_string(),
    }
}

fn default_models(id: ProviderId) -> Vec<String> {
    match id {
        ProviderId::Groq => vec![
            "llama-3.3-70b-versatile".to_string(),
            "llama-3.1-8b-instant".to_string(),
        ],
        ProviderId::OpenRouter => vec![
            "meta-llama/llama-3.3-70b-instruct:free".to_string(),
            "google/gemma-3-27b-it:free".to_string(),
        ],
    }
}

fn default_priority(id: ProviderId) -> u32 {
    match id {
        ProviderId::Groq => 1,
        ProviderId::OpenRouter => 2,
    }
}
