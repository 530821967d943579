use std::sync::Arc;
use std::time::Duration;

use crate::app_config::ProviderSettings;
use crate::providers::chat_api::ChatClient;
use crate::providers::ChatAdapter;
use crate::rate_limiter::{RateLimiter, WindowKind, WindowSpec};

/// Free-tier quota windows for a Groq model
///
/// Groq publishes per-model limits; override models fall back to the
/// per-minute floor shared by the free tier.
fn window_specs(model: &str) -> Vec<WindowSpec> {
    match model {
        "llama-3.3-70b-versatile" => vec![
            WindowSpec::per_minute(WindowKind::Requests, 30),
            WindowSpec::per_day(WindowKind::Requests, 1_000),
            WindowSpec::per_minute(WindowKind::TotalTokens, 6_000),
            WindowSpec::per_day(WindowKind::TotalTokens, 100_000),
        ],
        "llama-3.1-8b-instant" => vec![
            WindowSpec::per_minute(WindowKind::Requests, 30),
            WindowSpec::per_day(WindowKind::Requests, 14_400),
            WindowSpec::per_minute(WindowKind::TotalTokens, 6_000),
            WindowSpec::per_day(WindowKind::TotalTokens, 500_000),
        ],
        _ => vec![
            WindowSpec::per_minute(WindowKind::Requests, 30),
            WindowSpec::per_minute(WindowKind::TotalTokens, 6_000),
        ],
    }
}

/// Build the Groq adapter and register its models with the ledger.
pub fn build(
    settings: &ProviderSettings,
    timeout: Duration,
    max_retries: u32,
    source_language: &str,
    target_language: &str,
    limiter: Arc<RateLimiter>,
) -> ChatAdapter {
    let client = ChatClient::new(
        settings.id.as_str(),
        &settings.endpoint,
        &settings.api_key,
        timeout,
    );

    for model in &settings.models {
        limiter.register_model(settings.id.as_str(), model, &window_specs(model));
    }

    ChatAdapter::new(
        settings.id.as_str(),
        client,
        settings.models.clone(),
        settings.priority,
        !settings.api_key.is_empty(),
        limiter,
    )
    .with_max_retries(max_retries)
    .with_languages(source_language, target_language)
}
