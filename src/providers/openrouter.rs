use std::sync::Arc;
use std::time::Duration;

use crate::app_config::ProviderSettings;
use crate::providers::chat_api::ChatClient;
use crate::providers::ChatAdapter;
use crate::rate_limiter::{RateLimiter, WindowKind, WindowSpec};

/// Attribution headers OpenRouter asks apps to send
const ATTRIBUTION_REFERER: &str = "https://github.com/sublate/sublate";
const ATTRIBUTION_TITLE: &str = "sublate";

/// Free-tier quota windows, account-wide numbers applied per model
fn window_specs() -> Vec<WindowSpec> {
    vec![
        WindowSpec::per_minute(WindowKind::Requests, 20),
        WindowSpec::per_day(WindowKind::Requests, 50),
    ]
}

/// Build the OpenRouter adapter and register its models with the ledger.
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
    )
    .with_header("HTTP-Referer", ATTRIBUTION_REFERER)
    .with_header("X-Title", ATTRIBUTION_TITLE);

    for model in &settings.models {
        limiter.register_model(settings.id.as_str(), model, &window_specs());
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
