use std::time::Duration;

use log::{debug, error};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};

use crate::errors::TranslationError;
use crate::rate_limiter::TokenUsage;

/// Fallback delay when a 429 carries no usable retry hint
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Matches provider messages like "Please try again in 7.66s."
static RETRY_AFTER_MESSAGE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"try again in (\d+(?:\.\d+)?)\s*(ms|s|m)\b")
        .expect("Invalid retry-after regex pattern")
});

/// Chat message object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender (system, user, assistant)
    pub role: String,
    /// Content of the message
    pub content: String,
}

/// Chat completion request body
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    /// Model name to use for generation
    model: String,
    /// Messages of the conversation
    messages: Vec<ChatMessage>,
    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    /// Whether to stream the response
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

/// Builder methods for ChatRequest - some are API surface for library consumers
#[allow(dead_code)]
impl ChatRequest {
    /// Create a new chat request
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature: None,
            max_tokens: None,
            stream: Some(false),
        }
    }

    /// Add a message to the conversation
    pub fn add_message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage {
            role: role.into(),
            content: content.into(),
        });
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the maximum number of completion tokens
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// The model this request targets
    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Individual choice in a chat completion response
#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    /// Response message
    pub message: ChatMessage,
}

/// Token accounting block of a chat completion response
#[derive(Debug, Default, Deserialize)]
pub struct ApiUsage {
    /// Number of prompt tokens billed
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Number of completion tokens billed
    #[serde(default)]
    pub completion_tokens: u64,
    /// Total tokens billed
    #[serde(default)]
    pub total_tokens: u64,
}

impl From<ApiUsage> for TokenUsage {
    fn from(usage: ApiUsage) -> Self {
        let total = if usage.total_tokens > 0 {
            usage.total_tokens
        } else {
            usage.prompt_tokens + usage.completion_tokens
        };
        TokenUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: total,
        }
    }
}

/// Chat completion response body
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    /// Completion choices, first one carries the answer
    pub choices: Vec<ChatChoice>,
    /// Token usage, absent on some gateways
    #[serde(default)]
    pub usage: Option<ApiUsage>,
    /// Model that actually served the request
    #[serde(default)]
    pub model: Option<String>,
}

/// Model listing response for connectivity probes
#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

/// One model in a listing response
#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// Extracted result of a successful chat completion call
#[derive(Debug)]
pub struct ChatCompletion {
    /// Completion text of the first choice
    pub text: String,
    /// Model that served the request
    pub model: String,
    /// Token usage, zeros when the server omitted it
    pub usage: TokenUsage,
}

/// HTTP client for one OpenAI-compatible endpoint
///
/// Classifies every failure into the error taxonomy: 401/403 are
/// authentication, 429 is rate limiting with a parsed retry delay,
/// 5xx and transport failures are connection errors, and a 2xx body
/// that cannot be used is an invalid response.
pub struct ChatClient {
    /// Lowercase provider name used in error diagnostics
    provider: String,
    /// Base URL without trailing slash
    endpoint: String,
    /// API key sent as a bearer token
    api_key: String,
    /// HTTP client with the per-call timeout applied
    client: Client,
    /// Additional headers sent on every request
    extra_headers: Vec<(String, String)>,
}

// The API key must never surface in debug output
impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl ChatClient {
    /// Create a new client for the given endpoint
    pub fn new(
        provider: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let endpoint = endpoint.into();
        Self {
            provider: provider.into(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            extra_headers: Vec::new(),
        }
    }

    /// Add a header sent with every request
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    /// Complete a chat request
    pub async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, TranslationError> {
        let url = format!("{}/chat/completions", self.endpoint);
        debug!(
            "Sending chat completion to {} (model {})",
            self.provider,
            request.model()
        );

        let response = self
            .apply_headers(self.client.post(&url))
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify_send_error(e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to get response text".to_string());

        if let Some(err) = self.classify_status(status, &headers, &body) {
            return Err(err);
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            error!(
                "{} returned an unparseable completion body: {}. Raw response (first 200 chars): {}",
                self.provider,
                e,
                excerpt(&body, 200)
            );
            TranslationError::InvalidResponse {
                provider: self.provider.clone(),
                detail: format!("unparseable completion body: {}", e),
            }
        })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| TranslationError::InvalidResponse {
                provider: self.provider.clone(),
                detail: "response contained no choices".to_string(),
            })?;

        if choice.message.content.trim().is_empty() {
            return Err(TranslationError::InvalidResponse {
                provider: self.provider.clone(),
                detail: "response contained an empty completion".to_string(),
            });
        }

        Ok(ChatCompletion {
            text: choice.message.content,
            model: parsed.model.unwrap_or_else(|| request.model().to_string()),
            usage: parsed.usage.map(TokenUsage::from).unwrap_or_default(),
        })
    }

    /// List the models the endpoint serves
    ///
    /// Cheap connectivity and credential probe: nothing is billed, and
    /// failures classify exactly like completion calls.
    pub async fn list_models(&self) -> Result<Vec<String>, TranslationError> {
        let url = format!("{}/models", self.endpoint);

        let response = self
            .apply_headers(self.client.get(&url))
            .send()
            .await
            .map_err(|e| self.classify_send_error(e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to get response text".to_string());

        if let Some(err) = self.classify_status(status, &headers, &body) {
            return Err(err);
        }

        let listing: ModelList =
            serde_json::from_str(&body).map_err(|e| TranslationError::InvalidResponse {
                provider: self.provider.clone(),
                detail: format!("unparseable model listing: {}", e),
            })?;

        Ok(listing.data.into_iter().map(|m| m.id).collect())
    }

    fn apply_headers(&self, builder: RequestBuilder) -> RequestBuilder {
        let mut builder = builder.bearer_auth(&self.api_key);
        for (name, value) in &self.extra_headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
    }

    fn classify_send_error(&self, e: reqwest::Error) -> TranslationError {
        let detail = if e.is_timeout() {
            "request timed out".to_string()
        } else {
            format!("request failed: {}", e)
        };
        error!("{} API transport error: {}", self.provider, detail);
        TranslationError::Connection {
            provider: self.provider.clone(),
            detail,
        }
    }

    /// Map a non-2xx status onto the error taxonomy, None when usable
    fn classify_status(
        &self,
        status: StatusCode,
        headers: &reqwest::header::HeaderMap,
        body: &str,
    ) -> Option<TranslationError> {
        if status.is_success() {
            return None;
        }

        let detail = format!("HTTP {}: {}", status.as_u16(), excerpt(body, 200));
        error!("{} API error ({}): {}", self.provider, status, excerpt(body, 200));

        let err = match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TranslationError::Authentication {
                provider: self.provider.clone(),
                detail,
            },
            StatusCode::TOO_MANY_REQUESTS => TranslationError::RateLimited {
                provider: self.provider.clone(),
                retry_after_secs: parse_retry_after(headers, body),
            },
            s if s.is_server_error() => TranslationError::Connection {
                provider: self.provider.clone(),
                detail,
            },
            // Other client errors are terminal, the request itself is wrong
            _ => TranslationError::InvalidResponse {
                provider: self.provider.clone(),
                detail,
            },
        };
        Some(err)
    }
}

/// Resolve the retry delay of a 429 response
///
/// A `Retry-After` header with integer seconds wins; otherwise the error
/// message is scanned for a "try again in ..." hint; otherwise a fixed
/// default applies. Sub-second hints round up to one second.
pub fn parse_retry_after(headers: &reqwest::header::HeaderMap, body: &str) -> u64 {
    if let Some(value) = headers.get(reqwest::header::RETRY_AFTER) {
        if let Some(secs) = value.to_str().ok().and_then(|v| v.trim().parse::<u64>().ok()) {
            return secs.max(1);
        }
    }

    if let Some(caps) = RETRY_AFTER_MESSAGE_REGEX.captures(body) {
        let value: f64 = caps[1].parse().unwrap_or(0.0);
        let secs = match &caps[2] {
            "ms" => value / 1000.0,
            "m" => value * 60.0,
            _ => value,
        };
        if secs > 0.0 {
            return secs.ceil() as u64;
        }
    }

    DEFAULT_RETRY_AFTER_SECS
}

fn excerpt(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        text.chars().take(limit).collect()
    } else {
        text.to_string()
    }
}
