//! Transport to the external scoring oracle.
//!
//! The [`Oracle`] trait is the seam between the verification client and the
//! network: it takes a prompt and returns the oracle's raw text answer.
//! [`HttpOracle`] implements it for the Gemini, Claude and `OpenAI` wire formats.

use std::fmt;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::{LlmProvider, OracleConfig};
use crate::error::{GateError, OracleErrorKind, Result};

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Sampling temperature; scoring should be as repeatable as the provider allows.
const TEMPERATURE: f64 = 0.2;

/// Longest error body echoed into an error message.
const MAX_ERROR_BODY: usize = 300;

/// A service that answers a prompt with text.
pub trait Oracle: fmt::Debug + Send + Sync {
    /// Sends `prompt` and returns the oracle's text answer.
    ///
    /// Transport problems map to `GateError::OracleTransport`, answers
    /// without text to `GateError::OraclePayload`.
    fn complete<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String>>;
}

/// HTTP client for a hosted LLM acting as the scoring oracle.
pub struct HttpOracle {
    client: reqwest::Client,
    provider: LlmProvider,
    endpoint: String,
    model: String,
    api_key: String,
    max_output_tokens: u32,
}

impl fmt::Debug for HttpOracle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpOracle")
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl HttpOracle {
    /// Builds an oracle from configuration, reading the API key from the
    /// environment variable named by `config.api_key_env`.
    ///
    /// # Errors
    ///
    /// Returns `GateError::MissingApiKey` if the variable is unset or empty.
    pub fn from_config(config: &OracleConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| GateError::missing_api_key(&config.api_key_env))?;
        Self::with_api_key(config, api_key)
    }

    /// Builds an oracle with an explicit API key.
    ///
    /// # Errors
    ///
    /// Returns `GateError::OracleTransport` if the HTTP client cannot be built.
    pub fn with_api_key(config: &OracleConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(u64::from(config.timeout_seconds)))
            .build()
            .map_err(|e| GateError::oracle_transport(OracleErrorKind::Other, e.to_string()))?;

        Ok(Self {
            client,
            provider: config.provider,
            endpoint: config.resolved_endpoint(),
            model: config.model.clone(),
            api_key: api_key.into(),
            max_output_tokens: config.max_output_tokens,
        })
    }

    /// The endpoint requests are posted to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, prompt: &str) -> Result<String> {
        let body = request_body(self.provider, &self.model, self.max_output_tokens, prompt);
        let request = self.client.post(&self.endpoint).json(&body);
        let request = match self.provider {
            LlmProvider::Gemini => request.header("x-goog-api-key", &self.api_key),
            LlmProvider::Claude => request
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            LlmProvider::OpenAi => request.bearer_auth(&self.api_key),
        };

        debug!(
            provider = ?self.provider,
            endpoint = %self.endpoint,
            prompt_len = prompt.len(),
            "Sending oracle request"
        );

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Oracle returned non-success status");
            return Err(GateError::oracle_transport(
                OracleErrorKind::from_status(status.as_u16()),
                format!("HTTP {status}: {}", truncate(&text, MAX_ERROR_BODY)),
            ));
        }

        let body: Value = serde_json::from_str(&text)
            .map_err(|e| GateError::oracle_payload(format!("response is not JSON: {e}")))?;
        extract_text(self.provider, &body)
            .ok_or_else(|| GateError::oracle_payload("response contains no text content"))
    }
}

impl Oracle for HttpOracle {
    fn complete<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.send(prompt))
    }
}

/// Builds the provider-specific request body.
pub(crate) fn request_body(
    provider: LlmProvider,
    model: &str,
    max_output_tokens: u32,
    prompt: &str,
) -> Value {
    match provider {
        LlmProvider::Gemini => json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": TEMPERATURE,
                "maxOutputTokens": max_output_tokens,
                "responseMimeType": "application/json",
            },
        }),
        LlmProvider::Claude => json!({
            "model": model,
            "max_tokens": max_output_tokens,
            "temperature": TEMPERATURE,
            "messages": [{ "role": "user", "content": prompt }],
        }),
        LlmProvider::OpenAi => json!({
            "model": model,
            "max_tokens": max_output_tokens,
            "temperature": TEMPERATURE,
            "messages": [{ "role": "user", "content": prompt }],
        }),
    }
}

/// Pulls the answer text out of a provider response.
pub(crate) fn extract_text(provider: LlmProvider, body: &Value) -> Option<String> {
    let pointer = match provider {
        LlmProvider::Gemini => "/candidates/0/content/parts/0/text",
        LlmProvider::Claude => "/content/0/text",
        LlmProvider::OpenAi => "/choices/0/message/content",
    };
    body.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn transport_error(e: reqwest::Error) -> GateError {
    let kind = if e.is_timeout() || e.is_connect() || e.is_request() {
        OracleErrorKind::Network
    } else if let Some(status) = e.status() {
        OracleErrorKind::from_status(status.as_u16())
    } else {
        OracleErrorKind::Other
    };
    GateError::oracle_transport(kind, e.to_string())
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
