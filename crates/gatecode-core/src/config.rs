//! Configuration types for GateCode.
//!
//! This module provides the configuration structures controlling the problem
//! to load, the explanation gate and the scoring oracle.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};
use crate::language;

/// The default config file name.
const CONFIG_FILE_NAME: &str = "gatecode.json";

/// Default problem file path.
fn default_problem() -> String {
    "problem.json".to_string()
}

/// Default editor language.
fn default_language() -> String {
    "python".to_string()
}

/// Default minimum explanation length in characters.
const fn default_min_explanation_length() -> usize {
    50
}

/// Default oracle model.
fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

/// Default environment variable holding the oracle API key.
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

/// Default oracle request timeout in seconds.
const fn default_timeout_seconds() -> u32 {
    30
}

/// Default cap on tokens the oracle may generate.
const fn default_max_output_tokens() -> u32 {
    1024
}

/// Main configuration for GateCode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Path to the problem definition file.
    #[serde(default = "default_problem")]
    pub problem: String,

    /// Language the editor starts in.
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Minimum trimmed character count for an explanation to be submitted.
    #[serde(default = "default_min_explanation_length")]
    pub min_explanation_length: usize,

    /// Scoring oracle settings.
    #[serde(default)]
    pub oracle: OracleConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            problem: default_problem(),
            default_language: default_language(),
            min_explanation_length: default_min_explanation_length(),
            oracle: OracleConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `gatecode.json` in the current directory. If found, loads and
    /// validates the configuration. If not found, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            GateError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `gatecode.json` in a specific directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        Self::load_from_file(&config_path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `GateError::ConfigParseError` if the file exists but contains
    /// invalid JSON or invalid enum values.
    ///
    /// Returns `GateError::ConfigValidationError` if the configuration values
    /// are invalid.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(GateError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| GateError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// Checks that:
    /// - `problem` path is not empty
    /// - `default_language` names a supported language
    /// - `min_explanation_length` is greater than 0
    /// - `oracle.model` and `oracle.api_key_env` are not empty
    /// - `oracle.timeout_seconds` and `oracle.max_output_tokens` are greater than 0
    ///
    /// # Errors
    ///
    /// Returns `GateError::ConfigValidationError` if any validation check fails.
    pub fn validate(&self) -> Result<()> {
        if self.problem.trim().is_empty() {
            return Err(GateError::config_validation(
                "problem path must not be empty",
                "Provide a valid problem file path in your gatecode.json",
            ));
        }

        if language::profile(&self.default_language).is_none() {
            return Err(GateError::config_validation(
                format!("defaultLanguage '{}' is not supported", self.default_language),
                format!(
                    "Set defaultLanguage to one of: {}",
                    language::supported_ids().join(", ")
                ),
            ));
        }

        if self.min_explanation_length == 0 {
            return Err(GateError::config_validation(
                "minExplanationLength must be greater than 0",
                "Set minExplanationLength to at least 1 in your gatecode.json",
            ));
        }

        if self.oracle.model.trim().is_empty() {
            return Err(GateError::config_validation(
                "oracle.model must not be empty",
                "Name the scoring model in oracle.model in your gatecode.json",
            ));
        }

        if self.oracle.api_key_env.trim().is_empty() {
            return Err(GateError::config_validation(
                "oracle.apiKeyEnv must not be empty",
                "Set oracle.apiKeyEnv to the environment variable holding your API key",
            ));
        }

        if self.oracle.timeout_seconds == 0 {
            return Err(GateError::config_validation(
                "oracle.timeoutSeconds must be greater than 0",
                "Set oracle.timeoutSeconds to at least 1 second in your gatecode.json",
            ));
        }

        if self.oracle.max_output_tokens == 0 {
            return Err(GateError::config_validation(
                "oracle.maxOutputTokens must be greater than 0",
                "Set oracle.maxOutputTokens to at least 1 in your gatecode.json",
            ));
        }

        Ok(())
    }
}

/// Supported LLM providers for the scoring oracle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LlmProvider {
    /// Google Gemini `generateContent` (default).
    #[default]
    Gemini,
    /// Anthropic Messages API.
    Claude,
    /// `OpenAI` chat completions.
    OpenAi,
}

impl LlmProvider {
    /// Parses a string into an `LlmProvider`, case-insensitively.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gemini" => Some(Self::Gemini),
            "claude" => Some(Self::Claude),
            "openai" => Some(Self::OpenAi),
            _ => None,
        }
    }

    /// Default endpoint for this provider.
    ///
    /// Gemini embeds the model in the URL; the other providers take it in the body.
    #[must_use]
    pub fn default_endpoint(&self, model: &str) -> String {
        match self {
            Self::Gemini => format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent"
            ),
            Self::Claude => "https://api.anthropic.com/v1/messages".to_string(),
            Self::OpenAi => "https://api.openai.com/v1/chat/completions".to_string(),
        }
    }
}

impl<'de> Deserialize<'de> for LlmProvider {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid LLM provider '{s}': expected one of 'gemini', 'claude', 'openai'"
            ))
        })
    }
}

impl Serialize for LlmProvider {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = match self {
            Self::Gemini => "gemini",
            Self::Claude => "claude",
            Self::OpenAi => "openai",
        };
        serializer.serialize_str(s)
    }
}

/// Scoring oracle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleConfig {
    /// Wire format and default endpoint.
    #[serde(default)]
    pub provider: LlmProvider,

    /// Endpoint override; the provider default is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Model name sent to the provider.
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u32,

    /// Cap on generated tokens.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            endpoint: None,
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_seconds: default_timeout_seconds(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

impl OracleConfig {
    /// The endpoint requests are sent to.
    #[must_use]
    pub fn resolved_endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| self.provider.default_endpoint(&self.model))
    }
}
