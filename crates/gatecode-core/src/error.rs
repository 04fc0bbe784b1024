//! Error types for GateCode.
//!
//! This module defines the error hierarchy for configuration loading, problem
//! loading, explanation validation, oracle round-trips and stage transitions.

use std::path::PathBuf;

use crate::stage::Stage;

/// A specialized `Result` type for GateCode operations.
pub type Result<T> = std::result::Result<T, GateError>;

/// Errors that can occur while running a GateCode session.
///
/// Startup errors (configuration, problem loading, credentials) are fatal and
/// reported by the CLI. Runtime errors never end a session: oracle failures are
/// folded into a rejected verification result and rejected actions leave the
/// session untouched.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your gatecode.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    /// The environment variable holding the oracle API key is not set.
    #[error("Oracle API key not found in environment variable '{env_var}'\n\nSuggestion: Export {env_var} or change oracle.apiKeyEnv in gatecode.json")]
    MissingApiKey {
        /// Name of the environment variable that was read.
        env_var: String,
    },

    // ========================================================================
    // Problem Loading Errors
    // ========================================================================
    /// Problem file was not found at the specified path.
    #[error("Problem not found: '{path}'\n\nSuggestion: Check the 'problem' field in gatecode.json or pass --problem")]
    ProblemNotFound {
        /// Path where the problem was expected.
        path: PathBuf,
    },

    /// Problem file exceeds the 100KB size limit.
    #[error("Problem exceeds size limit (100KB): '{path}' is {size_kb}KB\n\nSuggestion: Move long reference material out of the problem file")]
    ProblemTooLarge {
        /// Path to the oversized problem.
        path: PathBuf,
        /// Actual size in kilobytes.
        size_kb: u64,
    },

    /// Problem file contains non-UTF-8 content.
    #[error("Problem has invalid encoding: '{path}'\n\nSuggestion: Convert the file to UTF-8 encoding")]
    ProblemEncodingError {
        /// Path to the problem with encoding issues.
        path: PathBuf,
    },

    /// Problem file is not a valid problem definition.
    #[error("Invalid problem file '{path}': {message}\n\nSuggestion: A problem needs a non-empty title and description")]
    ProblemInvalid {
        /// Path to the problem file.
        path: PathBuf,
        /// Description of what is wrong.
        message: String,
    },

    // ========================================================================
    // Explanation Errors
    // ========================================================================
    /// The explanation is shorter than the configured minimum.
    #[error("Explanation too short: {length} characters, at least {minimum} required")]
    ExplanationTooShort {
        /// Trimmed character count of the submitted explanation.
        length: usize,
        /// Configured minimum.
        minimum: usize,
    },

    /// A verification call is already in flight for this session.
    #[error("A verification is already in progress (generation {generation})")]
    ConcurrentSubmission {
        /// Generation of the in-flight call.
        generation: u64,
    },

    // ========================================================================
    // Oracle Errors
    // ========================================================================
    /// The scoring oracle could not be reached or returned a non-success status.
    #[error("Oracle request failed ({kind}): {message}\n\nSuggestion: {suggestion}")]
    OracleTransport {
        /// The kind of transport failure.
        kind: OracleErrorKind,
        /// Detailed error message.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    /// The oracle answered, but not with a usable assessment.
    #[error("Oracle returned an unusable assessment: {message}")]
    OraclePayload {
        /// What was wrong with the payload.
        message: String,
    },

    // ========================================================================
    // Editor and Stage Errors
    // ========================================================================
    /// The editor is locked in the current stage.
    #[error("Editor is locked during the {stage} stage")]
    EditorLocked {
        /// The stage the session is in.
        stage: Stage,
    },

    /// The requested language has no profile.
    #[error("Unknown language '{language}': expected one of {available}")]
    UnknownLanguage {
        /// The requested language id.
        language: String,
        /// Comma-separated list of supported ids.
        available: String,
    },

    /// Invalid stage transition attempted.
    #[error("Invalid stage transition: cannot go from {from} to {to}")]
    InvalidStageTransition {
        /// The current stage.
        from: String,
        /// The attempted target stage.
        to: String,
    },

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Categories of oracle transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleErrorKind {
    /// Authentication failure (invalid API key, expired credentials).
    Authentication,
    /// Rate limit exceeded.
    RateLimit,
    /// Server error (5xx responses).
    Server,
    /// Network connectivity issues or timeouts.
    Network,
    /// Other unclassified errors.
    Other,
}

impl std::fmt::Display for OracleErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Server => write!(f, "server"),
            Self::Network => write!(f, "network"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl OracleErrorKind {
    /// Classifies an HTTP status code returned by the oracle.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Authentication,
            429 => Self::RateLimit,
            500..=599 => Self::Server,
            _ => Self::Other,
        }
    }

    /// Returns a suggestion message for this error kind.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::Authentication => "Check the oracle API key",
            Self::RateLimit => "Wait a moment and retry the verification",
            Self::Server => "Retry later; the scoring service may be experiencing issues",
            Self::Network => "Check your network connection and retry",
            Self::Other => "Check the oracle endpoint configuration",
        }
    }
}

impl GateError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `MissingApiKey` error.
    #[must_use]
    pub fn missing_api_key(env_var: impl Into<String>) -> Self {
        Self::MissingApiKey {
            env_var: env_var.into(),
        }
    }

    /// Creates a new `ProblemNotFound` error.
    #[must_use]
    pub fn problem_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ProblemNotFound { path: path.into() }
    }

    /// Creates a new `ProblemTooLarge` error.
    #[must_use]
    pub fn problem_too_large(path: impl Into<PathBuf>, size_kb: u64) -> Self {
        Self::ProblemTooLarge {
            path: path.into(),
            size_kb,
        }
    }

    /// Creates a new `ProblemEncodingError`.
    #[must_use]
    pub fn problem_encoding(path: impl Into<PathBuf>) -> Self {
        Self::ProblemEncodingError { path: path.into() }
    }

    /// Creates a new `ProblemInvalid` error.
    #[must_use]
    pub fn problem_invalid(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ProblemInvalid {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `OracleTransport` error with automatic suggestion based on kind.
    #[must_use]
    pub fn oracle_transport(kind: OracleErrorKind, message: impl Into<String>) -> Self {
        let suggestion = kind.suggestion().to_string();
        Self::OracleTransport {
            kind,
            message: message.into(),
            suggestion,
        }
    }

    /// Creates a new `OraclePayload` error.
    #[must_use]
    pub fn oracle_payload(message: impl Into<String>) -> Self {
        Self::OraclePayload {
            message: message.into(),
        }
    }

    /// Creates a new `UnknownLanguage` error listing the supported ids.
    #[must_use]
    pub fn unknown_language(language: impl Into<String>) -> Self {
        Self::UnknownLanguage {
            language: language.into(),
            available: crate::language::supported_ids().join(", "),
        }
    }

    /// Creates a new `InvalidStageTransition` error.
    #[must_use]
    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::InvalidStageTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Returns `true` if this error came from the scoring oracle round-trip.
    ///
    /// Oracle failures are converted into a rejected verification result
    /// rather than surfaced to the learner as errors.
    #[must_use]
    pub const fn is_oracle_failure(&self) -> bool {
        matches!(self, Self::OracleTransport { .. } | Self::OraclePayload { .. })
    }

    /// Returns `true` if this error is fatal and prevents the tool from starting.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigParseError { .. }
                | Self::ConfigValidationError { .. }
                | Self::MissingApiKey { .. }
                | Self::ProblemNotFound { .. }
                | Self::ProblemTooLarge { .. }
                | Self::ProblemEncodingError { .. }
                | Self::ProblemInvalid { .. }
        )
    }
}
