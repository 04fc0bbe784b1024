//! Problem loading for GateCode.
//!
//! A problem is read-only input: a title, a description, optional hints and
//! optional starter code per language. It is loaded once from a JSON file and
//! shared by the session and the verification client.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};
use crate::language::LanguageProfile;

/// Maximum allowed problem file size in bytes (100KB).
pub const MAX_PROBLEM_SIZE: u64 = 100 * 1024;

/// A coding problem the learner explains and then solves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    /// Short title shown in the question panel.
    pub title: String,

    /// Full problem statement.
    pub description: String,

    /// Optional hints, in the order they should be revealed.
    #[serde(default)]
    pub hints: Vec<String>,

    /// Starter code keyed by language id, overriding the language template.
    #[serde(default)]
    pub starter_code: BTreeMap<String, String>,
}

impl Problem {
    /// Creates a problem with no hints and no starter code.
    #[must_use]
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            hints: Vec::new(),
            starter_code: BTreeMap::new(),
        }
    }

    /// Adds a hint.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    /// Adds starter code for a language.
    #[must_use]
    pub fn with_starter(mut self, language: impl Into<String>, code: impl Into<String>) -> Self {
        self.starter_code.insert(language.into(), code.into());
        self
    }

    /// Loads a problem from the given JSON file.
    ///
    /// Validates that:
    /// - The file exists
    /// - The file size is within the 100KB limit
    /// - The content is valid UTF-8
    /// - The content is a problem with a non-empty title and description
    ///
    /// # Errors
    ///
    /// Returns `GateError::ProblemNotFound` if the file doesn't exist.
    /// Returns `GateError::ProblemTooLarge` if the file exceeds 100KB.
    /// Returns `GateError::ProblemEncodingError` if the file is not valid UTF-8.
    /// Returns `GateError::ProblemInvalid` if the JSON is not a valid problem.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let metadata = std::fs::metadata(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GateError::problem_not_found(path)
            } else {
                GateError::Io(e)
            }
        })?;

        let file_size = metadata.len();
        if file_size > MAX_PROBLEM_SIZE {
            return Err(GateError::problem_too_large(path, file_size / 1024));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::InvalidData {
                GateError::problem_encoding(path)
            } else {
                GateError::Io(e)
            }
        })?;

        Self::from_json(&content).map_err(|e| match e {
            GateError::ProblemInvalid { message, .. } => GateError::problem_invalid(path, message),
            other => other,
        })
    }

    /// Parses and validates a problem from JSON text.
    ///
    /// # Errors
    ///
    /// Returns `GateError::ProblemInvalid` if the JSON does not describe a
    /// problem with a non-empty title and description.
    pub fn from_json(content: &str) -> Result<Self> {
        let problem: Self = serde_json::from_str(content)
            .map_err(|e| GateError::problem_invalid(PathBuf::from("<inline>"), e.to_string()))?;
        problem.validate()?;
        Ok(problem)
    }

    fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(GateError::problem_invalid("<inline>", "title must not be empty"));
        }
        if self.description.trim().is_empty() {
            return Err(GateError::problem_invalid(
                "<inline>",
                "description must not be empty",
            ));
        }
        Ok(())
    }

    /// Starter code for `language`: the problem's own, else the language template.
    #[must_use]
    pub fn starter_for<'a>(&'a self, language: &'a LanguageProfile) -> &'a str {
        self.starter_code
            .get(language.id)
            .map_or(language.starter_template, String::as_str)
    }
}
