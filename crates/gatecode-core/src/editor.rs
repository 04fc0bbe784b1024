//! The editor's source buffer.

use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};
use crate::highlight::{self, HighlightedLine};
use crate::language::{self, LanguageProfile};
use crate::problem::Problem;

/// Current editor text and selected language.
///
/// Switching language replaces the text wholesale with that language's starter
/// code.
#[derive(Debug, Clone)]
pub struct SourceBuffer {
    text: String,
    language: &'static LanguageProfile,
}

impl SourceBuffer {
    /// Creates a buffer holding the starter code for `language_id`.
    ///
    /// # Errors
    ///
    /// Returns `GateError::UnknownLanguage` if the language is not supported.
    pub fn new(problem: &Problem, language_id: &str) -> Result<Self> {
        let language =
            language::profile(language_id).ok_or_else(|| GateError::unknown_language(language_id))?;
        Ok(Self {
            text: problem.starter_for(language).to_string(),
            language,
        })
    }

    /// The buffer contents.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The selected language.
    #[must_use]
    pub const fn language(&self) -> &'static LanguageProfile {
        self.language
    }

    /// Replaces the buffer contents.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Selects another language and resets the text to its starter code.
    ///
    /// # Errors
    ///
    /// Returns `GateError::UnknownLanguage` if the language is not supported;
    /// the buffer is left unchanged.
    pub fn switch_language(&mut self, problem: &Problem, language_id: &str) -> Result<()> {
        *self = Self::new(problem, language_id)?;
        Ok(())
    }

    /// Restores the starter code for the current language.
    pub fn reset(&mut self, problem: &Problem) {
        self.text = problem.starter_for(self.language).to_string();
    }

    /// Highlights the current contents.
    #[must_use]
    pub fn highlight(&self) -> Vec<HighlightedLine> {
        highlight::highlight_lines(&self.text, self.language.id)
    }
}

/// Result of the run action.
///
/// Code execution is not available; the action only reports that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutput {
    /// Whether the code was executed.
    pub executed: bool,
    /// Language the run was requested for.
    pub language: String,
    /// Message for the output panel.
    pub message: String,
}

impl RunOutput {
    /// The stub answer for a run request.
    #[must_use]
    pub fn unavailable(language: &LanguageProfile) -> Self {
        Self {
            executed: false,
            language: language.id.to_string(),
            message: format!(
                "Running {} code is not available yet. Review your solution by reading it through.",
                language.display_name
            ),
        }
    }
}
