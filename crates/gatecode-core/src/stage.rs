//! Workflow stages for a GateCode session.
//!
//! A session moves through `Question -> Logic -> Verification -> Code`.
//! `Verification` falls back to `Logic` on retry or reset, and `Code` is
//! terminal.

use serde::{Deserialize, Serialize};

// ============================================================================
// Stage
// ============================================================================

/// Current stage of the explain-then-code workflow.
///
/// The stage transitions through these states:
/// - `Question` -> `Logic` (learner starts working on the problem)
/// - `Logic` -> `Verification` (explanation submitted)
/// - From `Verification`:
///   - `Code` (approved result, explicit proceed)
///   - `Logic` (retry)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Learner is reading the problem.
    #[default]
    Question,
    /// Learner is writing a natural-language explanation.
    Logic,
    /// Explanation is being (or has been) scored by the oracle.
    Verification,
    /// Editor is unlocked for coding.
    Code,
}

impl Stage {
    /// Returns `true` if this stage is terminal.
    ///
    /// # Examples
    ///
    /// ```
    /// use gatecode_core::Stage;
    ///
    /// assert!(Stage::Code.is_terminal());
    /// assert!(!Stage::Verification.is_terminal());
    /// ```
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Code)
    }

    /// Returns `true` if the editor is locked in this stage.
    ///
    /// This is the only place the lock is decided.
    ///
    /// # Examples
    ///
    /// ```
    /// use gatecode_core::Stage;
    ///
    /// assert!(Stage::Question.locks_editor());
    /// assert!(Stage::Verification.locks_editor());
    /// assert!(!Stage::Code.locks_editor());
    /// ```
    #[must_use]
    pub const fn locks_editor(&self) -> bool {
        !matches!(self, Self::Code)
    }

    /// Returns the stage name as used in events and error messages.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Logic => "logic",
            Self::Verification => "verification",
            Self::Code => "code",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Action
// ============================================================================

/// An action the learner can take from the current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Leave the question panel and start explaining.
    Start,
    /// Submit the explanation for verification.
    Submit,
    /// Move on to coding after an approved verification.
    Proceed,
    /// Discard the verification and rewrite the explanation.
    Retry,
    /// Discard the explanation and any result, and explain again.
    Reset,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Submit => write!(f, "submit"),
            Self::Proceed => write!(f, "proceed"),
            Self::Retry => write!(f, "retry"),
            Self::Reset => write!(f, "reset"),
        }
    }
}
