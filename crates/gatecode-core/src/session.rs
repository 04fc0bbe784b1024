//! Session state machine.
//!
//! [`Session`] holds everything one learner's attempt at a problem owns: the
//! stage, the explanation, the latest verification result and the editor
//! buffer. Every transition is synchronous; the asynchronous oracle call is
//! driven by [`crate::controller::StageController`], which brackets it with
//! [`Session::begin_verification`] and [`Session::complete_verification`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::editor::{RunOutput, SourceBuffer};
use crate::error::{GateError, Result};
use crate::problem::Problem;
use crate::stage::{Action, Stage};
use crate::verification::VerificationResult;

/// Default minimum explanation length in characters.
pub const DEFAULT_MIN_EXPLANATION_LENGTH: usize = 50;

// ============================================================================
// Explanation
// ============================================================================

/// The learner's natural-language description of their solution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explanation {
    /// The text as submitted.
    pub text: String,
}

impl Explanation {
    /// Wraps submitted text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Length used for the minimum check: characters after trimming.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.trim().chars().count()
    }

    /// Returns `true` if the explanation is blank.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything the controller needs to run one verification call.
#[derive(Debug, Clone)]
pub struct VerificationTicket {
    /// Generation the result must match to be applied.
    pub generation: u64,
    /// The submitted explanation.
    pub explanation: String,
    /// The problem being explained.
    pub problem: Arc<Problem>,
}

// ============================================================================
// Session
// ============================================================================

/// One learner's progress through a problem.
#[derive(Debug, Clone)]
pub struct Session {
    problem: Arc<Problem>,
    stage: Stage,
    buffer: SourceBuffer,
    explanation: Option<Explanation>,
    result: Option<VerificationResult>,
    generation: u64,
    pending: Option<u64>,
    min_explanation_length: usize,
    attempts: u32,
    started_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session in the `Question` stage.
    ///
    /// # Errors
    ///
    /// Returns `GateError::UnknownLanguage` if `language` has no profile.
    pub fn new(problem: Arc<Problem>, language: &str, min_explanation_length: usize) -> Result<Self> {
        let buffer = SourceBuffer::new(&problem, language)?;
        let now = Utc::now();
        Ok(Self {
            problem,
            stage: Stage::Question,
            buffer,
            explanation: None,
            result: None,
            generation: 0,
            pending: None,
            min_explanation_length,
            attempts: 0,
            started_at: now,
            updated_at: now,
        })
    }

    /// Creates a session using the language and minimum length from `config`.
    ///
    /// # Errors
    ///
    /// Returns `GateError::UnknownLanguage` if the configured language has no profile.
    pub fn from_config(problem: Arc<Problem>, config: &Config) -> Result<Self> {
        Self::new(
            problem,
            &config.default_language,
            config.min_explanation_length,
        )
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Current stage.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// The problem being worked on.
    #[must_use]
    pub fn problem(&self) -> &Arc<Problem> {
        &self.problem
    }

    /// The editor buffer.
    #[must_use]
    pub const fn buffer(&self) -> &SourceBuffer {
        &self.buffer
    }

    /// The last submitted explanation, if any.
    #[must_use]
    pub const fn explanation(&self) -> Option<&Explanation> {
        self.explanation.as_ref()
    }

    /// The latest applied verification result, if any.
    #[must_use]
    pub const fn result(&self) -> Option<&VerificationResult> {
        self.result.as_ref()
    }

    /// Current generation.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `true` while a verification call is unresolved.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Number of explanations submitted so far.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Minimum explanation length.
    #[must_use]
    pub const fn min_explanation_length(&self) -> usize {
        self.min_explanation_length
    }

    /// Whether the editor is locked. Derived from the stage only.
    #[must_use]
    pub const fn editor_locked(&self) -> bool {
        self.stage.locks_editor()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn set_stage(&mut self, to: Stage) {
        if self.stage != to {
            info!(from = %self.stage, to = %to, generation = self.generation, "Stage transition");
            self.stage = to;
        }
        self.touch();
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    /// `Question -> Logic`.
    ///
    /// # Errors
    ///
    /// Returns `GateError::InvalidStageTransition` outside `Question`.
    pub fn start(&mut self) -> Result<()> {
        if self.stage != Stage::Question {
            return Err(GateError::invalid_transition(self.stage, Stage::Logic));
        }
        self.set_stage(Stage::Logic);
        Ok(())
    }

    /// Returns `true` if `text` could be submitted right now.
    #[must_use]
    pub fn can_submit(&self, text: &str) -> bool {
        self.stage == Stage::Logic
            && self.pending.is_none()
            && Explanation::new(text).len() >= self.min_explanation_length
    }

    /// Checks `text` against the minimum length.
    ///
    /// # Errors
    ///
    /// Returns `GateError::ExplanationTooShort` if it is too short.
    pub fn validate_explanation(&self, text: &str) -> Result<Explanation> {
        let explanation = Explanation::new(text);
        let length = explanation.len();
        if length < self.min_explanation_length {
            return Err(GateError::ExplanationTooShort {
                length,
                minimum: self.min_explanation_length,
            });
        }
        Ok(explanation)
    }

    /// `Logic -> Verification`: records the explanation and opens a new
    /// generation for the verification call.
    ///
    /// # Errors
    ///
    /// - `GateError::ConcurrentSubmission` if a call is already pending
    /// - `GateError::InvalidStageTransition` outside `Logic`
    /// - `GateError::ExplanationTooShort` if the text is too short; the stage
    ///   does not change
    pub fn begin_verification(&mut self, text: &str) -> Result<VerificationTicket> {
        if let Some(generation) = self.pending {
            return Err(GateError::ConcurrentSubmission { generation });
        }
        if self.stage != Stage::Logic {
            return Err(GateError::invalid_transition(
                self.stage,
                Stage::Verification,
            ));
        }
        let explanation = self.validate_explanation(text)?;

        self.generation += 1;
        self.pending = Some(self.generation);
        self.attempts += 1;
        self.result = None;
        let ticket = VerificationTicket {
            generation: self.generation,
            explanation: explanation.text.clone(),
            problem: Arc::clone(&self.problem),
        };
        self.explanation = Some(explanation);
        self.set_stage(Stage::Verification);

        debug!(
            generation = self.generation,
            attempt = self.attempts,
            "Verification started"
        );
        Ok(ticket)
    }

    /// Applies the outcome of the call issued for `generation`.
    ///
    /// A failed call is recorded as a rejected result. Returns the applied
    /// result, or `None` if the outcome is stale and was discarded.
    pub fn complete_verification(
        &mut self,
        generation: u64,
        outcome: Result<VerificationResult>,
    ) -> Option<VerificationResult> {
        if generation != self.generation || self.pending != Some(generation) {
            warn!(
                generation,
                current = self.generation,
                "Discarding stale verification result"
            );
            return None;
        }

        let result = match outcome {
            Ok(result) => result,
            Err(e) => VerificationResult::failed(&e),
        };
        self.pending = None;
        self.result = Some(result.clone());
        self.touch();
        Some(result)
    }

    /// `Verification -> Code`, only with an approved result.
    ///
    /// # Errors
    ///
    /// Returns `GateError::InvalidStageTransition` unless the session is in
    /// `Verification` with an approved result and no pending call.
    pub fn proceed(&mut self) -> Result<()> {
        let approved = self.result.as_ref().is_some_and(|r| r.approved);
        if self.stage != Stage::Verification || self.pending.is_some() || !approved {
            return Err(GateError::invalid_transition(self.stage, Stage::Code));
        }
        self.set_stage(Stage::Code);
        Ok(())
    }

    /// `Verification -> Logic`, clearing the explanation and result.
    ///
    /// Allowed while a call is pending; its result will be discarded.
    ///
    /// # Errors
    ///
    /// Returns `GateError::InvalidStageTransition` outside `Verification`.
    pub fn retry(&mut self) -> Result<()> {
        if self.stage != Stage::Verification {
            return Err(GateError::invalid_transition(self.stage, Stage::Logic));
        }
        self.generation += 1;
        self.pending = None;
        self.explanation = None;
        self.result = None;
        self.set_stage(Stage::Logic);
        Ok(())
    }

    /// `Logic | Verification -> Logic`, discarding the explanation, any
    /// result and any call in flight.
    ///
    /// `Code` is terminal and `Question` has nothing to discard.
    ///
    /// # Errors
    ///
    /// Returns `GateError::InvalidStageTransition` from `Question` or `Code`.
    pub fn reset(&mut self) -> Result<()> {
        if !matches!(self.stage, Stage::Logic | Stage::Verification) {
            return Err(GateError::invalid_transition(self.stage, Stage::Logic));
        }
        self.generation += 1;
        self.pending = None;
        self.explanation = None;
        self.result = None;
        self.buffer.reset(&self.problem);
        self.set_stage(Stage::Logic);
        Ok(())
    }

    /// Actions available from the current state.
    #[must_use]
    pub fn available_actions(&self) -> Vec<Action> {
        match self.stage {
            Stage::Question => vec![Action::Start],
            Stage::Logic => vec![Action::Submit, Action::Reset],
            Stage::Verification => {
                let approved = self.result.as_ref().is_some_and(|r| r.approved);
                if self.pending.is_none() && approved {
                    vec![Action::Proceed, Action::Retry, Action::Reset]
                } else {
                    vec![Action::Retry, Action::Reset]
                }
            }
            Stage::Code => Vec::new(),
        }
    }

    // ------------------------------------------------------------------------
    // Editor
    // ------------------------------------------------------------------------

    fn ensure_unlocked(&self) -> Result<()> {
        if self.editor_locked() {
            return Err(GateError::EditorLocked { stage: self.stage });
        }
        Ok(())
    }

    /// Replaces the editor text.
    ///
    /// # Errors
    ///
    /// Returns `GateError::EditorLocked` unless in `Code`.
    pub fn edit_code(&mut self, text: impl Into<String>) -> Result<()> {
        self.ensure_unlocked()?;
        self.buffer.set_text(text);
        self.touch();
        Ok(())
    }

    /// Switches the editor language, replacing the text with its starter code.
    ///
    /// # Errors
    ///
    /// Returns `GateError::EditorLocked` unless in `Code`, or
    /// `GateError::UnknownLanguage`.
    pub fn switch_language(&mut self, language: &str) -> Result<()> {
        self.ensure_unlocked()?;
        self.buffer.switch_language(&self.problem, language)?;
        self.touch();
        Ok(())
    }

    /// Handles the run action.
    ///
    /// # Errors
    ///
    /// Returns `GateError::EditorLocked` unless in `Code`.
    pub fn run_code(&self) -> Result<RunOutput> {
        self.ensure_unlocked()?;
        Ok(RunOutput::unavailable(self.buffer.language()))
    }

    /// A serializable view of the session.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            stage: self.stage,
            editor_locked: self.editor_locked(),
            pending: self.is_pending(),
            generation: self.generation,
            problem_title: self.problem.title.clone(),
            language: self.buffer.language().id.to_string(),
            explanation_length: self.explanation.as_ref().map_or(0, Explanation::len),
            min_explanation_length: self.min_explanation_length,
            result: self.result.clone(),
            available_actions: self.available_actions(),
            attempts: self.attempts,
            started_at: self.started_at,
            updated_at: self.updated_at,
        }
    }
}

/// Serializable view of a [`Session`] for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Current stage.
    pub stage: Stage,
    /// Whether the editor is locked.
    pub editor_locked: bool,
    /// Whether a verification call is unresolved.
    pub pending: bool,
    /// Current generation.
    pub generation: u64,
    /// Problem title.
    pub problem_title: String,
    /// Selected editor language.
    pub language: String,
    /// Trimmed length of the last submitted explanation.
    pub explanation_length: usize,
    /// Minimum explanation length.
    pub min_explanation_length: usize,
    /// Latest verification result.
    pub result: Option<VerificationResult>,
    /// Actions available now.
    pub available_actions: Vec<Action>,
    /// Explanations submitted so far.
    pub attempts: u32,
    /// Session creation time.
    pub started_at: DateTime<Utc>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}
