//! Asynchronous driver around the session state machine.
//!
//! The controller owns the session behind a `tokio::sync::Mutex`, runs the
//! single awaited oracle call for each submission and broadcasts events. The
//! lock is never held across the oracle call, so retries and resets issued
//! while a call is in flight are applied immediately and the late result is
//! discarded by generation.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::editor::RunOutput;
use crate::error::{GateError, Result};
use crate::events::{EventBroadcaster, SessionEvent};
use crate::highlight::HighlightedLine;
use crate::problem::Problem;
use crate::session::{Session, SessionSnapshot, VerificationTicket};
use crate::stage::Stage;
use crate::verification::{VerificationClient, VerificationResult};

/// What happened to a submitted explanation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "result", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// The result was applied to the session.
    Applied(VerificationResult),
    /// The result arrived after a retry or reset and was dropped.
    Discarded,
    /// A verification was already in flight; nothing was sent.
    Ignored,
}

impl SubmitOutcome {
    /// The applied result, if any.
    #[must_use]
    pub const fn result(&self) -> Option<&VerificationResult> {
        match self {
            Self::Applied(result) => Some(result),
            Self::Discarded | Self::Ignored => None,
        }
    }
}

/// Read-only view of the editor.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorView {
    /// Selected language id.
    pub language: String,
    /// Buffer contents.
    pub text: String,
    /// Whether edits are rejected.
    pub locked: bool,
    /// Highlighted lines of the buffer.
    pub lines: Vec<HighlightedLine>,
}

/// Drives a [`Session`] and publishes its events.
#[derive(Debug, Clone)]
pub struct StageController {
    session: Arc<Mutex<Session>>,
    verifier: VerificationClient,
    events: EventBroadcaster,
}

impl StageController {
    /// Creates a controller with a default event broadcaster.
    #[must_use]
    pub fn new(session: Session, verifier: VerificationClient) -> Self {
        Self::with_events(session, verifier, EventBroadcaster::default())
    }

    /// Creates a controller publishing to `events`.
    #[must_use]
    pub fn with_events(
        session: Session,
        verifier: VerificationClient,
        events: EventBroadcaster,
    ) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            verifier,
            events,
        }
    }

    /// The event broadcaster.
    #[must_use]
    pub const fn events(&self) -> &EventBroadcaster {
        &self.events
    }

    /// Current session snapshot.
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.session.lock().await.snapshot()
    }

    fn emit_stage_change(&self, from: Stage, to: Stage) {
        if from != to {
            self.events.send(SessionEvent::stage_changed(from, to));
        }
    }

    /// Applies a synchronous transition and broadcasts the stage change.
    async fn transition(
        &self,
        apply: impl FnOnce(&mut Session) -> Result<()>,
    ) -> Result<SessionSnapshot> {
        let mut session = self.session.lock().await;
        let from = session.stage();
        apply(&mut *session)?;
        // Emitted under the lock so event order follows state order
        self.emit_stage_change(from, session.stage());
        Ok(session.snapshot())
    }

    /// `Question -> Logic`.
    ///
    /// # Errors
    ///
    /// Returns `GateError::InvalidStageTransition` outside `Question`.
    pub async fn start(&self) -> Result<SessionSnapshot> {
        self.transition(Session::start).await
    }

    /// `Verification -> Code`.
    ///
    /// # Errors
    ///
    /// Returns `GateError::InvalidStageTransition` without an approved result.
    pub async fn proceed(&self) -> Result<SessionSnapshot> {
        self.transition(Session::proceed).await
    }

    /// `Verification -> Logic`.
    ///
    /// # Errors
    ///
    /// Returns `GateError::InvalidStageTransition` outside `Verification`.
    pub async fn retry(&self) -> Result<SessionSnapshot> {
        self.transition(Session::retry).await
    }

    /// `Logic | Verification -> Logic`, discarding any call in flight.
    ///
    /// # Errors
    ///
    /// Returns `GateError::InvalidStageTransition` from `Question` or `Code`.
    pub async fn reset(&self) -> Result<SessionSnapshot> {
        self.transition(Session::reset).await
    }

    /// Submits an explanation and waits for its verification.
    ///
    /// The stage moves to `Verification` before the oracle is called. A
    /// submission made while another is in flight is ignored without calling
    /// the oracle. Oracle failures are applied as rejected results.
    ///
    /// The call runs on its own task, so dropping the returned future does
    /// not leave the session pending.
    ///
    /// # Errors
    ///
    /// - `GateError::ExplanationTooShort` if the text is too short
    /// - `GateError::InvalidStageTransition` outside `Logic`
    pub async fn submit(&self, text: &str) -> Result<SubmitOutcome> {
        let mut session = self.session.lock().await;
        let from = session.stage();
        let ticket = match session.begin_verification(text) {
            Ok(ticket) => ticket,
            Err(GateError::ConcurrentSubmission { generation }) => {
                debug!(generation, "Ignoring submission while verification is pending");
                return Ok(SubmitOutcome::Ignored);
            }
            Err(e) => return Err(e),
        };
        self.emit_stage_change(from, Stage::Verification);
        self.events
            .send(SessionEvent::verification_started(ticket.generation));
        drop(session);

        let generation = ticket.generation;
        let controller = self.clone();
        let task = tokio::spawn(async move { controller.verify_and_apply(ticket).await });

        match task.await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!(generation, error = %e, "Verification task did not finish");
                let failure =
                    GateError::oracle_payload(format!("verification task did not finish: {e}"));
                Ok(self.apply(generation, Err(failure)).await)
            }
        }
    }

    async fn verify_and_apply(&self, ticket: VerificationTicket) -> SubmitOutcome {
        let outcome = self
            .verifier
            .verify(&ticket.explanation, &ticket.problem)
            .await;
        if let Err(e) = &outcome {
            warn!(error = %e, generation = ticket.generation, "Verification failed; recording rejection");
        }
        self.apply(ticket.generation, outcome).await
    }

    /// Applies a finished verification unless a retry or reset overtook it.
    async fn apply(
        &self,
        generation: u64,
        outcome: Result<VerificationResult>,
    ) -> SubmitOutcome {
        let mut session = self.session.lock().await;
        match session.complete_verification(generation, outcome) {
            Some(result) => {
                info!(
                    generation,
                    score = result.score,
                    approved = result.approved,
                    "Verification result applied"
                );
                self.events.send(SessionEvent::verification_completed(
                    generation,
                    result.clone(),
                ));
                SubmitOutcome::Applied(result)
            }
            None => {
                debug!(generation, current = session.generation(), "Discarding stale verification");
                self.events
                    .send(SessionEvent::verification_discarded(generation));
                SubmitOutcome::Discarded
            }
        }
    }

    /// The problem being worked on.
    pub async fn problem(&self) -> Arc<Problem> {
        Arc::clone(self.session.lock().await.problem())
    }

    /// Current editor contents, highlighted.
    pub async fn editor(&self) -> EditorView {
        let session = self.session.lock().await;
        editor_view(&session)
    }

    /// Replaces the editor text.
    ///
    /// # Errors
    ///
    /// Returns `GateError::EditorLocked` unless in `Code`.
    pub async fn edit_code(&self, text: String) -> Result<EditorView> {
        let mut session = self.session.lock().await;
        session.edit_code(text)?;
        Ok(editor_view(&session))
    }

    /// Switches the editor language.
    ///
    /// # Errors
    ///
    /// Returns `GateError::EditorLocked` unless in `Code`, or
    /// `GateError::UnknownLanguage`.
    pub async fn switch_language(&self, language: &str) -> Result<EditorView> {
        let mut session = self.session.lock().await;
        session.switch_language(language)?;
        Ok(editor_view(&session))
    }

    /// Handles the run action.
    ///
    /// # Errors
    ///
    /// Returns `GateError::EditorLocked` unless in `Code`.
    pub async fn run_code(&self) -> Result<RunOutput> {
        self.session.lock().await.run_code()
    }
}

fn editor_view(session: &Session) -> EditorView {
    let buffer = session.buffer();
    EditorView {
        language: buffer.language().id.to_string(),
        text: buffer.text().to_string(),
        locked: session.editor_locked(),
        lines: buffer.highlight(),
    }
}
