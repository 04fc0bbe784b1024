//! GateCode core
//!
//! Syntax highlighting, the explain-before-you-code stage controller, the
//! verification client and the HTTP/WebSocket API that serves them.

pub mod api;
pub mod config;
pub mod controller;
pub mod editor;
pub mod error;
pub mod events;
pub mod highlight;
pub mod language;
pub mod oracle;
pub mod problem;
pub mod session;
pub mod stage;
pub mod verification;

pub use api::{
    create_router, AppState, EditRequest, ErrorResponse, ExplanationRequest, HighlightRequest,
    HighlightResponse, LanguageRequest, LanguageSummary, SubmitResponse,
};
pub use config::{Config, LlmProvider, OracleConfig};
pub use controller::{EditorView, StageController, SubmitOutcome};
pub use editor::{RunOutput, SourceBuffer};
pub use error::{GateError, OracleErrorKind, Result};
pub use events::{EventBroadcaster, SessionEvent};
pub use highlight::{highlight, highlight_line, highlight_lines, HighlightedLine, Span, TokenClass};
pub use language::LanguageProfile;
pub use oracle::{HttpOracle, Oracle};
pub use problem::{Problem, MAX_PROBLEM_SIZE};
pub use session::{Explanation, Session, SessionSnapshot, VerificationTicket};
pub use stage::{Action, Stage};
pub use verification::{
    build_prompt, parse_assessment, RubricBand, VerificationClient, VerificationResult,
    APPROVAL_THRESHOLD,
};
