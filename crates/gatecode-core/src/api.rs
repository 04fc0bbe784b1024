//! HTTP API for the GateCode presentation layer.
//!
//! A browser front end drives the session through these endpoints and follows
//! it live over the `/ws` event stream.
//!
//! # Endpoints
//!
//! - `GET /api/session` - Current session snapshot
//! - `POST /api/session/start` - Leave the question panel
//! - `POST /api/session/explanation` - Submit an explanation for verification
//! - `POST /api/session/proceed` - Unlock the editor after approval
//! - `POST /api/session/retry` - Discard the verification and explain again
//! - `POST /api/session/reset` - Discard the explanation and start it over
//! - `GET /api/problem` - The loaded problem
//! - `GET /api/editor` / `PUT /api/editor` - Read or replace the editor text
//! - `POST /api/editor/language` - Switch the editor language
//! - `POST /api/editor/run` - Run the code (not available)
//! - `POST /api/highlight` - Highlight arbitrary text
//! - `GET /api/languages` - Supported languages
//! - `GET /ws` - Session event stream
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use gatecode_core::{create_router, AppState, Config, HttpOracle, Problem};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let problem = Problem::load(&config.problem)?;
//! let oracle = Arc::new(HttpOracle::from_config(&config.oracle)?);
//! let state = AppState::build(config, problem, oracle)?;
//!
//! let router = create_router(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//! axum::serve(listener, router).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::config::Config;
use crate::controller::{EditorView, StageController, SubmitOutcome};
use crate::editor::RunOutput;
use crate::error::{GateError, Result};
use crate::events::ws_handler;
use crate::highlight::{self, HighlightedLine};
use crate::language;
use crate::oracle::Oracle;
use crate::problem::Problem;
use crate::session::{Session, SessionSnapshot};
use crate::verification::{VerificationClient, VerificationResult};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for the explanation endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ExplanationRequest {
    /// The learner's explanation.
    pub text: String,
}

/// Response body for the explanation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    /// `false` only when the submission was ignored because another was pending.
    pub accepted: bool,
    /// `applied`, `discarded` or `ignored`.
    pub outcome: String,
    /// The applied result, if any.
    pub result: Option<VerificationResult>,
    /// Session state after the submission.
    pub snapshot: SessionSnapshot,
}

/// Request body for `PUT /api/editor`.
#[derive(Debug, Clone, Deserialize)]
pub struct EditRequest {
    /// New editor text.
    pub text: String,
}

/// Request body for the language endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct LanguageRequest {
    /// Language id to switch to.
    pub language: String,
}

/// Request body for the highlight endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct HighlightRequest {
    /// Text to highlight.
    pub text: String,
    /// Language id; unknown or missing ids highlight as plain text.
    #[serde(default)]
    pub language: Option<String>,
}

/// Response body for the highlight endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighlightResponse {
    /// Language the text was highlighted as.
    pub language: String,
    /// One entry per input line.
    pub lines: Vec<HighlightedLine>,
}

/// A supported editor language.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageSummary {
    /// Language id.
    pub id: String,
    /// Name shown in the language picker.
    pub display_name: String,
    /// File extensions mapped to this language.
    pub extensions: Vec<String>,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Configuration the server was started with.
    pub config: Config,
    /// The session controller.
    pub controller: StageController,
}

impl AppState {
    /// Creates state around an existing controller.
    #[must_use]
    pub const fn new(config: Config, controller: StageController) -> Self {
        Self { config, controller }
    }

    /// Builds a fresh session for `problem` backed by `oracle`.
    ///
    /// # Errors
    ///
    /// Returns `GateError::UnknownLanguage` if the configured default language
    /// has no profile.
    pub fn build(config: Config, problem: Problem, oracle: Arc<dyn Oracle>) -> Result<Self> {
        let session = Session::from_config(Arc::new(problem), &config)?;
        let controller = StageController::new(session, VerificationClient::new(oracle));
        Ok(Self::new(config, controller))
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Error type for API handlers.
#[derive(Debug)]
struct ApiError(GateError);

impl From<GateError> for ApiError {
    fn from(e: GateError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            GateError::ExplanationTooShort { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            GateError::ConcurrentSubmission { .. } | GateError::InvalidStageTransition { .. } => {
                StatusCode::CONFLICT
            }
            GateError::EditorLocked { .. } => StatusCode::LOCKED,
            GateError::UnknownLanguage { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(status = status.as_u16(), error = %self.0, "Request rejected");

        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints and the event stream.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/session", get(handle_snapshot))
        .route("/session/start", post(handle_start))
        .route("/session/explanation", post(handle_explanation))
        .route("/session/proceed", post(handle_proceed))
        .route("/session/retry", post(handle_retry))
        .route("/session/reset", post(handle_reset))
        .route("/problem", get(handle_problem))
        .route("/editor", get(handle_editor).put(handle_edit))
        .route("/editor/language", post(handle_language))
        .route("/editor/run", post(handle_run))
        .route("/highlight", post(handle_highlight))
        .route("/languages", get(handle_languages));

    Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

async fn handle_snapshot(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    Json(state.controller.snapshot().await)
}

async fn handle_start(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(state.controller.start().await?))
}

/// Handler for `POST /api/session/explanation`.
///
/// Waits for the oracle before answering; the `/ws` stream reports the
/// pending state in the meantime.
async fn handle_explanation(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExplanationRequest>,
) -> std::result::Result<Json<SubmitResponse>, ApiError> {
    info!(length = request.text.len(), "Received explanation");

    let outcome = state.controller.submit(&request.text).await?;
    let (label, result) = match outcome {
        SubmitOutcome::Applied(result) => ("applied", Some(result)),
        SubmitOutcome::Discarded => ("discarded", None),
        SubmitOutcome::Ignored => ("ignored", None),
    };

    Ok(Json(SubmitResponse {
        accepted: label != "ignored",
        outcome: label.to_string(),
        result,
        snapshot: state.controller.snapshot().await,
    }))
}

async fn handle_proceed(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(state.controller.proceed().await?))
}

async fn handle_retry(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(state.controller.retry().await?))
}

async fn handle_reset(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(state.controller.reset().await?))
}

async fn handle_problem(State(state): State<Arc<AppState>>) -> Json<Problem> {
    Json(state.controller.problem().await.as_ref().clone())
}

async fn handle_editor(State(state): State<Arc<AppState>>) -> Json<EditorView> {
    Json(state.controller.editor().await)
}

async fn handle_edit(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EditRequest>,
) -> std::result::Result<Json<EditorView>, ApiError> {
    Ok(Json(state.controller.edit_code(request.text).await?))
}

async fn handle_language(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LanguageRequest>,
) -> std::result::Result<Json<EditorView>, ApiError> {
    Ok(Json(
        state.controller.switch_language(&request.language).await?,
    ))
}

async fn handle_run(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<RunOutput>, ApiError> {
    Ok(Json(state.controller.run_code().await?))
}

async fn handle_highlight(Json(request): Json<HighlightRequest>) -> Json<HighlightResponse> {
    let profile = language::profile_or_plain(request.language.as_deref().unwrap_or_default());
    Json(HighlightResponse {
        language: profile.id.to_string(),
        lines: highlight::highlight_lines(&request.text, profile.id),
    })
}

async fn handle_languages() -> Json<Vec<LanguageSummary>> {
    Json(
        language::LANGUAGES
            .iter()
            .map(|profile| LanguageSummary {
                id: profile.id.to_string(),
                display_name: profile.display_name.to_string(),
                extensions: profile.extensions.iter().map(|e| (*e).to_string()).collect(),
            })
            .collect(),
    )
}

// ============================================================================
// Tests
// ============================================================================
