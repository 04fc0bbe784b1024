//! Verification of a learner's explanation.
//!
//! The client builds a scoring prompt from the problem and the explanation,
//! hands it to an [`Oracle`], and turns the oracle's JSON answer into a
//! [`VerificationResult`]. Approval is always decided here from the score,
//! never taken from the oracle.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{GateError, Result};
use crate::oracle::Oracle;
use crate::problem::Problem;

/// Minimum score for an explanation to be approved.
pub const APPROVAL_THRESHOLD: u8 = 75;

/// Feedback recorded when the oracle round-trip fails.
pub const FAILURE_FEEDBACK: &str = "verification failed";

// ============================================================================
// Rubric
// ============================================================================

/// A score band of the grading rubric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RubricBand {
    /// Lowest score in the band.
    pub min: u8,
    /// Highest score in the band.
    pub max: u8,
    /// Short label.
    pub label: &'static str,
    /// What an explanation in this band looks like.
    pub criteria: &'static str,
}

/// The grading rubric, highest band first.
pub static RUBRIC: [RubricBand; 5] = [
    RubricBand {
        min: 90,
        max: 100,
        label: "excellent",
        criteria: "complete, correct algorithm with concrete steps, data structures and edge cases",
    },
    RubricBand {
        min: 75,
        max: 89,
        label: "good",
        criteria: "correct approach with concrete steps; minor details or an edge case missing",
    },
    RubricBand {
        min: 50,
        max: 74,
        label: "partial",
        criteria: "right direction but key steps, conditions or data structures are missing",
    },
    RubricBand {
        min: 25,
        max: 49,
        label: "weak",
        criteria: "mostly vague or partly incorrect; restates the problem more than it solves it",
    },
    RubricBand {
        min: 0,
        max: 24,
        label: "insufficient",
        criteria: "no usable plan, off-topic, or too vague to act on",
    },
];

impl RubricBand {
    /// The band a score falls in.
    #[must_use]
    pub fn for_score(score: u8) -> &'static Self {
        RUBRIC
            .iter()
            .find(|band| (band.min..=band.max).contains(&score))
            .unwrap_or(&RUBRIC[0])
    }
}

// ============================================================================
// Result
// ============================================================================

/// Outcome of one verification attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    /// Score from 0 to 100.
    pub score: u8,
    /// Feedback shown to the learner.
    pub feedback: String,
    /// The oracle's reasoning, or the failure cause.
    pub reasoning: String,
    /// `score >= APPROVAL_THRESHOLD`.
    pub approved: bool,
    /// Concepts the explanation did not cover.
    #[serde(default)]
    pub missing_concepts: Vec<String>,
    /// When the result was produced.
    pub verified_at: DateTime<Utc>,
}

impl VerificationResult {
    /// Builds a result from an assessment, deriving approval from the score.
    #[must_use]
    pub fn from_assessment(
        score: u8,
        feedback: impl Into<String>,
        reasoning: impl Into<String>,
        missing_concepts: Vec<String>,
    ) -> Self {
        Self {
            score,
            feedback: feedback.into(),
            reasoning: reasoning.into(),
            approved: score >= APPROVAL_THRESHOLD,
            missing_concepts,
            verified_at: Utc::now(),
        }
    }

    /// The rejected result recorded when verification could not complete.
    #[must_use]
    pub fn failed(cause: &GateError) -> Self {
        Self::from_assessment(0, FAILURE_FEEDBACK, cause.to_string(), Vec::new())
    }

    /// Whether this result records a failed round-trip rather than a real score.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.score == 0 && self.feedback == FAILURE_FEEDBACK
    }

    /// The rubric band of the score.
    #[must_use]
    pub fn band(&self) -> &'static RubricBand {
        RubricBand::for_score(self.score)
    }
}

// ============================================================================
// Prompt
// ============================================================================

/// Builds the scoring prompt for an explanation of `problem`.
#[must_use]
pub fn build_prompt(explanation: &str, problem: &Problem) -> String {
    let mut prompt = String::with_capacity(2048 + explanation.len() + problem.description.len());

    prompt.push_str(
        "You are a strict programming instructor. A learner must explain their solution \
         in plain language before they are allowed to write any code. Grade the \
         explanation below.\n\n",
    );

    let _ = writeln!(prompt, "Problem: {}", problem.title);
    let _ = writeln!(prompt, "Description:\n{}\n", problem.description.trim());
    if problem.hints.is_empty() {
        prompt.push_str("Hints: none\n\n");
    } else {
        prompt.push_str("Hints:\n");
        for hint in &problem.hints {
            let _ = writeln!(prompt, "- {hint}");
        }
        prompt.push('\n');
    }

    let _ = writeln!(
        prompt,
        "Learner's explanation:\n\"\"\"\n{}\n\"\"\"\n",
        explanation.trim()
    );

    prompt.push_str("Score the explanation from 0 to 100 using this rubric:\n");
    for band in &RUBRIC {
        let _ = writeln!(
            prompt,
            "- {}-{} ({}): {}",
            band.min, band.max, band.label, band.criteria
        );
    }

    let _ = write!(
        prompt,
        "\nBe strict. Explanations that are vague or generic, such as \"I will loop \
         through the input and solve it\", must score below 50 no matter how confident \
         they sound. Only concrete steps, data structures and conditions earn points. \
         A score of {APPROVAL_THRESHOLD} or more means the learner may start coding.\n\n"
    );

    prompt.push_str(
        "Respond with a single JSON object and nothing else, in this shape:\n\
         {\"score\": <integer 0-100>, \"feedback\": \"<one or two sentences for the learner>\", \
         \"reasoning\": \"<why this score>\", \"missingConcepts\": [\"<concept>\"]}\n",
    );

    prompt
}

// ============================================================================
// Parsing
// ============================================================================

/// Removes a surrounding Markdown code fence, if any, and trims the text.
#[must_use]
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // skip the info string (`json`) on the opening line
    let body = rest.find('\n').map_or(rest, |i| &rest[i + 1..]);
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Narrows oracle text to the JSON object it most likely contains.
fn json_candidate(text: &str) -> &str {
    let stripped = strip_code_fence(text);
    if stripped.starts_with('{') && stripped.ends_with('}') {
        return stripped;
    }
    match (stripped.find('{'), stripped.rfind('}')) {
        (Some(open), Some(close)) if close > open => &stripped[open..=close],
        _ => stripped,
    }
}

/// Parses the oracle's answer into a result.
///
/// The answer may be wrapped in a code fence or surrounded by prose. Any
/// `approved` field in the answer is ignored.
///
/// # Errors
///
/// Returns `GateError::OraclePayload` if the answer is not a JSON object,
/// lacks `score`, `feedback` or `reasoning`, or has a score outside 0..=100.
pub fn parse_assessment(text: &str) -> Result<VerificationResult> {
    let candidate = json_candidate(text);
    let value: Value = serde_json::from_str(candidate)
        .map_err(|e| GateError::oracle_payload(format!("answer is not valid JSON: {e}")))?;
    let mut fields = match value {
        Value::Object(fields) => fields,
        other => {
            return Err(GateError::oracle_payload(format!(
                "answer is not a JSON object: {other}"
            )))
        }
    };

    let score = parse_score(fields.remove("score"))?;
    let feedback = required_text(fields.remove("feedback"), "feedback")?;
    let reasoning = required_text(fields.remove("reasoning"), "reasoning")?;
    let missing_concepts = fields
        .remove("missingConcepts")
        .or_else(|| fields.remove("missing_concepts"))
        .as_ref()
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(VerificationResult::from_assessment(
        score,
        feedback,
        reasoning,
        missing_concepts,
    ))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_score(value: Option<Value>) -> Result<u8> {
    let value = value.ok_or_else(|| GateError::oracle_payload("missing required field 'score'"))?;
    let number = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
    .ok_or_else(|| GateError::oracle_payload(format!("score is not a number: {value}")))?;

    if !(0.0..=100.0).contains(&number) {
        return Err(GateError::oracle_payload(format!(
            "score {number} is outside 0..=100"
        )));
    }
    // Truncate so a fractional score never crosses the approval threshold
    Ok(number.floor() as u8)
}

fn required_text(value: Option<Value>, field: &str) -> Result<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) => Err(GateError::oracle_payload(format!(
            "field '{field}' is empty"
        ))),
        Some(other) => Err(GateError::oracle_payload(format!(
            "field '{field}' is not a string: {other}"
        ))),
        None => Err(GateError::oracle_payload(format!(
            "missing required field '{field}'"
        ))),
    }
}

// ============================================================================
// Client
// ============================================================================

/// Sends explanations to the oracle and interprets the answers.
#[derive(Debug, Clone)]
pub struct VerificationClient {
    oracle: Arc<dyn Oracle>,
}

impl VerificationClient {
    /// Creates a client backed by `oracle`.
    #[must_use]
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self { oracle }
    }

    /// Scores `explanation` against `problem`.
    ///
    /// # Errors
    ///
    /// Returns `GateError::OracleTransport` if the oracle cannot be reached
    /// and `GateError::OraclePayload` if its answer is unusable.
    pub async fn verify(&self, explanation: &str, problem: &Problem) -> Result<VerificationResult> {
        let prompt = build_prompt(explanation, problem);
        debug!(
            problem = %problem.title,
            explanation_len = explanation.len(),
            "Requesting verification"
        );

        let answer = self.oracle.complete(&prompt).await?;
        let result = parse_assessment(&answer)?;

        info!(
            score = result.score,
            approved = result.approved,
            band = result.band().label,
            "Verification complete"
        );
        Ok(result)
    }
}
