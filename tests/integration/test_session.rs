//! End-to-end tests for the session API against a mock scoring oracle.

mod common;

use std::time::Duration;

use common::{
    fixture_path, spawn_app, spawn_mock_oracle, unreachable_endpoint, ApiClient, MockReply,
    GOOD_EXPLANATION,
};
use gatecode_core::{Config, Problem};
use serde_json::json;

// ============================================================================
// Fixtures
// ============================================================================

#[test]
fn test_fixtures_load() {
    let config = Config::load_from_file(&fixture_path("gatecode.json")).unwrap();
    assert_eq!(config.min_explanation_length, 40);
    assert_eq!(config.oracle.api_key_env, "GATECODE_TEST_API_KEY");

    let problem = Problem::load(fixture_path("problem.json")).unwrap();
    assert_eq!(problem.title, "Two Sum");
    assert_eq!(problem.hints.len(), 2);
    assert!(problem.starter_code.contains_key("python"));
}

#[tokio::test]
async fn test_initial_snapshot() {
    let (endpoint, _mock) = spawn_mock_oracle(MockReply::Score(90), Duration::ZERO).await;
    let client = ApiClient::new(&spawn_app(&endpoint).await);

    let (status, snapshot) = client.get("/api/session").await;
    assert_eq!(status, 200);
    assert_eq!(snapshot["stage"], "question");
    assert_eq!(snapshot["editorLocked"], true);
    assert_eq!(snapshot["problemTitle"], "Two Sum");
    assert_eq!(snapshot["minExplanationLength"], 40);
    assert_eq!(snapshot["availableActions"], json!(["start"]));

    let (status, problem) = client.get("/api/problem").await;
    assert_eq!(status, 200);
    assert_eq!(problem["title"], "Two Sum");
}

// ============================================================================
// Gate
// ============================================================================

#[tokio::test]
async fn test_short_explanation_never_reaches_oracle() {
    let (endpoint, mock) = spawn_mock_oracle(MockReply::Score(90), Duration::ZERO).await;
    let client = ApiClient::new(&spawn_app(&endpoint).await);

    client.post("/api/session/start", None).await;

    let (status, body) = client.submit("").await;
    assert_eq!(status, 422);
    assert!(body["error"].as_str().unwrap().contains("40"));

    let (status, _) = client.submit("use a map").await;
    assert_eq!(status, 422);

    let (_, snapshot) = client.get("/api/session").await;
    assert_eq!(snapshot["stage"], "logic");
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn test_approved_explanation_unlocks_editor() {
    let (endpoint, mock) = spawn_mock_oracle(MockReply::Score(82), Duration::ZERO).await;
    let client = ApiClient::new(&spawn_app(&endpoint).await);

    client.post("/api/session/start", None).await;
    let (status, _) = client
        .put("/api/editor", json!({ "text": "print(1)" }))
        .await;
    assert_eq!(status, 423);

    let (status, body) = client.submit(GOOD_EXPLANATION).await;
    assert_eq!(status, 200);
    assert_eq!(body["accepted"], true);
    assert_eq!(body["outcome"], "applied");
    assert_eq!(body["result"]["score"], 82);
    assert_eq!(body["result"]["approved"], true);
    assert_eq!(body["result"]["feedback"], "Scored 82");
    assert_eq!(body["result"]["missingConcepts"], json!(["duplicates"]));
    assert_eq!(body["snapshot"]["stage"], "verification");
    assert_eq!(
        body["snapshot"]["availableActions"],
        json!(["proceed", "retry", "reset"])
    );

    // Still locked until the user proceeds.
    let (status, _) = client
        .put("/api/editor", json!({ "text": "print(1)" }))
        .await;
    assert_eq!(status, 423);

    let (status, snapshot) = client.post("/api/session/proceed", None).await;
    assert_eq!(status, 200);
    assert_eq!(snapshot["stage"], "code");
    assert_eq!(snapshot["editorLocked"], false);

    let (status, editor) = client
        .put("/api/editor", json!({ "text": "def two_sum(nums, target):\n    pass" }))
        .await;
    assert_eq!(status, 200);
    assert_eq!(editor["locked"], false);
    assert_eq!(editor["lines"].as_array().unwrap().len(), 2);

    assert_eq!(mock.calls(), 1);
    assert_eq!(mock.api_keys(), vec!["test-key".to_string()]);
    let prompts = mock.prompts();
    assert!(prompts[0].contains("Two Sum"));
    assert!(prompts[0].contains("hash map"));
}

#[tokio::test]
async fn test_rejected_explanation_blocks_proceed() {
    let (endpoint, mock) = spawn_mock_oracle(MockReply::Score(40), Duration::ZERO).await;
    let client = ApiClient::new(&spawn_app(&endpoint).await);

    client.post("/api/session/start", None).await;
    let (_, body) = client.submit(GOOD_EXPLANATION).await;
    assert_eq!(body["result"]["approved"], false);
    assert_eq!(
        body["snapshot"]["availableActions"],
        json!(["retry", "reset"])
    );

    let (status, _) = client.post("/api/session/proceed", None).await;
    assert_eq!(status, 409);

    let (status, snapshot) = client.post("/api/session/retry", None).await;
    assert_eq!(status, 200);
    assert_eq!(snapshot["stage"], "logic");
    assert!(snapshot["result"].is_null());

    mock.set_reply(MockReply::Score(95));
    let (_, body) = client.submit(GOOD_EXPLANATION).await;
    assert_eq!(body["result"]["approved"], true);
    assert_eq!(body["snapshot"]["attempts"], 2);
    assert_eq!(mock.calls(), 2);
}

#[tokio::test]
async fn test_reset_discards_verification() {
    let (endpoint, mock) = spawn_mock_oracle(MockReply::Score(88), Duration::ZERO).await;
    let client = ApiClient::new(&spawn_app(&endpoint).await);

    let (status, _) = client.post("/api/session/reset", None).await;
    assert_eq!(status, 409);

    client.post("/api/session/start", None).await;
    client.submit(GOOD_EXPLANATION).await;

    let (status, snapshot) = client.post("/api/session/reset", None).await;
    assert_eq!(status, 200);
    assert_eq!(snapshot["stage"], "logic");
    assert!(snapshot["result"].is_null());

    let (status, _) = client.post("/api/session/proceed", None).await;
    assert_eq!(status, 409);
    assert_eq!(mock.calls(), 1);
}

#[tokio::test]
async fn test_code_stage_is_terminal() {
    let (endpoint, _mock) = spawn_mock_oracle(MockReply::Score(88), Duration::ZERO).await;
    let client = ApiClient::new(&spawn_app(&endpoint).await);

    client.post("/api/session/start", None).await;
    client.submit(GOOD_EXPLANATION).await;
    let (_, snapshot) = client.post("/api/session/proceed", None).await;
    assert_eq!(snapshot["availableActions"], json!([]));
    client
        .put("/api/editor", json!({ "text": "scratch" }))
        .await;

    for action in ["reset", "retry", "start"] {
        let (status, _) = client
            .post(&format!("/api/session/{action}"), None)
            .await;
        assert_eq!(status, 409, "{action} should be rejected in code");
    }

    let (_, editor) = client.get("/api/editor").await;
    assert_eq!(editor["locked"], false);
    assert_eq!(editor["text"], "scratch");
}

// ============================================================================
// Oracle failures
// ============================================================================

#[tokio::test]
async fn test_unreachable_oracle_records_failed_result() {
    let endpoint = unreachable_endpoint().await;
    let client = ApiClient::new(&spawn_app(&endpoint).await);

    client.post("/api/session/start", None).await;
    let (status, body) = client.submit(GOOD_EXPLANATION).await;
    assert_eq!(status, 200);
    assert_eq!(body["outcome"], "applied");
    assert_eq!(body["result"]["score"], 0);
    assert_eq!(body["result"]["approved"], false);
    assert_eq!(body["result"]["feedback"], "verification failed");
    assert_eq!(body["snapshot"]["stage"], "verification");
}

#[tokio::test]
async fn test_malformed_answer_records_failed_result() {
    let (endpoint, mock) = spawn_mock_oracle(
        MockReply::Text("I think this is a pretty good answer".to_string()),
        Duration::ZERO,
    )
    .await;
    let client = ApiClient::new(&spawn_app(&endpoint).await);

    client.post("/api/session/start", None).await;
    let (_, body) = client.submit(GOOD_EXPLANATION).await;
    assert_eq!(body["result"]["score"], 0);
    assert_eq!(body["result"]["feedback"], "verification failed");

    client.post("/api/session/retry", None).await;
    mock.set_reply(MockReply::Status(500));
    let (_, body) = client.submit(GOOD_EXPLANATION).await;
    assert_eq!(body["result"]["score"], 0);
    assert_eq!(body["result"]["approved"], false);
    assert_eq!(mock.calls(), 2);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
async fn test_second_submit_while_pending_is_ignored() {
    let (endpoint, mock) =
        spawn_mock_oracle(MockReply::Score(80), Duration::from_millis(500)).await;
    let base = spawn_app(&endpoint).await;
    let client = ApiClient::new(&base);

    client.post("/api/session/start", None).await;

    let first = {
        let client = client.clone();
        tokio::spawn(async move { client.submit(GOOD_EXPLANATION).await })
    };

    while mock.calls() == 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let (status, body) = client.submit(GOOD_EXPLANATION).await;
    assert_eq!(status, 200);
    assert_eq!(body["accepted"], false);
    assert_eq!(body["outcome"], "ignored");
    assert_eq!(body["snapshot"]["pending"], true);

    let (status, body) = first.await.unwrap();
    assert_eq!(status, 200);
    assert_eq!(body["outcome"], "applied");
    assert_eq!(body["result"]["score"], 80);
    assert_eq!(mock.calls(), 1);
}

#[tokio::test]
async fn test_retry_while_pending_discards_late_result() {
    let (endpoint, mock) =
        spawn_mock_oracle(MockReply::Score(99), Duration::from_millis(300)).await;
    let client = ApiClient::new(&spawn_app(&endpoint).await);

    client.post("/api/session/start", None).await;

    let first = {
        let client = client.clone();
        tokio::spawn(async move { client.submit(GOOD_EXPLANATION).await })
    };

    while mock.calls() == 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let (status, snapshot) = client.post("/api/session/retry", None).await;
    assert_eq!(status, 200);
    assert_eq!(snapshot["stage"], "logic");

    let (_, body) = first.await.unwrap();
    assert_eq!(body["accepted"], true);
    assert_eq!(body["outcome"], "discarded");
    assert!(body["result"].is_null());
    assert_eq!(body["snapshot"]["stage"], "logic");
    assert!(body["snapshot"]["result"].is_null());
}

// ============================================================================
// Highlighting
// ============================================================================

#[tokio::test]
async fn test_highlight_and_languages_endpoints() {
    let (endpoint, _mock) = spawn_mock_oracle(MockReply::Score(90), Duration::ZERO).await;
    let client = ApiClient::new(&spawn_app(&endpoint).await);

    let (status, languages) = client.get("/api/languages").await;
    assert_eq!(status, 200);
    let ids: Vec<&str> = languages
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"python"));
    assert!(ids.contains(&"javascript"));

    let (status, body) = client
        .post(
            "/api/highlight",
            Some(json!({ "text": "x = 1 # one", "language": "python" })),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["language"], "python");
    let classes: Vec<&str> = body["lines"][0]["spans"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["class"].as_str().unwrap())
        .collect();
    assert!(classes.contains(&"number"));
    assert!(classes.contains(&"comment"));
}
