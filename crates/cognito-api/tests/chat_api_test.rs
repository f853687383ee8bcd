//! Chat, refine and the refine queue over HTTP with mock LLM backends.

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;
use uuid::Uuid;

use cognito_core::{EntryRepository, Error, MessageRole};
use cognito_inference::mock::MockGenerationBackend;
use cognito_inference::{CHAT_SYSTEM_PROMPT, REFINE_SYSTEM_PROMPT};
use common::TestApp;

async fn new_entry(app: &TestApp, cookie: &str) -> Uuid {
    let res = app
        .post("/api/entries", cookie, json!({"date": "2024-12-24"}))
        .await;
    res.body["id"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_chat_starts_conversation_and_persists_both_messages() {
    let app = TestApp::new().await;
    let (user, cookie) = app.sign_in("writer@example.com").await;
    let entry_id = new_entry(&app, &cookie).await;

    let res = app
        .post(
            "/api/chat",
            &cookie,
            json!({"entry_id": entry_id, "message": "Today was long"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["response"], "Cloud reply");
    assert_eq!(res.body["entry_id"], entry_id.to_string());

    let entry = app.db.entries.fetch(user.id, entry_id).await.unwrap().unwrap();
    assert_eq!(entry.conversations.len(), 1);
    let conversation = &entry.conversations[0];
    assert_eq!(res.body["conversation_id"], conversation.id.to_string());
    assert_eq!(conversation.messages.len(), 2);
    assert_eq!(conversation.messages[0].role, MessageRole::User);
    assert_eq!(conversation.messages[0].content, "Today was long");
    assert_eq!(conversation.messages[1].role, MessageRole::Assistant);
    assert_eq!(entry.version, 2);

    let calls = app.cloud.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].system, CHAT_SYSTEM_PROMPT);
    assert_eq!(app.local.call_count(), 0);
}

#[tokio::test]
async fn test_chat_continues_existing_conversation_with_history() {
    let app = TestApp::new().await;
    let (_, cookie) = app.sign_in("writer@example.com").await;
    let entry_id = new_entry(&app, &cookie).await;

    let first = app
        .post("/api/chat", &cookie, json!({"entry_id": entry_id, "message": "one"}))
        .await;
    let conversation_id = first.body["conversation_id"].as_str().unwrap().to_string();

    let second = app
        .post(
            "/api/chat",
            &cookie,
            json!({
                "entry_id": entry_id,
                "conversation_id": conversation_id,
                "message": "two",
                "use_local_model": true
            }),
        )
        .await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.body["response"], "Local reply");
    assert_eq!(second.body["conversation_id"], conversation_id);

    let calls = app.local.calls();
    assert_eq!(calls.len(), 1);
    let contents: Vec<&str> = calls[0].turns.iter().map(|t| t.content.as_str()).collect();
    assert_eq!(contents, vec!["one", "Cloud reply", "two"]);
}

#[tokio::test]
async fn test_chat_unknown_entry_or_conversation_is_404() {
    let app = TestApp::new().await;
    let (_, cookie) = app.sign_in("writer@example.com").await;

    let res = app
        .post(
            "/api/chat",
            &cookie,
            json!({"entry_id": Uuid::new_v4(), "message": "hi"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let entry_id = new_entry(&app, &cookie).await;
    let res = app
        .post(
            "/api/chat",
            &cookie,
            json!({"entry_id": entry_id, "conversation_id": Uuid::new_v4(), "message": "hi"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["error"], "Conversation not found");
}

#[tokio::test]
async fn test_chat_llm_failure_is_503_and_writes_nothing() {
    let app = TestApp::with_backends(
        MockGenerationBackend::new().always_failing("upstream down"),
        MockGenerationBackend::new(),
    )
    .await;
    let (user, cookie) = app.sign_in("writer@example.com").await;
    let entry_id = new_entry(&app, &cookie).await;

    let res = app
        .post("/api/chat", &cookie, json!({"entry_id": entry_id, "message": "hi"}))
        .await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    let error = res.body["error"].as_str().unwrap();
    assert!(error.starts_with("LLM service error"));
    assert!(error.contains("upstream down"));

    let entry = app.db.entries.fetch(user.id, entry_id).await.unwrap().unwrap();
    assert!(entry.conversations.is_empty());
    assert_eq!(entry.version, 1);
}

#[tokio::test]
async fn test_chat_retries_rate_limits() {
    let app = TestApp::with_backends(
        MockGenerationBackend::new()
            .with_fixed_response("After retry")
            .with_failures(vec![
                Error::RateLimited("quota".to_string()),
                Error::RateLimited("quota".to_string()),
            ]),
        MockGenerationBackend::new(),
    )
    .await;
    let (_, cookie) = app.sign_in("writer@example.com").await;
    let entry_id = new_entry(&app, &cookie).await;

    let res = app
        .post("/api/chat", &cookie, json!({"entry_id": entry_id, "message": "hi"}))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["response"], "After retry");
    assert_eq!(app.cloud.call_count(), 3);
}

#[tokio::test]
async fn test_chat_without_cloud_backend_needs_local_model() {
    let app = TestApp::without_cloud().await;
    let (_, cookie) = app.sign_in("writer@example.com").await;
    let entry_id = new_entry(&app, &cookie).await;

    let cloud = app
        .post("/api/chat", &cookie, json!({"entry_id": entry_id, "message": "hi"}))
        .await;
    assert_eq!(cloud.status, StatusCode::SERVICE_UNAVAILABLE);

    let local = app
        .post(
            "/api/chat",
            &cookie,
            json!({"entry_id": entry_id, "message": "hi", "use_local_model": true}),
        )
        .await;
    assert_eq!(local.status, StatusCode::OK);
    assert_eq!(local.body["response"], "Local reply");
}

#[tokio::test]
async fn test_refine_entry() {
    let app = TestApp::with_backends(
        MockGenerationBackend::new().with_fixed_response("A calm, reflective day."),
        MockGenerationBackend::new(),
    )
    .await;
    let (user, cookie) = app.sign_in("writer@example.com").await;
    let entry_id = new_entry(&app, &cookie).await;

    let empty = app
        .post("/api/chat/refine", &cookie, json!({"entry_id": entry_id}))
        .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    app.post("/api/chat", &cookie, json!({"entry_id": entry_id, "message": "hi"}))
        .await;
    let res = app
        .post("/api/chat/refine", &cookie, json!({"entry_id": entry_id}))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["refined_output"], "A calm, reflective day.");

    let calls = app.cloud.calls();
    let refine_call = calls.last().unwrap();
    assert_eq!(refine_call.system, REFINE_SYSTEM_PROMPT);
    assert!(refine_call.turns[0].content.contains("hi"));

    let entry = app.db.entries.fetch(user.id, entry_id).await.unwrap().unwrap();
    assert_eq!(entry.refined_output, "A calm, reflective day.");
}

#[tokio::test]
async fn test_queue_refine_and_status() {
    let app = TestApp::new().await;
    let (_, cookie) = app.sign_in("writer@example.com").await;
    let entry_id = new_entry(&app, &cookie).await;

    let status_uri = format!("/api/chat/refine/status?entry_id={}", entry_id);
    let before = app.get(&status_uri, &cookie).await;
    assert_eq!(before.status, StatusCode::OK);
    assert_eq!(before.body["pending_refine"], false);
    assert_eq!(before.body["refine_status"], "idle");

    let queued = app
        .post("/api/chat/refine/queue", &cookie, json!({"entry_id": entry_id}))
        .await;
    assert_eq!(queued.status, StatusCode::OK);
    assert_eq!(queued.body["queued"], true);

    let again = app
        .post("/api/chat/refine/queue", &cookie, json!({"entry_id": entry_id}))
        .await;
    assert_eq!(again.body["queued"], false);

    let after = app.get(&status_uri, &cookie).await;
    assert_eq!(after.body["pending_refine"], true);
    assert_eq!(after.body["refine_status"], "idle");
    assert!(after.body["refine_error"].is_null());
}

#[tokio::test]
async fn test_queue_refine_unknown_entry_is_404() {
    let app = TestApp::new().await;
    let (_, cookie) = app.sign_in("writer@example.com").await;

    let res = app
        .request(
            Method::POST,
            "/api/chat/refine/queue",
            Some(&cookie),
            Some(json!({"entry_id": Uuid::new_v4()})),
        )
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}
