//! HTTP-level tests for the Gemini and Ollama backends against wiremock.

use std::sync::Arc;

use cognito_core::{ChatTurn, Error, GenerationBackend};
use cognito_inference::{GeminiBackend, GeminiConfig, LlmRouter, OllamaBackend, RetryPolicy};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gemini(server: &MockServer) -> GeminiBackend {
    GeminiBackend::with_config(GeminiConfig::new("test-key").with_base_url(server.uri()))
        .expect("gemini backend")
}

fn gemini_reply(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
    })
}

#[tokio::test]
async fn test_gemini_generate_sends_expected_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
        .and(query_param("key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [
                {"role": "user", "parts": [{"text": "I had a long day"}]},
                {"role": "model", "parts": [{"text": "Tell me about it"}]}
            ],
            "systemInstruction": {"parts": [{"text": "system"}]},
            "generationConfig": {"maxOutputTokens": 1024}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("What stood out?")))
        .expect(1)
        .mount(&server)
        .await;

    let turns = vec![
        ChatTurn::user("I had a long day"),
        ChatTurn::assistant("Tell me about it"),
    ];
    let reply = gemini(&server).generate("system", &turns).await.unwrap();
    assert_eq!(reply, "What stood out?");
}

#[tokio::test]
async fn test_gemini_429_is_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
        .mount(&server)
        .await;

    let err = gemini(&server)
        .generate("system", &[ChatTurn::user("hi")])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RateLimited(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_gemini_server_error_is_not_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = gemini(&server)
        .generate("system", &[ChatTurn::user("hi")])
        .await
        .unwrap_err();
    match err {
        Error::Inference(msg) => assert!(msg.contains("500") && msg.contains("boom")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_gemini_empty_candidates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .mount(&server)
        .await;

    let err = gemini(&server)
        .generate("system", &[ChatTurn::user("hi")])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Inference(_)));
}

#[tokio::test]
async fn test_ollama_generate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "llama3.2",
            "stream": false,
            "messages": [
                {"role": "system", "content": "system"},
                {"role": "user", "content": "hello"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.2",
            "message": {"role": "assistant", "content": "Hi there"},
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OllamaBackend::with_config(&format!("{}/", server.uri()), "llama3.2").unwrap();
    let reply = backend.generate("system", &[ChatTurn::user("hello")]).await.unwrap();
    assert_eq!(reply, "Hi there");
}

#[tokio::test]
async fn test_ollama_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
        .mount(&server)
        .await;

    let backend = OllamaBackend::with_config(&server.uri(), "missing").unwrap();
    let err = backend.generate("system", &[ChatTurn::user("hello")]).await.unwrap_err();
    match err {
        Error::Inference(msg) => assert!(msg.contains("Ollama returned 404")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_router_retries_gemini_429_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("Recovered")))
        .mount(&server)
        .await;

    let local = OllamaBackend::with_config("http://127.0.0.1:9", "unused").unwrap();
    let router = LlmRouter::new(Some(Arc::new(gemini(&server))), Arc::new(local))
        .with_retry_policy(RetryPolicy::immediate(3));

    let reply = router.chat(&[ChatTurn::user("hi")], false).await.unwrap();
    assert_eq!(reply, "Recovered");
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_router_gives_up_after_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let local = OllamaBackend::with_config("http://127.0.0.1:9", "unused").unwrap();
    let router = LlmRouter::new(Some(Arc::new(gemini(&server))), Arc::new(local))
        .with_retry_policy(RetryPolicy::immediate(3));

    let err = router.refine("## Conversation 1", false).await.unwrap_err();
    match err {
        Error::Inference(msg) => assert!(msg.starts_with("Max retries exceeded")),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}
