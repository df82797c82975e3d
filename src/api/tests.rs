//! Handler tests over the assembled router

use crate::gateway::CompletionGateway;
use crate::server::app;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use std::sync::Arc;
use tally_llm::{
    CompletionRequest, CompletionResponse, Error as LlmError, LlmProvider, Result as LlmResult,
    TokenUsage,
};
use tally_usage::{UsageReporter, UsageStore};
use tower::ServiceExt;

struct StubProvider;

#[async_trait::async_trait]
impl LlmProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn complete(&self, request: CompletionRequest) -> LlmResult<CompletionResponse> {
        Ok(CompletionResponse {
            content: "stubbed response".to_string(),
            usage: Some(TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            finish_reason: Some("stop".to_string()),
            model: request.model,
        })
    }
}

struct RateLimitedProvider;

#[async_trait::async_trait]
impl LlmProvider for RateLimitedProvider {
    fn name(&self) -> &str {
        "rate-limited"
    }

    async fn complete(&self, _request: CompletionRequest) -> LlmResult<CompletionResponse> {
        Err(LlmError::RateLimit)
    }
}

async fn test_app(provider: Arc<dyn LlmProvider>) -> (Router, UsageStore) {
    let store = UsageStore::in_memory().await.unwrap();
    let gateway = Arc::new(CompletionGateway::new(provider, store.clone()));
    let reporter = Arc::new(UsageReporter::new(store.clone()));
    (app(gateway, reporter), store)
}

async fn send_json(router: Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, serde_json::Value) {
    let request = match body {
        Some(json) => Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_chat_success_shape() {
    let (router, store) = test_app(Arc::new(StubProvider)).await;

    let (status, body) = send_json(
        router,
        "POST",
        "/api/chat",
        Some(r#"{"application_id":"web-ui","user_id":"alice","query":"hi","model":"gpt-4o-mini"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "stubbed response");
    assert!(body["request_id"].is_string());

    let metadata = &body["metadata"];
    assert_eq!(metadata["tokens"]["prompt"], 10);
    assert_eq!(metadata["tokens"]["completion"], 5);
    assert_eq!(metadata["tokens"]["total"], 15);
    assert_eq!(metadata["cost_usd"], 0.000004);
    assert_eq!(metadata["model"], "gpt-4o-mini");
    assert_eq!(metadata["application_id"], "web-ui");
    assert_eq!(metadata["user_id"], "alice");
    assert!(metadata["timestamp"].is_string());

    let persisted = store.list_by_user("alice").await.unwrap();
    assert_eq!(persisted.len(), 1);
}

#[tokio::test]
async fn test_chat_missing_fields_rejected_before_persistence() {
    for body in [
        r#"{}"#,
        r#"{"query":"hi"}"#,
        r#"{"model":"gpt-4o"}"#,
        r#"{"query":"hi","model":""}"#,
        r#"{"query":"","model":"gpt-4o"}"#,
    ] {
        let (router, store) = test_app(Arc::new(StubProvider)).await;
        let (status, response) = send_json(router, "POST", "/api/chat", Some(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
        assert_eq!(
            response["error"],
            "Missing required fields: query and model are required"
        );

        let stats = store.aggregate_global().await.unwrap();
        assert_eq!(stats.total_requests, 0);
        assert!(store.list_by_user("anonymous").await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_chat_provider_failure_returns_500_with_text() {
    let (router, store) = test_app(Arc::new(RateLimitedProvider)).await;

    let (status, body) = send_json(
        router,
        "POST",
        "/api/chat",
        Some(r#"{"user_id":"alice","query":"hi","model":"gpt-4o"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "rate limit exceeded");
    assert!(body["request_id"].is_string());
    assert!(body["timestamp"].is_string());

    // The failure is persisted as an error record
    let persisted = store.list_by_user("alice").await.unwrap();
    assert_eq!(persisted.len(), 1);
    assert_eq!(
        persisted[0].error_message.as_deref(),
        Some("rate limit exceeded")
    );
}

#[tokio::test]
async fn test_user_usage_report_shape_and_idempotence() {
    let (router, _store) = test_app(Arc::new(StubProvider)).await;

    let (status, _) = send_json(
        router.clone(),
        "POST",
        "/api/chat",
        Some(r#"{"user_id":"alice","query":"hi","model":"gpt-4o-mini"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, first) = send_json(router.clone(), "GET", "/api/user/alice/usage", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["user_id"], "alice");
    assert_eq!(first["summary"]["total_requests"], 1);
    assert_eq!(first["summary"]["total_tokens"], 15);
    assert_eq!(first["usage_by_application"][0]["application_id"], "unknown");
    assert_eq!(first["usage_by_model"][0]["model"], "gpt-4o-mini");
    assert_eq!(first["recent_requests"].as_array().unwrap().len(), 1);

    // No intervening writes: identical summary numbers
    let (_, second) = send_json(router, "GET", "/api/user/alice/usage", None).await;
    assert_eq!(first["summary"], second["summary"]);
}

#[tokio::test]
async fn test_global_stats_counts_successes_across_users() {
    let (router, _store) = test_app(Arc::new(StubProvider)).await;

    for user in ["alice", "bob"] {
        let body = format!(r#"{{"user_id":"{user}","query":"hi","model":"gpt-4o-mini"}}"#);
        let (status, _) = send_json(router.clone(), "POST", "/api/chat", Some(&body)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, stats) = send_json(router, "GET", "/api/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_requests"], 2);
    assert_eq!(stats["unique_users"], 2);
    assert_eq!(stats["unique_apps"], 1);
    assert_eq!(stats["total_tokens"], 30);
}

#[tokio::test]
async fn test_models_catalog() {
    let (router, _store) = test_app(Arc::new(StubProvider)).await;

    let (status, body) = send_json(router, "GET", "/api/models", None).await;
    assert_eq!(status, StatusCode::OK);

    for family in ["OpenAI", "Anthropic", "Google Gemini", "Groq"] {
        assert!(body[family].is_array(), "missing family {family}");
    }
    let openai = body["OpenAI"].as_array().unwrap();
    assert!(openai.iter().any(|m| m["id"] == "gpt-4o"));
    assert!(openai.iter().all(|m| m["provider"] == "openai"));
}

#[tokio::test]
async fn test_health() {
    let (router, _store) = test_app(Arc::new(StubProvider)).await;

    let (status, body) = send_json(router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "tally");
    assert!(body["timestamp"].is_string());
}
