//! Completion gateway - one provider call, one persisted record
//!
//! Invokes the LLM backend once per request (no retries), times the
//! call, prices the token usage, and appends the finalized record to
//! the usage store. The record is written exactly once, after the
//! outcome is known.

use std::sync::Arc;
use std::time::Instant;
use tally_llm::{CompletionRequest, LlmProvider, Message};
use tally_usage::{round_dp, PricingTable, UsageRecord, UsageStore};
use tracing::{error, instrument};

/// One chat submission, after HTTP-level validation
#[derive(Debug, Clone)]
pub struct ChatParams {
    /// Caller-supplied application label
    pub application_id: Option<String>,
    /// Caller-supplied user label
    pub user_id: Option<String>,
    /// Full model identifier, provider prefix included
    pub model: String,
    /// Raw input text
    pub query: String,
}

/// Gateway from validated chat submissions to persisted usage records
pub struct CompletionGateway {
    llm: Arc<dyn LlmProvider>,
    store: UsageStore,
    pricing: PricingTable,
}

impl CompletionGateway {
    /// Create a gateway with the default pricing table
    #[must_use]
    pub fn new(llm: Arc<dyn LlmProvider>, store: UsageStore) -> Self {
        Self {
            llm,
            store,
            pricing: PricingTable::new(),
        }
    }

    /// Submit a chat request and return the finalized record.
    ///
    /// A storage failure while persisting the record is logged but does
    /// not mask the LLM outcome; the record is still returned.
    #[instrument(skip(self, params), fields(model = %params.model))]
    pub async fn submit(&self, params: ChatParams) -> UsageRecord {
        let pending = UsageRecord::pending(
            params.application_id,
            params.user_id,
            &params.model,
            &params.query,
        );

        let request =
            CompletionRequest::new(&params.model).with_message(Message::user(&params.query));

        let start = Instant::now();
        let record = match self.llm.complete(request).await {
            Ok(response) => {
                let response_time = round_dp(start.elapsed().as_secs_f64(), 3);
                let usage = response.usage.unwrap_or_default();
                let cost_usd = self.pricing.compute_cost(
                    &params.model,
                    usage.prompt_tokens,
                    usage.completion_tokens,
                );
                pending.into_success(
                    response.content,
                    response_time,
                    usage.prompt_tokens,
                    usage.completion_tokens,
                    usage.total_tokens,
                    cost_usd,
                )
            }
            Err(e) => pending.into_error(e.to_string()),
        };

        if let Err(e) = self.store.append(&record).await {
            error!(record_id = %record.id, error = %e, "failed to persist usage record");
        }

        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_llm::{CompletionResponse, Error, Result as LlmResult, TokenUsage};
    use tally_usage::RequestStatus;

    /// Succeeds with fixed content and token counts
    struct StubProvider {
        prompt_tokens: u32,
        completion_tokens: u32,
    }

    #[async_trait::async_trait]
    impl LlmProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        async fn complete(&self, request: CompletionRequest) -> LlmResult<CompletionResponse> {
            Ok(CompletionResponse {
                content: "stubbed response".to_string(),
                usage: Some(TokenUsage {
                    prompt_tokens: self.prompt_tokens,
                    completion_tokens: self.completion_tokens,
                    total_tokens: self.prompt_tokens + self.completion_tokens,
                }),
                finish_reason: Some("stop".to_string()),
                model: request.model,
            })
        }
    }

    /// Always fails with the given error
    struct FailingProvider {
        error: fn() -> Error,
    }

    #[async_trait::async_trait]
    impl LlmProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        async fn complete(&self, _request: CompletionRequest) -> LlmResult<CompletionResponse> {
            Err((self.error)())
        }
    }

    fn params(model: &str, user_id: &str) -> ChatParams {
        ChatParams {
            application_id: Some("test-app".to_string()),
            user_id: Some(user_id.to_string()),
            model: model.to_string(),
            query: "hi".to_string(),
        }
    }

    #[tokio::test]
    async fn test_success_is_priced_and_persisted() {
        let store = UsageStore::in_memory().await.unwrap();
        let gateway = CompletionGateway::new(
            Arc::new(StubProvider {
                prompt_tokens: 10,
                completion_tokens: 5,
            }),
            store.clone(),
        );

        let record = gateway.submit(params("gpt-4o-mini", "alice")).await;

        assert_eq!(record.status, RequestStatus::Success);
        assert_eq!(record.response.as_deref(), Some("stubbed response"));
        assert_eq!(record.prompt_tokens, Some(10));
        assert_eq!(record.completion_tokens, Some(5));
        assert_eq!(record.total_tokens, Some(15));
        // (10/1000)*0.00015 + (5/1000)*0.0006, rounded to 6 decimals
        assert_eq!(record.cost_usd, Some(0.000004));
        assert!(record.response_time.is_some());

        let persisted = store.list_by_user("alice").await.unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].id, record.id);
        assert_eq!(persisted[0].status, RequestStatus::Success);
    }

    #[tokio::test]
    async fn test_unknown_model_costs_zero_but_succeeds() {
        let store = UsageStore::in_memory().await.unwrap();
        let gateway = CompletionGateway::new(
            Arc::new(StubProvider {
                prompt_tokens: 100,
                completion_tokens: 50,
            }),
            store.clone(),
        );

        let record = gateway.submit(params("experimental-model", "alice")).await;

        assert_eq!(record.status, RequestStatus::Success);
        assert_eq!(record.cost_usd, Some(0.0));
        assert_eq!(record.total_tokens, Some(150));
    }

    #[tokio::test]
    async fn test_rate_limit_failure_is_recorded() {
        let store = UsageStore::in_memory().await.unwrap();
        let gateway = CompletionGateway::new(
            Arc::new(FailingProvider {
                error: || Error::RateLimit,
            }),
            store.clone(),
        );

        let record = gateway.submit(params("gpt-4o", "alice")).await;

        assert_eq!(record.status, RequestStatus::Error);
        assert_eq!(record.error_message.as_deref(), Some("rate limit exceeded"));
        assert!(record.response.is_none());
        assert!(record.cost_usd.is_none());
        assert!(record.response_time.is_none());

        let persisted = store.list_by_user("alice").await.unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].status, RequestStatus::Error);
    }

    #[tokio::test]
    async fn test_api_error_text_is_carried_through() {
        let store = UsageStore::in_memory().await.unwrap();
        let gateway = CompletionGateway::new(
            Arc::new(FailingProvider {
                error: || Error::Api("model `nope` does not exist".to_string()),
            }),
            store.clone(),
        );

        let record = gateway.submit(params("nope", "alice")).await;
        assert_eq!(record.status, RequestStatus::Error);
        assert!(record
            .error_message
            .as_deref()
            .unwrap()
            .contains("model `nope` does not exist"));
    }

    #[tokio::test]
    async fn test_storage_failure_does_not_mask_outcome() {
        let store = UsageStore::in_memory().await.unwrap();
        store.close().await;

        let gateway = CompletionGateway::new(
            Arc::new(StubProvider {
                prompt_tokens: 10,
                completion_tokens: 5,
            }),
            store,
        );

        let record = gateway.submit(params("gpt-4o-mini", "alice")).await;
        assert_eq!(record.status, RequestStatus::Success);
        assert_eq!(record.response.as_deref(), Some("stubbed response"));
    }

    #[tokio::test]
    async fn test_default_labels_applied() {
        let store = UsageStore::in_memory().await.unwrap();
        let gateway = CompletionGateway::new(
            Arc::new(StubProvider {
                prompt_tokens: 1,
                completion_tokens: 1,
            }),
            store.clone(),
        );

        let record = gateway
            .submit(ChatParams {
                application_id: None,
                user_id: None,
                model: "gpt-4o".to_string(),
                query: "hi".to_string(),
            })
            .await;

        assert_eq!(record.application_id, "unknown");
        assert_eq!(record.user_id, "anonymous");

        let persisted = store.list_by_user("anonymous").await.unwrap();
        assert_eq!(persisted.len(), 1);
    }
}
