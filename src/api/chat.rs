//! Chat endpoint
//!
//! Validates the request body before any provider call or persistence:
//! a missing or empty `query`/`model` is rejected with 400 and no record
//! is ever created for it. Provider failures come back as 500 with the
//! persisted record's id and error text.

use crate::gateway::{ChatParams, CompletionGateway};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::post;
use axum::{Extension, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tally_usage::{RequestStatus, UsageRecord};
use uuid::Uuid;

/// Chat request body
#[derive(Debug, Deserialize)]
pub struct ChatRequestBody {
    pub application_id: Option<String>,
    pub user_id: Option<String>,
    pub query: Option<String>,
    pub model: Option<String>,
}

/// Successful chat response
#[derive(Debug, Serialize)]
pub struct ChatResponseBody {
    pub request_id: Uuid,
    pub response: String,
    pub metadata: ChatMetadata,
}

/// Request metadata echoed back with a successful response
#[derive(Debug, Serialize)]
pub struct ChatMetadata {
    pub response_time: f64,
    pub tokens: TokenBreakdown,
    pub cost_usd: f64,
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub application_id: String,
    pub user_id: String,
}

/// Token counts of a successful response
#[derive(Debug, Serialize)]
pub struct TokenBreakdown {
    pub prompt: i64,
    pub completion: i64,
    pub total: i64,
}

/// Failed chat response
#[derive(Debug, Serialize)]
pub struct ChatErrorBody {
    pub request_id: Uuid,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn success_body(record: UsageRecord) -> ChatResponseBody {
    ChatResponseBody {
        request_id: record.id,
        response: record.response.unwrap_or_default(),
        metadata: ChatMetadata {
            response_time: record.response_time.unwrap_or_default(),
            tokens: TokenBreakdown {
                prompt: record.prompt_tokens.unwrap_or_default(),
                completion: record.completion_tokens.unwrap_or_default(),
                total: record.total_tokens.unwrap_or_default(),
            },
            cost_usd: record.cost_usd.unwrap_or_default(),
            timestamp: record.timestamp,
            model: record.model,
            application_id: record.application_id,
            user_id: record.user_id,
        },
    }
}

async fn chat(
    Extension(gateway): Extension<Arc<CompletionGateway>>,
    Json(body): Json<ChatRequestBody>,
) -> impl IntoResponse {
    let (Some(model), Some(query)) = (non_empty(body.model), non_empty(body.query)) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "Missing required fields: query and model are required"
            })),
        )
            .into_response();
    };

    let record = gateway
        .submit(ChatParams {
            application_id: body.application_id,
            user_id: body.user_id,
            model,
            query,
        })
        .await;

    match record.status {
        RequestStatus::Success => Json(success_body(record)).into_response(),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ChatErrorBody {
                request_id: record.id,
                error: record.error_message.unwrap_or_default(),
                timestamp: record.timestamp,
            }),
        )
            .into_response(),
    }
}

/// Create chat routes
pub fn chat_routes() -> Router {
    Router::new().route("/api/chat", post(chat))
}
