//! Record - the per-request usage record
//!
//! One record describes a single chat request attempt and its outcome.
//! A record is built in memory as `pending`, finalized exactly once into
//! `success` or `error`, and only then written to the store. Finalized
//! records are immutable; the store has no update or delete path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Application label used when the caller supplies none
pub const DEFAULT_APPLICATION_ID: &str = "unknown";

/// User label used when the caller supplies none
pub const DEFAULT_USER_ID: &str = "anonymous";

/// Outcome of a request attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// In-memory only; never persisted
    Pending,
    /// Completed with a model response
    Success,
    /// The provider call failed
    Error,
}

impl RequestStatus {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    /// Parse the persisted representation
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// A single persisted request/response record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Unique request id, generated at request time
    pub id: Uuid,
    /// Caller-supplied application label
    pub application_id: String,
    /// Caller-supplied user label
    pub user_id: String,
    /// Full model identifier, provider prefix included
    pub model: String,
    /// Raw input text
    pub query: String,
    /// Generated text, success only
    pub response: Option<String>,
    /// Elapsed seconds, rounded to 3 decimals, success only
    pub response_time: Option<f64>,
    /// Prompt token count, success only
    pub prompt_tokens: Option<i64>,
    /// Completion token count, success only
    pub completion_tokens: Option<i64>,
    /// Total token count, success only
    pub total_tokens: Option<i64>,
    /// Cost in USD rounded to 6 decimals, success only; 0.0 for unpriced models
    pub cost_usd: Option<f64>,
    /// Creation time, set once
    pub timestamp: DateTime<Utc>,
    /// Request outcome
    pub status: RequestStatus,
    /// Failure text, error only
    pub error_message: Option<String>,
}

impl UsageRecord {
    /// Create a pending record for a new request attempt.
    ///
    /// Missing caller labels fall back to the sentinel defaults.
    #[must_use]
    pub fn pending(
        application_id: Option<String>,
        user_id: Option<String>,
        model: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            application_id: application_id
                .unwrap_or_else(|| DEFAULT_APPLICATION_ID.to_string()),
            user_id: user_id.unwrap_or_else(|| DEFAULT_USER_ID.to_string()),
            model: model.into(),
            query: query.into(),
            response: None,
            response_time: None,
            prompt_tokens: None,
            completion_tokens: None,
            total_tokens: None,
            cost_usd: None,
            timestamp: Utc::now(),
            status: RequestStatus::Pending,
            error_message: None,
        }
    }

    /// Finalize as a success record
    #[must_use]
    pub fn into_success(
        mut self,
        response: impl Into<String>,
        response_time: f64,
        prompt_tokens: u32,
        completion_tokens: u32,
        total_tokens: u32,
        cost_usd: f64,
    ) -> Self {
        self.response = Some(response.into());
        self.response_time = Some(response_time);
        self.prompt_tokens = Some(i64::from(prompt_tokens));
        self.completion_tokens = Some(i64::from(completion_tokens));
        self.total_tokens = Some(i64::from(total_tokens));
        self.cost_usd = Some(cost_usd);
        self.status = RequestStatus::Success;
        self
    }

    /// Finalize as an error record
    #[must_use]
    pub fn into_error(mut self, error_message: impl Into<String>) -> Self {
        self.error_message = Some(error_message.into());
        self.status = RequestStatus::Error;
        self
    }
}
