//! Report - per-user and global report composition
//!
//! Composes store queries into the two public reporting shapes. No
//! caching: every call recomputes from the store, so reads always
//! observe the latest committed writes.

use crate::error::Result;
use crate::pricing::round_dp;
use crate::record::UsageRecord;
use crate::store::{Dimension, GlobalStats, GroupUsage, UsageStore, UserSummary};
use serde::Serialize;

/// Maximum records returned in a per-user report
const RECENT_LIMIT: usize = 50;

/// Per-application row of a user report
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationUsage {
    /// Application label
    pub application_id: String,
    /// Successful requests from this application
    pub request_count: i64,
    /// Total tokens from this application
    pub tokens: i64,
    /// Total cost from this application in USD
    pub cost: f64,
}

/// Per-model row of a user report
#[derive(Debug, Clone, Serialize)]
pub struct ModelUsage {
    /// Model identifier
    pub model: String,
    /// Successful requests against this model
    pub request_count: i64,
    /// Total tokens against this model
    pub tokens: i64,
    /// Total cost against this model in USD
    pub cost: f64,
}

/// Full usage report for one user
#[derive(Debug, Clone, Serialize)]
pub struct UserUsageReport {
    /// The user the report describes
    pub user_id: String,
    /// Success-only totals
    pub summary: UserSummary,
    /// Breakdown by application
    pub usage_by_application: Vec<ApplicationUsage>,
    /// Breakdown by model
    pub usage_by_model: Vec<ModelUsage>,
    /// Most recent records, newest first, capped at 50
    pub recent_requests: Vec<UsageRecord>,
}

/// Composes store queries into report structures
#[derive(Clone)]
pub struct UsageReporter {
    store: UsageStore,
}

impl UsageReporter {
    /// Create a reporter over the given store
    #[must_use]
    pub fn new(store: UsageStore) -> Self {
        Self { store }
    }

    /// Build the report for one user
    pub async fn user_report(&self, user_id: &str) -> Result<UserUsageReport> {
        let mut summary = self.store.aggregate_by_user(user_id).await?;
        summary.total_cost_usd = round_dp(summary.total_cost_usd, 4);
        summary.avg_response_time = round_dp(summary.avg_response_time, 3);

        let usage_by_application = self
            .store
            .aggregate_by_user_grouped_by(user_id, Dimension::Application)
            .await?
            .into_iter()
            .map(|g: GroupUsage| ApplicationUsage {
                application_id: g.key,
                request_count: g.request_count,
                tokens: g.tokens,
                cost: g.cost,
            })
            .collect();

        let usage_by_model = self
            .store
            .aggregate_by_user_grouped_by(user_id, Dimension::Model)
            .await?
            .into_iter()
            .map(|g: GroupUsage| ModelUsage {
                model: g.key,
                request_count: g.request_count,
                tokens: g.tokens,
                cost: g.cost,
            })
            .collect();

        let mut recent_requests = self.store.list_by_user(user_id).await?;
        recent_requests.truncate(RECENT_LIMIT);

        Ok(UserUsageReport {
            user_id: user_id.to_string(),
            summary,
            usage_by_application,
            usage_by_model,
            recent_requests,
        })
    }

    /// Build the global report across all users
    pub async fn global_report(&self) -> Result<GlobalStats> {
        self.store.aggregate_global().await
    }
}
