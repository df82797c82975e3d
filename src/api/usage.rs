//! Usage reporting endpoints

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::{Extension, Router};
use std::sync::Arc;
use tally_usage::UsageReporter;
use tracing::error;

async fn user_usage(
    Extension(reporter): Extension<Arc<UsageReporter>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    match reporter.user_report(&user_id).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            error!(user_id, error = %e, "failed to build user usage report");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn global_stats(Extension(reporter): Extension<Arc<UsageReporter>>) -> impl IntoResponse {
    match reporter.global_report().await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => {
            error!(error = %e, "failed to build global stats");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// Create usage reporting routes
pub fn usage_routes() -> Router {
    Router::new()
        .route("/api/user/:user_id/usage", get(user_usage))
        .route("/api/stats", get(global_stats))
}
