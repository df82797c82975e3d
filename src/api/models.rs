//! Model catalog endpoint
//!
//! Serves the static provider catalog; clients use it to populate model
//! pickers. Independent of the pricing table.

use axum::response::Json;
use axum::routing::get;
use axum::Router;
use tally_llm::model_catalog;

async fn list_models() -> Json<serde_json::Value> {
    let mut families = serde_json::Map::new();
    for family in model_catalog() {
        families.insert(
            family.label.to_string(),
            serde_json::to_value(&family.models).unwrap_or_default(),
        );
    }
    Json(serde_json::Value::Object(families))
}

/// Create model catalog routes
pub fn models_routes() -> Router {
    Router::new().route("/api/models", get(list_models))
}
