//! Web API module for tally
//!
//! Provides the REST endpoints:
//! - `POST /api/chat` — submit a chat request
//! - `GET /api/models` — static model catalog
//! - `GET /api/user/{user_id}/usage` — per-user usage report
//! - `GET /api/stats` — global usage statistics
//! - `GET /health` — liveness check

pub mod chat;
pub mod health;
pub mod models;
pub mod usage;

#[cfg(test)]
mod tests;

pub use chat::chat_routes;
pub use health::health_routes;
pub use models::models_routes;
pub use usage::usage_routes;
