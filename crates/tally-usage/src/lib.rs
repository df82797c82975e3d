//! Tally Usage - request accounting for the tally LLM gateway
//!
//! This crate provides the accounting core:
//! - Pricing: static per-model cost table and cost computation
//! - Record: the per-request usage record written after each attempt
//! - Store: append-only SQLite persistence with aggregation queries
//! - Report: per-user and global report composition

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod pricing;
pub mod record;
pub mod report;
pub mod store;

pub use error::{Error, Result};
pub use pricing::{round_dp, ModelPrice, PricingTable};
pub use record::{RequestStatus, UsageRecord};
pub use report::{ApplicationUsage, ModelUsage, UsageReporter, UserUsageReport};
pub use store::{Dimension, GlobalStats, GroupUsage, UsageStore, UserSummary};
