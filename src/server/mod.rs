//! Server configuration and startup

pub mod config;
pub mod init;

pub use config::AppConfig;
pub use init::{app, run};
