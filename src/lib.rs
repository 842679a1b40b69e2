// Core modules
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod execution;
pub mod models;
pub mod notify;
pub mod report;
pub mod schedule;
pub mod strategy;

// Re-export commonly used types
pub use api::ExchangeApi;
pub use engine::TradingEngine;
pub use error::{BotError, Result};
pub use models::*;
