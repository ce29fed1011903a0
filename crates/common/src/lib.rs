//! Papertrail Common Library
//!
//! Shared code for the Papertrail services including:
//! - Database models and repository patterns
//! - The reviewer assignment allocator
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Upload storage
//! - Metrics and observability

pub mod allocator;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod storage;

// Re-export commonly used types
pub use allocator::{AllocationError, Allocator, MAX_REVIEWERS_PER_PAPER};
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
