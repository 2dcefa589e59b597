//! Spendboard Common Library
//!
//! Shared code for the Spendboard services including:
//! - Relational model, the `Store` abstraction and its implementations
//! - Chat-with-data assistant client and SQL vetting
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod assistant;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{MemoryStore, Repository, Store, StoreTransaction};
pub use errors::{AppError, Result};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Label used when an invoice has no vendor
pub const UNKNOWN_VENDOR: &str = "Unknown Vendor";

/// Label used for line items without a ledger account
pub const UNCATEGORIZED: &str = "Uncategorized";
