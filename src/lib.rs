pub mod config;
pub mod db;
pub mod error;

// Scanning and scoring
pub mod analyzer;

// Scheduled monitoring
pub mod notifier;
pub mod optimizer;
pub mod scheduler;

// Outbound services
pub mod completion;
pub mod publishing;

// Accounts
pub mod navigation;
pub mod usage;

// HTTP API
pub mod api;

// Command line
pub mod cli;

// Utilities
pub mod utils;

// Re-exports
pub use analyzer::{Analysis, SeoIssue, SiteAnalyzer};
pub use config::Settings;
pub use error::{Error, Result};
