// Volatile Suite - run a suite of Volatility modules against a memory dump
//
// This is the library crate containing the orchestration core and data structures.
// The binary crate (main.rs) provides the command line entry point.

pub mod cli;
pub mod config;
pub mod exit_codes;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use metrics::RunMetrics;
pub use models::{ModuleCatalog, ModuleResult, ModuleSpec, RunConfig, RunSummary, SuiteConfig};
pub use services::Suite;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "Volatile Suite";
