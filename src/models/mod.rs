//! Data models for Volatile Suite.
//!
//! - [`ModuleCatalog`] / [`ModuleSpec`]: the immutable, ordered table of module categories
//! - [`SuiteConfig`] / [`ToolSettings`]: tool invocation settings and catalog loaded from `volatile_suite.yaml`
//! - [`RunConfig`]: per-run settings built from the command line
//! - [`ModuleResult`] / [`RunSummary`]: what a run produces

pub mod catalog;
pub mod config;
pub mod result;

pub use catalog::{CatalogError, ModuleCatalog, ModuleEntry, ModuleSpec, default_catalog_entries};
pub use config::{RunConfig, SuiteConfig, ToolSettings};
pub use result::{ModuleResult, RunSummary};
