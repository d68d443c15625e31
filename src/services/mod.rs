//! Services module - the module-execution orchestration core.
//!
//! Everything here is free of CLI concerns: all inputs arrive as explicit
//! parameters ([`RunConfig`](crate::models::RunConfig),
//! [`SuiteConfig`](crate::models::SuiteConfig), a cancellation receiver).
//!
//! # Components
//!
//! - [`ProfileResolver`]: runs the tool's discovery module and extracts the first
//!   suggested profile
//! - [`OutputLayout`]: recreates the output tree and computes every artifact path
//! - [`ToolCommand`]: structured program + argument construction for each module
//! - [`Dispatcher`]: bounded concurrent execution with cancellation and banner-aware
//!   failure classification
//! - [`ResultRecorder`]: console status lines, per-module error files, metrics
//! - [`Suite`]: the end-to-end workflow
//!
//! # Usage Example
//!
//! ```ignore
//! use volatile_suite::services::Suite;
//!
//! let suite = Suite::new(config_manager.load_suite_config()?);
//! let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
//! let summary = suite.run(&run_config, metrics, cancel_rx).await?;
//! println!("{}", summary.summary_line());
//! ```

pub mod command;
pub mod dispatcher;
pub mod layout;
pub mod profile;
pub mod recorder;
pub mod suite;

pub use command::{ModuleInvocation, ToolCommand};
pub use dispatcher::{BannerFilter, DispatchOutcome, Dispatcher, InvocationError, ResultSink};
pub use layout::{LayoutError, OutputLayout, category_slug};
pub use profile::{ProfileError, ProfileResolver, ResolvedProfile};
pub use recorder::ResultRecorder;
pub use suite::{SetupError, Suite};
