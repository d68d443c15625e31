//! Stable exit codes for the command line.

/// The run completed. Individual module failures do not change this.
pub const OK: i32 = 0;
/// Setup failed before any module ran (missing dump, bad config, layout or profile errors).
pub const FATAL: i32 = 1;
/// The run was interrupted by Ctrl-C; in-flight modules were killed.
pub const CANCELLED: i32 = 130;
