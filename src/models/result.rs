use super::catalog::ModuleSpec;
use std::time::Duration;

/// Outcome of one completed module invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleResult {
    pub module: ModuleSpec,
    pub succeeded: bool,

    /// Error stream lines with banner noise removed. Empty on success.
    pub error_lines: Vec<String>,

    /// Recorded for diagnostics only; classification ignores it
    pub exit_code: Option<i32>,

    pub duration: Duration,
}

impl ModuleResult {
    pub fn success(module: ModuleSpec, exit_code: Option<i32>, duration: Duration) -> Self {
        Self {
            module,
            succeeded: true,
            error_lines: Vec::new(),
            exit_code,
            duration,
        }
    }

    pub fn failure(
        module: ModuleSpec,
        error_lines: Vec<String>,
        exit_code: Option<i32>,
        duration: Duration,
    ) -> Self {
        Self {
            module,
            succeeded: false,
            error_lines,
            exit_code,
            duration,
        }
    }
}

/// Final tally of a suite run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub profile: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,

    /// Modules that never produced a result because the run was cancelled
    pub incomplete: Vec<String>,

    pub cancelled: bool,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Modules that actually produced a result
    pub fn ran(&self) -> usize {
        self.succeeded + self.failed
    }

    /// The console summary line printed after every module has finished.
    ///
    /// A cancelled run reports `N of M` so skipped modules are not counted as run.
    pub fn summary_line(&self) -> String {
        let count = if self.ran() == self.total {
            self.total.to_string()
        } else {
            format!("{} of {}", self.ran(), self.total)
        };
        format!(
            "Ran {} modules in {:.2} seconds ({} succeeded, {} failed)",
            count,
            self.elapsed.as_secs_f64(),
            self.succeeded,
            self.failed
        )
    }
}
