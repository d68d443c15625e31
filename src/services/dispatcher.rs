use crate::models::{ModuleResult, ModuleSpec};
use crate::services::command::{ModuleInvocation, ToolCommand};
use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tokio::time::timeout;

/// Errors from a single module invocation. Always isolated to that module.
#[derive(Error, Debug)]
pub enum InvocationError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Process error: {0}")]
    Wait(#[from] std::io::Error),
}

/// Removes the tool's banner line from captured error output.
#[derive(Debug, Clone)]
pub struct BannerFilter {
    banner: String,
}

impl BannerFilter {
    pub fn new(banner: impl Into<String>) -> Self {
        Self {
            banner: banner.into(),
        }
    }

    /// Lines of `stderr` that are neither blank nor banner noise.
    pub fn error_lines(&self, stderr: &str) -> Vec<String> {
        stderr
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter(|line| self.banner.is_empty() || !line.contains(&self.banner))
            .map(str::to_string)
            .collect()
    }
}

/// Receives each module result as soon as its invocation completes.
#[cfg_attr(test, mockall::automock)]
pub trait ResultSink: Send + Sync {
    fn record(&self, result: &ModuleResult) -> Result<()>;
}

/// Everything a dispatch produced
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// In completion order
    pub results: Vec<ModuleResult>,

    /// Modules that never produced a result (cancelled before or while running)
    pub incomplete: Vec<ModuleSpec>,
}

/// Runs module invocations on a bounded pool of concurrent child processes.
///
/// Every invocation is an independent task racing for a semaphore permit, so
/// at most `max_workers` tools run at once. A cancel signal on the watch
/// channel stops queued tasks before they start and kills running children.
pub struct Dispatcher {
    filter: BannerFilter,
    max_workers: usize,
    module_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(filter: BannerFilter, max_workers: usize) -> Self {
        Self {
            filter,
            max_workers: max_workers.max(1),
            module_timeout: None,
        }
    }

    pub fn with_timeout(mut self, module_timeout: Option<Duration>) -> Self {
        self.module_timeout = module_timeout;
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run every invocation and hand each result to `sink` in completion order.
    ///
    /// Returns once all tasks have finished or been cancelled. A failing module
    /// never affects the others.
    pub async fn dispatch<S>(
        &self,
        invocations: Vec<ModuleInvocation>,
        sink: &S,
        cancel_rx: watch::Receiver<bool>,
    ) -> DispatchOutcome
    where
        S: ResultSink + ?Sized,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let modules: Vec<ModuleSpec> = invocations.iter().map(|i| i.module.clone()).collect();

        tracing::info!(
            "Dispatching {} modules (max concurrent: {})",
            invocations.len(),
            self.max_workers
        );

        let mut tasks = JoinSet::new();

        for invocation in invocations {
            let semaphore = semaphore.clone();
            let filter = self.filter.clone();
            let module_timeout = self.module_timeout;
            let mut cancel_rx = cancel_rx.clone();

            tasks.spawn(async move {
                // Queued: race the permit against cancellation
                let _permit = tokio::select! {
                    biased;
                    _ = cancelled(&mut cancel_rx) => {
                        tracing::warn!("Cancelled before starting module: {}", invocation.module.name);
                        return None;
                    }
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return None,
                    },
                };

                // Running: dropping the invocation future kills the child
                tokio::select! {
                    biased;
                    _ = cancelled(&mut cancel_rx) => {
                        tracing::warn!("Cancelled while running module: {}", invocation.module.name);
                        None
                    }
                    result = run_module(&invocation, &filter, module_timeout) => Some(result),
                }
            });
        }

        let mut outcome = DispatchOutcome::default();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(result)) => {
                    if let Err(e) = sink.record(&result) {
                        tracing::error!("Failed to record result for {}: {:#}", result.module.name, e);
                    }
                    outcome.results.push(result);
                }
                Ok(None) => {}
                Err(e) => tracing::error!("Task join error: {}", e),
            }
        }

        let finished: HashSet<&str> = outcome
            .results
            .iter()
            .map(|r| r.module.name.as_str())
            .collect();
        let incomplete: Vec<ModuleSpec> = modules
            .iter()
            .filter(|m| !finished.contains(m.name.as_str()))
            .cloned()
            .collect();
        outcome.incomplete = incomplete;

        tracing::info!(
            "Dispatch finished: {} completed, {} incomplete",
            outcome.results.len(),
            outcome.incomplete.len()
        );

        outcome
    }
}

/// Resolves once cancellation is requested. Never resolves if the sender is
/// dropped without cancelling.
async fn cancelled(cancel_rx: &mut watch::Receiver<bool>) {
    loop {
        if *cancel_rx.borrow_and_update() {
            return;
        }
        if cancel_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Run one module to completion and classify it.
async fn run_module(
    invocation: &ModuleInvocation,
    filter: &BannerFilter,
    module_timeout: Option<Duration>,
) -> ModuleResult {
    let module = invocation.module.clone();
    let start = Instant::now();

    tracing::debug!("Executing: {}", invocation.command);

    match execute(&invocation.command, module_timeout).await {
        Ok(output) => {
            let duration = start.elapsed();
            let exit_code = output.status.code();
            let stderr = String::from_utf8_lossy(&output.stderr);
            let errors = filter.error_lines(&stderr);

            tracing::debug!(
                "Module {} completed in {:.2}s with exit code {:?} ({} error lines)",
                module.name,
                duration.as_secs_f32(),
                exit_code,
                errors.len()
            );

            if errors.is_empty() {
                ModuleResult::success(module, exit_code, duration)
            } else {
                ModuleResult::failure(module, errors, exit_code, duration)
            }
        }
        Err(e) => {
            tracing::warn!("Module {} could not run: {}", module.name, e);
            ModuleResult::failure(module, vec![e.to_string()], None, start.elapsed())
        }
    }
}

async fn execute(
    command: &ToolCommand,
    module_timeout: Option<Duration>,
) -> Result<std::process::Output, InvocationError> {
    let child = command
        .to_command()
        .spawn()
        .map_err(|source| InvocationError::Spawn {
            program: command.program.clone(),
            source,
        })?;

    let output = match module_timeout {
        Some(limit) => timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| InvocationError::Timeout(limit))??,
        None => child.wait_with_output().await?,
    };

    Ok(output)
}
