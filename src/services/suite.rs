use crate::metrics::RunMetrics;
use crate::models::{ModuleCatalog, RunConfig, RunSummary, SuiteConfig};
use crate::services::command::{ModuleInvocation, ToolCommand};
use crate::services::dispatcher::{BannerFilter, Dispatcher, ResultSink};
use crate::services::layout::OutputLayout;
use crate::services::profile::ProfileResolver;
use crate::services::recorder::ResultRecorder;
use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

/// Problems that stop a run before any module is dispatched
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Memory dump not found: {0}")]
    DumpFileNotFound(Utf8PathBuf),

    #[error("Memory dump is not a regular file: {0}")]
    DumpFileNotAFile(Utf8PathBuf),

    #[error("Memory dump {dump} is inside the output directory {output}, which is deleted on every run")]
    DumpInsideOutput {
        dump: Utf8PathBuf,
        output: Utf8PathBuf,
    },
}

/// Runs the whole module catalog against one memory dump.
///
/// Workflow:
/// 1. Check the dump file exists
/// 2. Build the (optionally narrowed) catalog
/// 3. Resolve the profile, running discovery if none was given
/// 4. Recreate the output layout and write the discovery transcript
/// 5. Dispatch every module concurrently, recording each result as it completes
///
/// Steps 1-4 are fatal on error. From step 5 on, failures are per module.
pub struct Suite {
    config: SuiteConfig,
}

impl Suite {
    pub fn new(config: SuiteConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    /// Catalog for this run: the configured table, narrowed to the requested
    /// categories when any were given.
    pub fn catalog_for(&self, run: &RunConfig) -> Result<ModuleCatalog> {
        let catalog = ModuleCatalog::from_entries(&self.config.catalog)
            .context("Invalid module catalog")?;
        if run.categories.is_empty() {
            return Ok(catalog);
        }
        catalog
            .retain_categories(&run.categories)
            .context("Invalid category selection")
    }

    /// Run with status lines on stdout.
    pub async fn run(
        &self,
        run: &RunConfig,
        metrics: Arc<RunMetrics>,
        cancel_rx: watch::Receiver<bool>,
    ) -> Result<RunSummary> {
        self.run_with(run, metrics, cancel_rx, |layout, metrics| {
            ResultRecorder::new(layout, metrics)
        })
        .await
    }

    /// Run with a caller-built result sink.
    pub async fn run_with<S, F>(
        &self,
        run: &RunConfig,
        metrics: Arc<RunMetrics>,
        cancel_rx: watch::Receiver<bool>,
        make_sink: F,
    ) -> Result<RunSummary>
    where
        S: ResultSink,
        F: FnOnce(OutputLayout, Arc<RunMetrics>) -> S,
    {
        check_dump_file(run)?;
        check_dump_outside_output(run)?;
        let catalog = self.catalog_for(run)?;

        if *cancel_rx.borrow() {
            return Ok(cancelled_before_layout(
                run.profile.clone().unwrap_or_default(),
                &catalog,
                &metrics,
            ));
        }

        if run.profile.is_none() {
            println!("Searching for a profile...");
        }
        let resolved = ProfileResolver::new(self.config.tool.clone())
            .resolve(&run.dump_file, run.profile.as_deref())
            .await?;
        println!("Using profile: {}", resolved.profile);

        // The previous run's output is only removed once we know this one goes ahead
        if *cancel_rx.borrow() {
            return Ok(cancelled_before_layout(resolved.profile, &catalog, &metrics));
        }

        println!("Creating output directory...");
        let layout = OutputLayout::prepare(&run.output_dir, &catalog)?;
        layout.write_transcript(&resolved.transcript)?;

        let invocations: Vec<ModuleInvocation> = catalog
            .modules()
            .map(|module| ModuleInvocation {
                module: module.clone(),
                command: ToolCommand::module(
                    &self.config.tool,
                    &run.dump_file,
                    &resolved.profile,
                    &layout,
                    module,
                ),
            })
            .collect();
        let total = invocations.len();

        let dispatcher = Dispatcher::new(
            BannerFilter::new(self.config.tool.banner.clone()),
            run.worker_count(&self.config),
        )
        .with_timeout(self.config.tool.timeout());

        println!("Running Volatility...");
        let cancelled_before = *cancel_rx.borrow();
        let sink = make_sink(layout, metrics.clone());
        let outcome = dispatcher.dispatch(invocations, &sink, cancel_rx.clone()).await;
        let cancelled = cancelled_before || *cancel_rx.borrow();

        let summary = RunSummary {
            profile: resolved.profile,
            total,
            succeeded: outcome.results.iter().filter(|r| r.succeeded).count(),
            failed: outcome.results.iter().filter(|r| !r.succeeded).count(),
            incomplete: outcome.incomplete.iter().map(|m| m.name.clone()).collect(),
            cancelled,
            elapsed: metrics.elapsed(),
        };

        print_summary(&summary);
        metrics.log_summary();

        Ok(summary)
    }
}

/// Summary for a run cancelled before the output directory was touched.
fn cancelled_before_layout(
    profile: String,
    catalog: &ModuleCatalog,
    metrics: &RunMetrics,
) -> RunSummary {
    tracing::warn!("Run cancelled before any module started; output directory left untouched");
    let summary = RunSummary {
        profile,
        total: catalog.len(),
        succeeded: 0,
        failed: 0,
        incomplete: catalog.modules().map(|m| m.name.clone()).collect(),
        cancelled: true,
        elapsed: metrics.elapsed(),
    };
    print_summary(&summary);
    summary
}

fn print_summary(summary: &RunSummary) {
    println!("{}", summary.summary_line());
    if !summary.incomplete.is_empty() {
        println!(
            "Cancelled before completion: {}",
            summary.incomplete.join(", ")
        );
    }
}

fn check_dump_file(run: &RunConfig) -> Result<(), SetupError> {
    if !run.dump_file.exists() {
        return Err(SetupError::DumpFileNotFound(run.dump_file.clone()));
    }
    if !run.dump_file.is_file() {
        return Err(SetupError::DumpFileNotAFile(run.dump_file.clone()));
    }
    Ok(())
}

/// The output directory is deleted recursively, so the dump must not live in it.
fn check_dump_outside_output(run: &RunConfig) -> Result<(), SetupError> {
    // A missing output directory cannot contain the (existing) dump
    let (Ok(dump), Ok(output)) = (
        run.dump_file.canonicalize_utf8(),
        run.output_dir.canonicalize_utf8(),
    ) else {
        return Ok(());
    };

    if dump.starts_with(&output) {
        return Err(SetupError::DumpInsideOutput {
            dump: run.dump_file.clone(),
            output: run.output_dir.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_dump_file_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let run = RunConfig::new(root.join("missing.raw"), root.join("out"));

        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let err = Suite::new(SuiteConfig::default())
            .run(&run, Arc::new(RunMetrics::new()), cancel_rx)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<SetupError>(),
            Some(SetupError::DumpFileNotFound(_))
        ));
        assert!(!root.join("out").exists());
    }

    #[tokio::test]
    async fn test_directory_as_dump_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let run = RunConfig::new(root.clone(), root.join("out"));

        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let err = Suite::new(SuiteConfig::default())
            .run(&run, Arc::new(RunMetrics::new()), cancel_rx)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<SetupError>(),
            Some(SetupError::DumpFileNotAFile(_))
        ));
    }

    #[test]
    fn test_catalog_for_narrows() {
        let suite = Suite::new(SuiteConfig::default());
        let mut run = RunConfig::new("mem.raw", "out");
        assert_eq!(suite.catalog_for(&run).unwrap().len(), 26);

        run.categories = vec!["Malware".to_string()];
        assert_eq!(suite.catalog_for(&run).unwrap().len(), 5);

        run.categories = vec!["Networking".to_string()];
        assert!(suite.catalog_for(&run).is_err());
    }

    #[tokio::test]
    async fn test_dump_inside_output_dir_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let out = root.join("out");
        std::fs::create_dir_all(out.join("nested")).unwrap();
        let dump = out.join("nested/mem.raw");
        std::fs::write(&dump, b"evidence").unwrap();

        let run = RunConfig::new(dump.clone(), out.clone());
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let err = Suite::new(SuiteConfig::default())
            .run(&run, Arc::new(RunMetrics::new()), cancel_rx)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<SetupError>(),
            Some(SetupError::DumpInsideOutput { .. })
        ));
        assert!(dump.exists());
    }

    #[test]
    fn test_dump_next_to_output_dir_is_fine() {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        std::fs::create_dir_all(root.join("out")).unwrap();
        std::fs::write(root.join("out.raw"), b"evidence").unwrap();

        let run = RunConfig::new(root.join("out.raw"), root.join("out"));
        assert!(check_dump_outside_output(&run).is_ok());
    }

    #[tokio::test]
    async fn test_cancel_before_run_keeps_previous_output() {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        std::fs::write(root.join("mem.raw"), b"dump").unwrap();
        std::fs::create_dir_all(root.join("out")).unwrap();
        std::fs::write(root.join("out/previous.txt"), b"keep").unwrap();

        let run = RunConfig::new(root.join("mem.raw"), root.join("out")).with_profile("Win7SP1x64");
        let (cancel_tx, cancel_rx) = watch::channel(false);
        cancel_tx.send_replace(true);

        let summary = Suite::new(SuiteConfig::default())
            .run(&run, Arc::new(RunMetrics::new()), cancel_rx)
            .await
            .unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.total, 26);
        assert_eq!(summary.incomplete.len(), 26);
        assert_eq!(summary.ran(), 0);
        assert!(root.join("out/previous.txt").exists());
    }
}
