use crate::metrics::RunMetrics;
use crate::models::ModuleResult;
use crate::services::dispatcher::ResultSink;
use crate::services::layout::OutputLayout;
use anyhow::{Context, Result, anyhow};
use std::fs;
use std::io::{self, Stdout, Write};
use std::sync::{Arc, Mutex};

pub const SUCCESS_MARKER: char = '\u{2713}';
pub const FAILURE_MARKER: char = '\u{2717}';

/// Records module outcomes: a console status line per module, an error file
/// per failed module, and the run metrics.
///
/// The module's primary output is already on disk, written by the tool
/// through `--output-file`.
pub struct ResultRecorder<W: Write + Send = Stdout> {
    layout: OutputLayout,
    metrics: Arc<RunMetrics>,
    console: Mutex<W>,
}

impl ResultRecorder<Stdout> {
    pub fn new(layout: OutputLayout, metrics: Arc<RunMetrics>) -> Self {
        Self::with_console(layout, metrics, io::stdout())
    }
}

impl<W: Write + Send> ResultRecorder<W> {
    pub fn with_console(layout: OutputLayout, metrics: Arc<RunMetrics>, console: W) -> Self {
        Self {
            layout,
            metrics,
            console: Mutex::new(console),
        }
    }

    /// Hand back the console writer, e.g. to inspect captured output.
    pub fn into_console(self) -> Result<W> {
        self.console
            .into_inner()
            .map_err(|_| anyhow!("Console writer lock poisoned"))
    }

    fn status_line(&self, marker: char, module: &str) -> Result<()> {
        let mut console = self
            .console
            .lock()
            .map_err(|_| anyhow!("Console writer lock poisoned"))?;
        writeln!(console, "{} {}", marker, module).context("Failed to write status line")?;
        console.flush().context("Failed to flush console")?;
        Ok(())
    }

    fn write_error_file(&self, result: &ModuleResult) -> Result<()> {
        let path = self.layout.error_file(&result.module);
        let mut content = result.error_lines.join("\n");
        content.push('\n');
        fs::write(&path, content)
            .with_context(|| format!("Failed to write error file: {}", path))?;
        Ok(())
    }
}

impl<W: Write + Send> ResultSink for ResultRecorder<W> {
    fn record(&self, result: &ModuleResult) -> Result<()> {
        let name = &result.module.name;
        self.metrics.record_module_time(result.duration);

        if result.succeeded {
            self.metrics.record_module_succeeded();
            tracing::info!("Module {} succeeded", name);
            return self.status_line(SUCCESS_MARKER, name);
        }

        self.metrics.record_module_failed();
        tracing::info!("Module {} failed", name);
        tracing::debug!(
            "Module {} error output (exit code {:?}):\n{}",
            name,
            result.exit_code,
            result.error_lines.join("\n")
        );

        // Console marker first so a write failure still shows the outcome
        let console = self.status_line(FAILURE_MARKER, name);
        self.write_error_file(result)?;
        console
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ModuleCatalog, ModuleEntry, ModuleSpec};
    use camino::Utf8PathBuf;
    use indexmap::IndexMap;
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup() -> (TempDir, OutputLayout, ModuleSpec) {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().join("out")).unwrap();

        let mut entries = IndexMap::new();
        entries.insert("Registry".to_string(), vec![ModuleEntry::new("hashdump")]);
        let catalog = ModuleCatalog::from_entries(&entries).unwrap();
        let layout = OutputLayout::prepare(&root, &catalog).unwrap();
        let spec = catalog.get("hashdump").unwrap().clone();

        (temp_dir, layout, spec)
    }

    #[test]
    fn test_record_success() {
        let (_temp_dir, layout, spec) = setup();
        let metrics = Arc::new(RunMetrics::new());
        let recorder = ResultRecorder::with_console(layout.clone(), metrics.clone(), Vec::new());

        recorder
            .record(&ModuleResult::success(spec.clone(), Some(0), Duration::from_millis(5)))
            .unwrap();

        let console = String::from_utf8(recorder.into_console().unwrap()).unwrap();
        assert_eq!(console, "\u{2713} hashdump\n");
        assert!(!layout.error_file(&spec).exists());
        assert_eq!(metrics.succeeded(), 1);
    }

    #[test]
    fn test_record_failure_writes_error_file() {
        let (_temp_dir, layout, spec) = setup();
        let metrics = Arc::new(RunMetrics::new());
        let recorder = ResultRecorder::with_console(layout.clone(), metrics.clone(), Vec::new());

        let result = ModuleResult::failure(
            spec.clone(),
            vec!["ERROR: no hives".to_string(), "detail".to_string()],
            Some(1),
            Duration::from_millis(5),
        );
        recorder.record(&result).unwrap();

        let console = String::from_utf8(recorder.into_console().unwrap()).unwrap();
        assert_eq!(console, "\u{2717} hashdump\n");

        let content = fs::read_to_string(layout.error_file(&spec)).unwrap();
        assert_eq!(content, "ERROR: no hives\ndetail\n");
        assert_eq!(metrics.failed(), 1);
    }

    #[test]
    fn test_record_failure_missing_category_dir() {
        let (temp_dir, _layout, spec) = setup();
        let missing = OutputLayout::new(
            Utf8PathBuf::try_from(temp_dir.path().join("never_created")).unwrap(),
        );
        let recorder =
            ResultRecorder::with_console(missing, Arc::new(RunMetrics::new()), Vec::new());

        let result = ModuleResult::failure(spec, vec!["x".to_string()], None, Duration::ZERO);
        assert!(recorder.record(&result).is_err());

        // The failure marker still reached the console
        let console = String::from_utf8(recorder.into_console().unwrap()).unwrap();
        assert!(console.starts_with('\u{2717}'));
    }
}
