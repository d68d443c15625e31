use super::catalog::{ModuleEntry, default_catalog_entries};
use camino::Utf8PathBuf;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Suite configuration from `volatile_suite.yaml`
///
/// Describes how to invoke the analysis tool and which modules to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteConfig {
    #[serde(default)]
    pub tool: ToolSettings,

    /// Worker pool size; `None` sizes the pool from the host's parallelism
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,

    #[serde(default = "default_catalog_entries")]
    pub catalog: IndexMap<String, Vec<ModuleEntry>>,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            tool: ToolSettings::default(),
            max_workers: None,
            catalog: default_catalog_entries(),
        }
    }
}

/// How the external analysis tool is invoked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSettings {
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments placed before everything else, e.g. the `vol.py` path when
    /// `program` is a Python interpreter.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub program_args: Vec<String>,

    /// Substring identifying the banner line the tool prints on every run
    #[serde(default = "default_banner")]
    pub banner: String,

    #[serde(default = "default_discovery_module")]
    pub discovery_module: String,

    /// Per-module timeout in seconds. No timeout when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            program: default_program(),
            program_args: Vec::new(),
            banner: default_banner(),
            discovery_module: default_discovery_module(),
            timeout_secs: None,
        }
    }
}

impl ToolSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn default_program() -> String {
    "volatility".to_string()
}

fn default_banner() -> String {
    "Volatility Foundation Volatility Framework".to_string()
}

fn default_discovery_module() -> String {
    "imageinfo".to_string()
}

/// Per-run settings assembled from the command line. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub dump_file: Utf8PathBuf,

    /// Profile to pass to every module; `None` asks the profile resolver
    /// to auto-detect one (the `none` value on the command line).
    pub profile: Option<String>,

    pub output_dir: Utf8PathBuf,
    pub debug: bool,

    /// Overrides [`SuiteConfig::max_workers`]
    pub max_workers: Option<usize>,

    /// Restrict the run to these categories; empty runs the whole catalog
    pub categories: Vec<String>,
}

impl RunConfig {
    pub fn new(dump_file: impl Into<Utf8PathBuf>, output_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            dump_file: dump_file.into(),
            profile: None,
            output_dir: output_dir.into(),
            debug: false,
            max_workers: None,
            categories: Vec::new(),
        }
    }

    pub fn with_profile(mut self, profile: &str) -> Self {
        self.profile = Some(profile.to_string());
        self
    }

    /// Effective pool size: run override, then config, then host parallelism.
    pub fn worker_count(&self, config: &SuiteConfig) -> usize {
        self.max_workers
            .or(config.max_workers)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_settings_defaults() {
        let tool = ToolSettings::default();
        assert_eq!(tool.program, "volatility");
        assert_eq!(tool.discovery_module, "imageinfo");
        assert!(tool.banner.starts_with("Volatility Foundation"));
        assert!(tool.program_args.is_empty());
        assert_eq!(tool.timeout(), None);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "tool:\n  program: python2\n  program_args: [\"/opt/vol/vol.py\"]\n  timeout_secs: 60\n";
        let config: SuiteConfig = serde_yaml_ng::from_str(yaml).unwrap();

        assert_eq!(config.tool.program, "python2");
        assert_eq!(config.tool.program_args, vec!["/opt/vol/vol.py".to_string()]);
        assert_eq!(config.tool.timeout(), Some(Duration::from_secs(60)));
        assert_eq!(config.tool.discovery_module, "imageinfo");
        assert_eq!(config.catalog, default_catalog_entries());
    }

    #[test]
    fn test_worker_count_precedence() {
        let mut config = SuiteConfig::default();
        config.max_workers = Some(3);

        let mut run = RunConfig::new("mem.raw", "out");
        assert_eq!(run.worker_count(&config), 3);

        run.max_workers = Some(5);
        assert_eq!(run.worker_count(&config), 5);

        run.max_workers = Some(0);
        assert_eq!(run.worker_count(&config), 1);
    }

    #[test]
    fn test_worker_count_defaults_to_host() {
        let run = RunConfig::new("mem.raw", "out");
        assert!(run.worker_count(&SuiteConfig::default()) >= 1);
    }
}
