use crate::config::DEFAULT_CONFIG_FILE;
use crate::models::{RunConfig, SuiteConfig};
use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Parser;
use std::path::{Path, PathBuf};

/// Profile value meaning "detect it from the dump"
pub const AUTO_PROFILE: &str = "none";

#[derive(Parser, Debug)]
#[command(
    name = "volatile-suite",
    version,
    about = "Run a suite of Volatility modules concurrently against a memory dump"
)]
pub struct Cli {
    /// Memory dump file
    #[arg(required_unless_present = "write_config")]
    pub file: Option<PathBuf>,

    /// Profile, if not specified, a suggested profile will be used
    #[arg(long, default_value = AUTO_PROFILE)]
    pub profile: String,

    /// Output directory; deleted and recreated on every run
    #[arg(long, default_value = "volatile_output")]
    pub output_dir: PathBuf,

    /// Verbose logging, mirrored to stderr
    #[arg(long)]
    pub debug: bool,

    /// Maximum concurrent modules (defaults to the number of CPUs)
    #[arg(long, short = 'j', value_name = "N")]
    pub jobs: Option<usize>,

    /// Volatility executable to invoke
    #[arg(long, value_name = "PROGRAM")]
    pub tool: Option<String>,

    /// Suite configuration file (tool settings and module catalog)
    #[arg(long, value_name = "FILE", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Per-module timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Only run modules in this category (repeatable)
    #[arg(long = "category", value_name = "NAME")]
    pub categories: Vec<String>,

    /// Directory for diagnostic log files
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,

    /// Write the effective configuration to --config and exit
    #[arg(long)]
    pub write_config: bool,
}

impl Cli {
    pub fn config_path(&self) -> Result<Utf8PathBuf> {
        utf8(&self.config, "--config")
    }

    pub fn log_dir(&self) -> Result<Utf8PathBuf> {
        utf8(&self.log_dir, "--log-dir")
    }

    /// Per-run settings from the parsed arguments.
    pub fn run_config(&self) -> Result<RunConfig> {
        let profile = match self.profile.trim() {
            "" | AUTO_PROFILE => None,
            profile => Some(profile.to_string()),
        };

        let file = self
            .file
            .as_deref()
            .context("A memory dump file is required")?;

        Ok(RunConfig {
            dump_file: utf8(file, "file")?,
            profile,
            output_dir: utf8(&self.output_dir, "--output-dir")?,
            debug: self.debug,
            max_workers: self.jobs,
            categories: self.categories.clone(),
        })
    }

    /// Apply tool overrides given on the command line.
    pub fn apply_overrides(&self, config: &mut SuiteConfig) {
        if let Some(tool) = &self.tool {
            config.tool.program = tool.clone();
        }
        if let Some(secs) = self.timeout {
            config.tool.timeout_secs = Some(secs);
        }
        if let Some(jobs) = self.jobs {
            config.max_workers = Some(jobs);
        }
    }
}

fn utf8(path: &Path, what: &str) -> Result<Utf8PathBuf> {
    Utf8PathBuf::try_from(path.to_path_buf())
        .with_context(|| format!("{} is not valid UTF-8: {}", what, path.display()))
}
