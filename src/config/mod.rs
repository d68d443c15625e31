use crate::models::SuiteConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Default suite configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "volatile_suite.yaml";

/// Configuration manager for loading and saving the YAML suite configuration.
///
/// The file is optional: without it the built-in tool settings and Windows
/// catalog are used.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager for the given configuration file path.
    ///
    /// Nothing is read until [`load_suite_config`](Self::load_suite_config).
    pub fn new<P: AsRef<Utf8Path>>(config_path: P) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
        }
    }

    /// Load the suite configuration.
    ///
    /// # Returns
    /// The loaded SuiteConfig, or defaults if the file doesn't exist
    pub fn load_suite_config(&self) -> Result<SuiteConfig> {
        if !self.config_path.exists() {
            tracing::info!(
                "Suite config not found at {}, using built-in defaults",
                self.config_path
            );
            return Ok(SuiteConfig::default());
        }

        let file_contents = fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read suite config: {}", self.config_path))?;

        let config: SuiteConfig = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse suite config: {}", self.config_path))?;

        tracing::info!(
            "Loaded suite config from {} ({} categories)",
            self.config_path,
            config.catalog.len()
        );
        Ok(config)
    }

    /// Save the suite configuration, creating parent directories as needed.
    pub fn save_suite_config(&self, config: &SuiteConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize suite config to YAML")?;

        if let Some(parent) = self.config_path.parent()
            && !parent.as_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent))?;
        }

        fs::write(&self.config_path, yaml_string)
            .with_context(|| format!("Failed to write suite config: {}", self.config_path))?;

        tracing::info!("Saved suite config to {}", self.config_path);
        Ok(())
    }

    /// Get the configuration file path.
    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }
}
