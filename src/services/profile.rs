use crate::models::ToolSettings;
use crate::services::command::ToolCommand;
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::time::Instant;
use thiserror::Error;

/// Marker line printed by the discovery module, e.g.
/// `          Suggested Profile(s) : Win7SP1x64, Win7SP0x64, Win2008R2SP0x64`
pub const SUGGESTION_MARKER: &str = "Suggested Profile(s)";

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Failed to run profile discovery ({command}): {source}")]
    DiscoveryFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "No suggested profile found for {0}; pass --profile explicitly (see imageinfo output in the debug log)"
    )]
    NoSuggestion(Utf8PathBuf),
}

/// Profile settled for a run, with the discovery transcript that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProfile {
    pub profile: String,

    /// Discovery output, stdout lines then stderr lines. Empty when the
    /// profile was supplied by the user.
    pub transcript: Vec<String>,
}

/// Finds the profile to analyse a dump with.
///
/// Runs the tool's discovery module once and takes the first suggested
/// profile from its output.
pub struct ProfileResolver {
    tool: ToolSettings,

    /// Captures the first comma-delimited suggestion after the marker
    suggestion_pattern: Regex,
}

impl ProfileResolver {
    pub fn new(tool: ToolSettings) -> Self {
        Self {
            tool,
            suggestion_pattern: Regex::new(r"Suggested Profile\(s\)\s*:\s*([^,]+)")
                .expect("Invalid suggestion regex"),
        }
    }

    /// Use `requested` when given, otherwise discover a profile from the dump.
    pub async fn resolve(
        &self,
        dump_file: &Utf8Path,
        requested: Option<&str>,
    ) -> Result<ResolvedProfile, ProfileError> {
        if let Some(profile) = requested {
            tracing::info!("Using profile supplied on the command line: {}", profile);
            return Ok(ResolvedProfile {
                profile: profile.to_string(),
                transcript: Vec::new(),
            });
        }

        let transcript = self.discover(dump_file).await?;
        match self.extract_profile(&transcript) {
            Some(profile) => {
                tracing::info!("Detected profile: {}", profile);
                Ok(ResolvedProfile {
                    profile,
                    transcript,
                })
            }
            None => {
                tracing::debug!("Discovery transcript:\n{}", transcript.join("\n"));
                Err(ProfileError::NoSuggestion(dump_file.to_path_buf()))
            }
        }
    }

    /// Run the discovery module and return its output lines.
    pub async fn discover(&self, dump_file: &Utf8Path) -> Result<Vec<String>, ProfileError> {
        let command = ToolCommand::discovery(&self.tool, dump_file);
        tracing::debug!("Executing: {}", command);

        let start = Instant::now();
        let output = command
            .to_command()
            .output()
            .await
            .map_err(|source| ProfileError::DiscoveryFailed {
                command: command.to_string(),
                source,
            })?;

        tracing::info!(
            "Profile discovery completed in {:.2}s with exit code {:?}",
            start.elapsed().as_secs_f32(),
            output.status.code()
        );

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        Ok(stdout
            .lines()
            .chain(stderr.lines())
            .map(str::to_string)
            .collect())
    }

    /// First suggested profile in the transcript, if any.
    ///
    /// Only the first line carrying the marker is considered. A line reporting
    /// `No suggestion` counts as no match.
    pub fn extract_profile<S: AsRef<str>>(&self, transcript: &[S]) -> Option<String> {
        let line = transcript
            .iter()
            .map(|line| line.as_ref())
            .find(|line| line.contains(SUGGESTION_MARKER))?;

        let profile = self
            .suggestion_pattern
            .captures(line)?
            .get(1)?
            .as_str()
            .trim();

        if profile.is_empty() || profile.starts_with("No suggestion") {
            return None;
        }
        Some(profile.to_string())
    }
}
