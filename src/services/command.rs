use crate::models::{ModuleSpec, ToolSettings};
use crate::services::layout::OutputLayout;
use camino::Utf8Path;
use std::fmt;
use std::process::Stdio;
use tokio::process::Command;

/// A structured external-tool invocation: program plus argument vector.
///
/// Nothing is ever passed through a shell, so dump paths with spaces or quotes
/// reach the tool untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// `<tool> -f <file> <discovery module>`
    pub fn discovery(tool: &ToolSettings, dump_file: &Utf8Path) -> Self {
        let mut args = tool.program_args.clone();
        args.push("-f".to_string());
        args.push(dump_file.to_string());
        args.push(tool.discovery_module.clone());
        Self::new(&tool.program, args)
    }

    /// `<tool> -f <file> --profile=<p> --output-file=<path> <module> [--dump-dir=<dir>] [flags]`
    pub fn module(
        tool: &ToolSettings,
        dump_file: &Utf8Path,
        profile: &str,
        layout: &OutputLayout,
        module: &ModuleSpec,
    ) -> Self {
        let mut args = tool.program_args.clone();
        args.push("-f".to_string());
        args.push(dump_file.to_string());
        args.push(format!("--profile={}", profile));
        args.push(format!("--output-file={}", layout.output_file(module)));
        args.push(module.name.clone());

        if module.dump_dir {
            args.push(format!("--dump-dir={}", layout.dump_dir(module)));
        }
        args.extend(module.extra_flags.iter().cloned());

        Self::new(&tool.program, args)
    }

    /// A tokio command with piped output, null stdin, and the child killed
    /// if the owning future is dropped.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote_arg(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote_arg(arg))?;
        }
        Ok(())
    }
}

/// Quote for display only; never fed to a shell.
fn quote_arg(arg: &str) -> String {
    if !arg.is_empty() && !arg.chars().any(|c| c.is_whitespace() || c == '"' || c == '\'') {
        arg.to_string()
    } else {
        format!("\"{}\"", arg.replace('"', "\\\""))
    }
}

/// One module paired with the command that runs it
#[derive(Debug, Clone)]
pub struct ModuleInvocation {
    pub module: ModuleSpec,
    pub command: ToolCommand,
}
