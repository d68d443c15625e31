//! Shared fixtures: a fake Volatility written as a POSIX shell script.
//!
//! The script understands just enough of the real command line to be useful:
//! `-f <dump>` is skipped, `--output-file=<path>` receives the module output,
//! other `-` options are ignored, and the first bare word is the module.

#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tempfile::TempDir;
use volatile_suite::models::{ModuleEntry, ModuleResult, ToolSettings};
use volatile_suite::services::ResultSink;

pub const BANNER: &str = "Volatility Foundation Volatility Framework 2.6";

pub const SUGGESTION: &str =
    "          Suggested Profile(s) : Win7SP1x64, Win7SP0x64, Win2008R2SP0x64";
pub const NO_SUGGESTION: &str =
    "          Suggested Profile(s) : No suggestion (Instantiated with no profile)";

pub struct Workspace {
    _temp_dir: TempDir,
    pub root: Utf8PathBuf,
    pub dump: Utf8PathBuf,
    pub output: Utf8PathBuf,
    pub tool: ToolSettings,
}

impl Workspace {
    /// Temp dir with a dummy dump and a fake tool that suggests Win7SP1x64.
    pub fn new() -> Self {
        Self::with_suggestion(SUGGESTION)
    }

    pub fn with_suggestion(suggestion_line: &str) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();

        let dump = root.join("memory dump.raw");
        fs::write(&dump, b"not really a memory image").unwrap();

        let script = root.join("volatility.sh");
        fs::write(&script, fake_volatility(suggestion_line)).unwrap();

        let tool = ToolSettings {
            program: "sh".to_string(),
            program_args: vec![script.to_string()],
            ..ToolSettings::default()
        };

        Self {
            output: root.join("out"),
            dump,
            root,
            tool,
            _temp_dir: temp_dir,
        }
    }
}

fn fake_volatility(suggestion_line: &str) -> String {
    format!(
        r#"out=""
module=""
while [ $# -gt 0 ]; do
  case "$1" in
    -f) shift ;;
    --output-file=*) out="${{1#--output-file=}}" ;;
    -*) ;;
    *) [ -z "$module" ] && module="$1" ;;
  esac
  shift
done
echo "{banner}" >&2
case "$module" in
  imageinfo)
    echo "INFO    : volatility.debug    : Determining profile based on KDBG search..."
    echo "{suggestion}"
    ;;
  broken)
    echo "ERROR   : volatility.debug    : This plugin is broken" >&2
    exit 1
    ;;
  noisy)
    echo "$module output" > "$out"
    echo "" >&2
    exit 3
    ;;
  hang)
    echo $$ > "$out.pid"
    exec sleep 30
    ;;
  *)
    echo "$module output" > "$out"
    ;;
esac
"#,
        banner = BANNER,
        suggestion = suggestion_line,
    )
}

pub fn entry(name: &str) -> ModuleEntry {
    ModuleEntry::new(name)
}

pub fn read(path: &Utf8Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| panic!("Failed to read {}: {}", path, e))
}

/// Collects results in the order they were recorded.
#[derive(Default)]
pub struct CollectingSink {
    pub results: std::sync::Mutex<Vec<ModuleResult>>,
}

impl CollectingSink {
    pub fn names(&self) -> Vec<String> {
        self.results
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.module.name.clone())
            .collect()
    }
}

impl ResultSink for CollectingSink {
    fn record(&self, result: &ModuleResult) -> anyhow::Result<()> {
        self.results.lock().unwrap().push(result.clone());
        Ok(())
    }
}
