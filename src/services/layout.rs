//! Output directory layout for a suite run.
//!
//! ```text
//! <output-dir>/
//!   imageinfo.txt                      profile discovery transcript
//!   <category>/<module>_out.txt        written by the tool via --output-file
//!   <category>/<module>_err.txt        written on failure
//!   <category>/<module>_out_files/     --dump-dir target for extracting modules
//! ```

use crate::models::{ModuleCatalog, ModuleSpec};
use anyhow::{Context, Result};
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use std::fs;
use thiserror::Error;

/// Name of the profile discovery transcript in the output root
pub const DISCOVERY_TRANSCRIPT: &str = "imageinfo.txt";

#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("Refusing to use {0:?} as output directory: it must name a directory")]
    UnsafeRoot(Utf8PathBuf),
}

/// Deterministic paths for every artifact of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: Utf8PathBuf,
}

impl OutputLayout {
    /// Paths only; nothing is touched on disk.
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Remove any previous run at `root` and create a fresh tree for `catalog`.
    ///
    /// Destructive: an existing directory is deleted recursively, never merged.
    pub fn prepare(root: &Utf8Path, catalog: &ModuleCatalog) -> Result<Self> {
        if !is_safe_root(root) {
            return Err(LayoutError::UnsafeRoot(root.to_path_buf()).into());
        }

        let layout = Self::new(root);

        if root.exists() {
            tracing::info!("Removing previous output directory: {}", root);
            fs::remove_dir_all(root)
                .with_context(|| format!("Failed to remove output directory: {}", root))?;
        }

        fs::create_dir_all(root)
            .with_context(|| format!("Failed to create output directory: {}", root))?;

        for category in catalog.categories() {
            let dir = layout.category_dir(category);
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create category directory: {}", dir))?;
        }

        for module in catalog.modules().filter(|m| m.dump_dir) {
            let dir = layout.dump_dir(module);
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create dump directory: {}", dir))?;
        }

        tracing::debug!(
            "Prepared output layout at {} ({} categories)",
            root,
            catalog.categories().count()
        );

        Ok(layout)
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn category_dir(&self, category: &str) -> Utf8PathBuf {
        self.root.join(category_slug(category))
    }

    pub fn output_file(&self, module: &ModuleSpec) -> Utf8PathBuf {
        self.category_dir(&module.category)
            .join(format!("{}_out.txt", module.name))
    }

    pub fn error_file(&self, module: &ModuleSpec) -> Utf8PathBuf {
        self.category_dir(&module.category)
            .join(format!("{}_err.txt", module.name))
    }

    pub fn dump_dir(&self, module: &ModuleSpec) -> Utf8PathBuf {
        self.category_dir(&module.category)
            .join(format!("{}_out_files", module.name))
    }

    pub fn transcript_file(&self) -> Utf8PathBuf {
        self.root.join(DISCOVERY_TRANSCRIPT)
    }

    /// Write the profile discovery transcript (empty when the profile was given).
    pub fn write_transcript(&self, lines: &[String]) -> Result<()> {
        let path = self.transcript_file();
        fs::write(&path, lines.join("\n"))
            .with_context(|| format!("Failed to write discovery transcript: {}", path))?;
        Ok(())
    }
}

/// Directory name for a category: lowercase ASCII alphanumerics, every other
/// run of characters collapsed into a single `_`.
///
/// `"Crash Dumps, Hibernation, and Conversion"` becomes
/// `crash_dumps_hibernation_and_conversion`.
pub fn category_slug(category: &str) -> String {
    let mut slug = String::with_capacity(category.len());
    let mut pending_sep = false;

    for c in category.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }

    if slug.is_empty() {
        slug.push_str("uncategorized");
    }
    slug
}

fn is_safe_root(root: &Utf8Path) -> bool {
    matches!(root.components().next_back(), Some(Utf8Component::Normal(_)))
}
