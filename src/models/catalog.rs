use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// A single catalog entry as written in the suite configuration.
///
/// ```yaml
/// - name: evtlogs
///   dump_dir: true
///   flags: ["--save-evt"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleEntry {
    pub name: String,

    /// The module extracts artifacts and needs `--dump-dir` pointing at a
    /// pre-created `<module>_out_files/` directory.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dump_dir: bool,

    /// Extra flags appended after the module name, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
}

impl ModuleEntry {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            dump_dir: false,
            flags: Vec::new(),
        }
    }

    pub fn with_dump_dir(mut self) -> Self {
        self.dump_dir = true;
        self
    }

    pub fn with_flag(mut self, flag: &str) -> Self {
        self.flags.push(flag.to_string());
        self
    }
}

/// A module resolved against its category. Immutable for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleSpec {
    pub category: String,
    pub name: String,
    pub dump_dir: bool,
    pub extra_flags: Vec<String>,
}

/// Errors raised while building or narrowing a catalog
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Module {module} appears in both {first} and {second}")]
    DuplicateModule {
        module: String,
        first: String,
        second: String,
    },

    #[error("Module name in category {0} is empty")]
    EmptyModuleName(String),

    #[error("Invalid module name {module:?} in category {category}: must be a single path component not starting with '-'")]
    InvalidModuleName { module: String, category: String },

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Catalog contains no modules")]
    Empty,
}

/// Ordered, read-only table of module categories.
///
/// Category order and module order within a category follow the source table,
/// so the layout and dispatch order are deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleCatalog {
    categories: IndexMap<String, Vec<ModuleSpec>>,
}

impl ModuleCatalog {
    /// Build a catalog from configuration entries, rejecting duplicate or
    /// empty module names.
    pub fn from_entries(entries: &IndexMap<String, Vec<ModuleEntry>>) -> Result<Self, CatalogError> {
        let mut seen: IndexMap<&str, &str> = IndexMap::new();
        let mut categories = IndexMap::new();

        for (category, modules) in entries {
            let mut specs = Vec::with_capacity(modules.len());
            for entry in modules {
                let name = entry.name.trim();
                if name.is_empty() {
                    return Err(CatalogError::EmptyModuleName(category.clone()));
                }
                if !is_valid_module_name(name) {
                    return Err(CatalogError::InvalidModuleName {
                        module: name.to_string(),
                        category: category.clone(),
                    });
                }
                if let Some(first) = seen.insert(name, category.as_str()) {
                    return Err(CatalogError::DuplicateModule {
                        module: name.to_string(),
                        first: first.to_string(),
                        second: category.clone(),
                    });
                }
                specs.push(ModuleSpec {
                    category: category.clone(),
                    name: name.to_string(),
                    dump_dir: entry.dump_dir,
                    extra_flags: entry.flags.clone(),
                });
            }
            categories.insert(category.clone(), specs);
        }

        let catalog = Self { categories };
        if catalog.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(catalog)
    }

    /// Keep only the named categories. Names match case-insensitively.
    pub fn retain_categories(&self, wanted: &[String]) -> Result<Self, CatalogError> {
        let mut keep = HashSet::new();
        for name in wanted {
            let found = self
                .categories
                .keys()
                .find(|category| category.eq_ignore_ascii_case(name.trim()))
                .ok_or_else(|| CatalogError::UnknownCategory(name.clone()))?;
            keep.insert(found.clone());
        }

        let categories: IndexMap<String, Vec<ModuleSpec>> = self
            .categories
            .iter()
            .filter(|(category, _)| keep.contains(*category))
            .map(|(category, specs)| (category.clone(), specs.clone()))
            .collect();

        let narrowed = Self { categories };
        if narrowed.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(narrowed)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// All modules, category by category.
    pub fn modules(&self) -> impl Iterator<Item = &ModuleSpec> {
        self.categories.values().flatten()
    }

    pub fn get(&self, module: &str) -> Option<&ModuleSpec> {
        self.modules().find(|spec| spec.name == module)
    }

    pub fn len(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Module names become file names under the category directory and a bare
/// word on the tool's command line.
fn is_valid_module_name(name: &str) -> bool {
    name != "."
        && name != ".."
        && !name.starts_with('-')
        && !name.chars().any(|c| c == '/' || c == '\\' || c.is_control())
}

/// The built-in Windows catalog: modules known to run cleanly on Volatility
/// 2.6 images, grouped by the thematic categories of the Volatility command
/// reference.
pub fn default_catalog_entries() -> IndexMap<String, Vec<ModuleEntry>> {
    let mut catalog = IndexMap::new();

    catalog.insert(
        "Image Identification".to_string(),
        vec![ModuleEntry::new("kdbgscan")],
    );

    catalog.insert(
        "Processes and DLLs".to_string(),
        ["pslist", "psscan", "pstree", "dlllist", "getsids", "envars", "privs"]
            .into_iter()
            .map(ModuleEntry::new)
            .collect(),
    );

    catalog.insert(
        "Process Memory".to_string(),
        vec![
            ModuleEntry::new("vadinfo"),
            ModuleEntry::new("iehistory"),
            // Raw .evt files land in the dump directory
            ModuleEntry::new("evtlogs")
                .with_dump_dir()
                .with_flag("--save-evt"),
        ],
    );

    catalog.insert(
        "Kernel Memory and Objects".to_string(),
        ["modules", "modscan", "driverscan", "filescan", "mutantscan", "ssdt"]
            .into_iter()
            .map(ModuleEntry::new)
            .collect(),
    );

    catalog.insert(
        "Registry".to_string(),
        vec![ModuleEntry::new("hivelist"), ModuleEntry::new("hashdump")],
    );

    catalog.insert(
        "GUI".to_string(),
        vec![ModuleEntry::new("sessions"), ModuleEntry::new("clipboard")],
    );

    catalog.insert(
        "Malware".to_string(),
        vec![
            ModuleEntry::new("psxview"),
            ModuleEntry::new("devicetree"),
            ModuleEntry::new("ldrmodules"),
            ModuleEntry::new("malfind").with_dump_dir(),
            ModuleEntry::new("svcscan"),
        ],
    );

    catalog
}
