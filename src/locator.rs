//! Module location
//!
//! Resolves logical module names into their on-disk source roots and answers
//! "does this file path belong to module set X".
//!
//! Rust has no runtime import, so a module is a source directory found under
//! a search root. The default search roots are the cargo registry source
//! directories and the current directory, which is where frame file paths of
//! dependency crates and workspace crates point.

use crate::config::WatchConfig;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A named module resolved to its absolute directory
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchedRoot {
    /// Module name as declared in the configuration
    pub name: String,
    /// Absolute directory used as a prefix-match root
    pub path: PathBuf,
}

impl WatchedRoot {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// A watched module name that could not be resolved
#[derive(Error, Debug)]
pub enum LocateError {
    #[error("Module '{name}' not found ({searched} search roots tried)")]
    NotFound { name: String, searched: usize },

    #[error("Failed to resolve module '{name}' at {}: {source}", path.display())]
    Io {
        name: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Resolves a module name to the directory containing it
pub trait ModuleLocator: Send + Sync {
    fn locate(&self, name: &str) -> Result<PathBuf, LocateError>;
}

/// Resolve every name, keeping declaration order and dropping duplicate paths
pub fn resolve(
    locator: &dyn ModuleLocator,
    names: &[String],
) -> Result<Vec<WatchedRoot>, LocateError> {
    let mut roots: Vec<WatchedRoot> = Vec::with_capacity(names.len());

    for name in names {
        let path = locator.locate(name)?;
        if roots.iter().any(|root| root.path == path) {
            tracing::debug!(module = %name, path = %path.display(), "duplicate module root skipped");
            continue;
        }
        roots.push(WatchedRoot::new(name.as_str(), path));
    }

    Ok(roots)
}

/// True iff `path` lies under any of `roots`
///
/// Component-wise prefix test, so `/pkg/nova` never matches `/pkg/novaclient`.
pub fn path_in_set(path: &Path, roots: &[WatchedRoot]) -> bool {
    roots.iter().any(|root| path.starts_with(&root.path))
}

/// Looks modules up as directories under an ordered list of search roots
#[derive(Debug, Clone)]
pub struct SearchPathLocator {
    roots: Vec<PathBuf>,
}

impl SearchPathLocator {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// Cargo registry source directories followed by the current directory
    pub fn from_env() -> Self {
        let mut roots = Vec::new();

        let cargo_home = env::var_os("CARGO_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".cargo")));

        if let Some(cargo_home) = cargo_home {
            if let Ok(entries) = fs::read_dir(cargo_home.join("registry").join("src")) {
                let mut registries: Vec<PathBuf> = entries
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.path())
                    .filter(|path| path.is_dir())
                    .collect();
                registries.sort();
                roots.extend(registries);
            }
        }

        if let Ok(cwd) = env::current_dir() {
            roots.push(cwd);
        }

        Self { roots }
    }

    /// Configured search directories first, then the [`from_env`](Self::from_env) roots
    pub fn for_config(config: &WatchConfig) -> Self {
        let mut roots = config.search_path.clone();
        roots.extend(Self::from_env().roots);
        Self { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// `foo_bar` is also looked up as `foo-bar` (crate directory naming)
    fn spellings(name: &str) -> Vec<String> {
        let mut spellings = vec![name.to_string()];
        let dashed = name.replace('_', "-");
        if dashed != name {
            spellings.push(dashed);
        }
        spellings
    }

    /// Newest `name-<version>` directory under `root`, by reverse lexical order
    fn versioned_dir(root: &Path, name: &str) -> Option<PathBuf> {
        let prefix = format!("{}-", name);
        let entries = fs::read_dir(root).ok()?;

        let mut matches: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .and_then(|file_name| file_name.strip_prefix(&prefix))
                    .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
            })
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();

        matches.sort();
        matches.pop()
    }

    fn canonical(name: &str, path: &Path) -> Result<PathBuf, LocateError> {
        fs::canonicalize(path).map_err(|source| LocateError::Io {
            name: name.to_string(),
            path: path.to_path_buf(),
            source,
        })
    }
}

impl ModuleLocator for SearchPathLocator {
    fn locate(&self, name: &str) -> Result<PathBuf, LocateError> {
        let spellings = Self::spellings(name);

        for root in &self.roots {
            for spelling in &spellings {
                let exact = root.join(spelling);
                if exact.is_dir() {
                    return Self::canonical(name, &exact);
                }
            }
            for spelling in &spellings {
                if let Some(versioned) = Self::versioned_dir(root, spelling) {
                    return Self::canonical(name, &versioned);
                }
            }
        }

        Err(LocateError::NotFound {
            name: name.to_string(),
            searched: self.roots.len(),
        })
    }
}

/// Fixed name → directory table
///
/// Paths are made absolute without touching the filesystem.
#[derive(Debug, Clone, Default)]
pub struct StaticLocator {
    modules: HashMap<String, PathBuf>,
}

impl StaticLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.modules.insert(name.into(), path.into());
        self
    }
}

impl ModuleLocator for StaticLocator {
    fn locate(&self, name: &str) -> Result<PathBuf, LocateError> {
        let path = self.modules.get(name).ok_or_else(|| LocateError::NotFound {
            name: name.to_string(),
            searched: 1,
        })?;

        std::path::absolute(path).map_err(|source| LocateError::Io {
            name: name.to_string(),
            path: path.clone(),
            source,
        })
    }
}
