//! Interpreter discovery.
//!
//! The locator walks `SOFTWARE\Python` (then `SOFTWARE\Wow6432Node\Python`)
//! under each root scope of a [`ConfigStore`] looking for an `InstallPath`
//! key that names the interpreter. The walk is an explicit depth-first,
//! pre-order traversal; the first match wins.

pub mod memory;
#[cfg(windows)]
pub mod registry;
pub mod store;

use std::path::{Path, PathBuf};

use pyrunner_core::config::InterpreterConfig;

use crate::error::{Error, Result};
use crate::info_log;
use crate::installation::{InterpreterInstallation, PYTHON_EXECUTABLE};

pub use memory::{MemoryKey, MemoryStore};
pub use store::{ConfigKey, ConfigStore, RootScope};

/// Entry paths probed inside each root scope, in order.
pub const ENTRY_PATHS: [&str; 2] = [r"SOFTWARE\Python", r"SOFTWARE\Wow6432Node\Python"];

const INSTALL_PATH_KEY: &str = "InstallPath";
const EXECUTABLE_PATH_VALUE: &str = "ExecutablePath";

/// Searches a configuration store for an installed interpreter.
pub struct InterpreterLocator {
    store: Box<dyn ConfigStore>,
    executable_name: String,
}

impl InterpreterLocator {
    pub fn new(store: impl ConfigStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            executable_name: PYTHON_EXECUTABLE.to_string(),
        }
    }

    /// Locator over the host store: the registry on Windows, an empty store elsewhere.
    pub fn system() -> Self {
        #[cfg(windows)]
        return Self::new(registry::RegistryStore);
        #[cfg(not(windows))]
        return Self::new(MemoryStore::new());
    }

    /// Override the executable file name that counts as a match.
    pub fn with_executable_name(mut self, name: impl Into<String>) -> Self {
        self.executable_name = name.into();
        self
    }

    /// Probe every root scope and entry path; first hit wins.
    pub fn locate(&self) -> Result<InterpreterInstallation> {
        for scope in RootScope::SEARCH_ORDER {
            let Some(root) = self.store.open_root(scope) else {
                tracing::debug!(scope = scope.as_str(), "Root scope not available");
                continue;
            };
            for entry in ENTRY_PATHS {
                let Some(entry_key) = root.open_subkey(entry) else {
                    continue;
                };
                tracing::debug!(scope = scope.as_str(), entry, "Searching for interpreter");
                if let Some(found) = self.search(entry_key.as_ref()) {
                    info_log!(
                        scope = scope.as_str(),
                        path = %found.executable_path().display(),
                        "Python installation found"
                    );
                    return Ok(found);
                }
            }
        }
        tracing::warn!("Python installation not found in any configuration scope");
        Err(Error::InterpreterNotFound)
    }

    /// Iterative pre-order walk below `start` (the start key itself is not probed).
    fn search(&self, start: &dyn ConfigKey) -> Option<InterpreterInstallation> {
        let mut stack: Vec<Box<dyn ConfigKey>> = Vec::new();
        push_children(start, &mut stack);
        while let Some(key) = stack.pop() {
            if let Some(found) = self.probe(key.as_ref()) {
                return Some(found);
            }
            push_children(key.as_ref(), &mut stack);
        }
        None
    }

    fn probe(&self, key: &dyn ConfigKey) -> Option<InterpreterInstallation> {
        let install = key.open_subkey(INSTALL_PATH_KEY)?;

        if let Some(exe) = install.value(Some(EXECUTABLE_PATH_VALUE)) {
            if exe.ends_with(&self.executable_name) {
                match InterpreterInstallation::new(&exe) {
                    Ok(found) => return Some(found),
                    Err(_) => tracing::debug!(path = %exe, "Registered executable does not exist"),
                }
            }
        }

        let dir = install.value(None)?;
        self.find_in_dir(Path::new(&dir))
    }

    /// First non-empty file directly inside `dir` whose name ends with the
    /// executable name. Entries are visited in file-name order.
    fn find_in_dir(&self, dir: &Path) -> Option<InterpreterInstallation> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .ok()?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        files.sort();
        files
            .into_iter()
            .find(|p| {
                let name_matches = p
                    .file_name()
                    .map(|n| n.to_string_lossy().ends_with(&self.executable_name))
                    .unwrap_or(false);
                name_matches && std::fs::metadata(p).map(|m| m.len() > 0).unwrap_or(false)
            })
            .and_then(|p| InterpreterInstallation::new(p).ok())
    }
}

/// Open every child of `key` and push them so the first child pops first.
/// Children that cannot be opened are skipped.
fn push_children(key: &dyn ConfigKey, stack: &mut Vec<Box<dyn ConfigKey>>) {
    let mut opened = Vec::new();
    for name in key.subkey_names() {
        match key.open_subkey(&name) {
            Some(child) => opened.push(child),
            None => tracing::debug!(key = %name, "Skipping unreadable key"),
        }
    }
    stack.extend(opened.into_iter().rev());
}

/// Look the interpreter up on `PATH` (`python3`, then `python`).
pub fn locate_on_path() -> Result<InterpreterInstallation> {
    ["python3", "python"]
        .iter()
        .find_map(|name| which::which(name).ok())
        .ok_or(Error::InterpreterNotFound)
        .and_then(InterpreterInstallation::new)
}

/// Resolution order: explicit path from config, configuration store,
/// then `PATH` when the fallback is enabled.
pub fn resolve_interpreter(
    cfg: &InterpreterConfig,
    locator: &InterpreterLocator,
) -> Result<InterpreterInstallation> {
    if let Some(ref explicit) = cfg.python {
        return InterpreterInstallation::new(explicit);
    }
    match locator.locate() {
        Ok(found) => Ok(found),
        Err(Error::InterpreterNotFound) if cfg.path_fallback => {
            let found = locate_on_path()?;
            info_log!(path = %found.executable_path().display(), "Python found on PATH");
            Ok(found)
        }
        Err(e) => Err(e),
    }
}
