//! Put the interpreter's directories on the executable search path.
//!
//! `apply` never fails loudly: every problem is logged and reported as
//! `false`, so callers cannot tell "permission denied" from other failures.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use pyrunner_core::observability;

use crate::installation::InterpreterInstallation;

/// Name of the search-path variable.
#[cfg(windows)]
pub const PATH_VARIABLE: &str = "Path";
#[cfg(not(windows))]
pub const PATH_VARIABLE: &str = "PATH";

/// Separator between search-path entries.
#[cfg(windows)]
pub const PATH_LIST_SEPARATOR: char = ';';
#[cfg(not(windows))]
pub const PATH_LIST_SEPARATOR: char = ':';

/// Persistence breadth of a variable update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathScope {
    /// Current process only.
    Process,
    /// Current user, persisted.
    User,
    /// Whole machine, persisted (needs elevation).
    Machine,
}

impl PathScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathScope::Process => "process",
            PathScope::User => "user",
            PathScope::Machine => "machine",
        }
    }
}

impl FromStr for PathScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "process" => Ok(PathScope::Process),
            "user" => Ok(PathScope::User),
            "machine" => Ok(PathScope::Machine),
            other => Err(format!("unknown scope '{}' (expected process, user or machine)", other)),
        }
    }
}

/// Read/write access to the search-path variable at a scope.
pub trait PathVariableStore {
    fn read(&self, scope: PathScope) -> io::Result<Option<String>>;
    fn write(&self, scope: PathScope, value: &str) -> io::Result<()>;
}

/// The real environment. User and machine scopes are persisted in the
/// registry on Windows and unsupported elsewhere.
#[derive(Debug, Clone)]
pub struct SystemPathVariables {
    variable: String,
}

impl Default for SystemPathVariables {
    fn default() -> Self {
        Self {
            variable: PATH_VARIABLE.to_string(),
        }
    }
}

impl SystemPathVariables {
    /// Same backends, different variable name.
    pub fn for_variable(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
        }
    }
}

#[cfg(windows)]
const USER_ENVIRONMENT_KEY: &str = "Environment";
#[cfg(windows)]
const MACHINE_ENVIRONMENT_KEY: &str = r"SYSTEM\CurrentControlSet\Control\Session Manager\Environment";

#[cfg(windows)]
fn environment_key(scope: PathScope, access: u32) -> io::Result<crate::locator::registry::RegKey> {
    use crate::locator::registry::RegKey;
    use crate::locator::RootScope;
    match scope {
        PathScope::User => RegKey::root(RootScope::CurrentUser).open(USER_ENVIRONMENT_KEY, access),
        PathScope::Machine => {
            RegKey::root(RootScope::LocalMachine).open(MACHINE_ENVIRONMENT_KEY, access)
        }
        PathScope::Process => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "process scope has no registry key",
        )),
    }
}

#[cfg(not(windows))]
fn unsupported_scope(scope: PathScope) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("{} scope is only persisted on Windows", scope.as_str()),
    )
}

impl PathVariableStore for SystemPathVariables {
    fn read(&self, scope: PathScope) -> io::Result<Option<String>> {
        if scope == PathScope::Process {
            return match std::env::var_os(&self.variable) {
                None => Ok(None),
                Some(value) => value.into_string().map(Some).map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("{} is not valid Unicode", self.variable),
                    )
                }),
            };
        }
        #[cfg(windows)]
        {
            use windows_sys::Win32::System::Registry::KEY_QUERY_VALUE;
            let key = environment_key(scope, KEY_QUERY_VALUE)?;
            return Ok(key.string_value(Some(&self.variable)).map(|(v, _)| v));
        }
        #[cfg(not(windows))]
        return Err(unsupported_scope(scope));
    }

    fn write(&self, scope: PathScope, value: &str) -> io::Result<()> {
        if scope == PathScope::Process {
            pyrunner_core::config::set_env_var(&self.variable, value);
            return Ok(());
        }
        #[cfg(windows)]
        {
            use windows_sys::Win32::System::Registry::{
                KEY_QUERY_VALUE, KEY_SET_VALUE, REG_EXPAND_SZ, REG_SZ,
            };
            let key = environment_key(scope, KEY_QUERY_VALUE | KEY_SET_VALUE)?;
            let existing_kind = key.string_value(Some(&self.variable)).map(|(_, k)| k);
            let kind = if existing_kind == Some(REG_EXPAND_SZ) || value.contains('%') {
                REG_EXPAND_SZ
            } else {
                REG_SZ
            };
            key.set_string_value(&self.variable, value, kind)?;
            crate::locator::registry::broadcast_environment_change();
            return Ok(());
        }
        #[cfg(not(windows))]
        return Err(unsupported_scope(scope));
    }
}

/// Variable values held in memory, one per scope.
#[derive(Debug, Default)]
pub struct MemoryPathVariables {
    values: Mutex<HashMap<PathScope, String>>,
}

impl MemoryPathVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(self, scope: PathScope, value: &str) -> Self {
        if let Ok(mut values) = self.values.lock() {
            values.insert(scope, value.to_string());
        }
        self
    }

    pub fn get(&self, scope: PathScope) -> Option<String> {
        self.values.lock().ok()?.get(&scope).cloned()
    }
}

impl PathVariableStore for MemoryPathVariables {
    fn read(&self, scope: PathScope) -> io::Result<Option<String>> {
        Ok(self.get(scope))
    }

    fn write(&self, scope: PathScope, value: &str) -> io::Result<()> {
        self.values
            .lock()
            .map_err(|_| io::Error::other("path variable store poisoned"))?
            .insert(scope, value.to_string());
        Ok(())
    }
}

/// Directories that must be on the search path for `install_root`.
///
/// Anaconda layouts (any "anaconda" in the path, case-insensitive) also need
/// the `Library` binary folders.
pub fn required_directories(install_root: &Path) -> Vec<String> {
    let mut dirs = vec![install_root.to_path_buf(), install_root.join("Scripts")];
    if install_root
        .to_string_lossy()
        .to_lowercase()
        .contains("anaconda")
    {
        let library = install_root.join("Library");
        dirs.push(library.join("bin"));
        dirs.push(library.join("usr").join("bin"));
        dirs.push(library.join("mingw-w64").join("bin"));
    }
    dirs.into_iter()
        .map(|d| d.to_string_lossy().to_string())
        .collect()
}

/// Merge `required` into the current variable value.
///
/// Blank and repeated entries are dropped, the first appearance keeps its
/// position and missing entries are appended (exact, case-sensitive
/// comparison). Returns the new value and the entries that were added.
pub fn merge_path_entries(current: Option<&str>, required: &[String]) -> (String, Vec<String>) {
    let mut entries: Vec<String> = Vec::new();
    for entry in current
        .unwrap_or_default()
        .split(PATH_LIST_SEPARATOR)
        .filter(|e| !e.trim().is_empty())
    {
        if !entries.iter().any(|e| e == entry) {
            entries.push(entry.to_string());
        }
    }
    let mut added = Vec::new();
    for dir in required {
        if !entries.iter().any(|e| e == dir) {
            entries.push(dir.clone());
            added.push(dir.clone());
        }
    }
    (entries.join(&PATH_LIST_SEPARATOR.to_string()), added)
}

/// Adds an interpreter's directories to the search-path variable.
pub struct EnvironmentConfigurator<S: PathVariableStore = SystemPathVariables> {
    installation: InterpreterInstallation,
    store: S,
    has_console: bool,
}

impl EnvironmentConfigurator<SystemPathVariables> {
    pub fn new(installation: InterpreterInstallation, has_console: bool) -> Self {
        Self::with_store(installation, SystemPathVariables::default(), has_console)
    }
}

impl<S: PathVariableStore> EnvironmentConfigurator<S> {
    /// `has_console` enables the per-directory progress lines on stdout.
    pub fn with_store(installation: InterpreterInstallation, store: S, has_console: bool) -> Self {
        Self {
            installation,
            store,
            has_console,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn required_directories(&self) -> Vec<String> {
        required_directories(self.installation.install_root())
    }

    /// Merge the required directories into the variable at `scope`.
    /// Returns `false` on any failure; the cause is logged.
    pub fn apply(&self, scope: PathScope) -> bool {
        match self.try_apply(scope) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(scope = scope.as_str(), error = %e, "Search path update failed");
                false
            }
        }
    }

    fn try_apply(&self, scope: PathScope) -> io::Result<()> {
        let required = self.required_directories();
        let current = self.store.read(scope)?;
        let (merged, added) = merge_path_entries(current.as_deref(), &required);

        for dir in &required {
            if added.contains(dir) {
                tracing::debug!(dir = %dir, scope = scope.as_str(), "Adding to search path");
                if self.has_console {
                    println!("Adding {} to {}...", dir, PATH_VARIABLE);
                }
            } else if self.has_console {
                println!(
                    "Tried adding {} to {} but it was already there...",
                    dir, PATH_VARIABLE
                );
            }
        }

        if current.as_deref() == Some(merged.as_str()) {
            return Ok(());
        }
        self.store.write(scope, &merged)?;
        observability::audit_path_updated(scope.as_str(), PATH_VARIABLE, &added);
        Ok(())
    }
}
