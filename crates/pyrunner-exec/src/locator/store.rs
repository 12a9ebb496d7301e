//! ConfigStore trait: read-only view of the host's hierarchical settings store.
//!
//! On Windows this is the registry (`registry::RegistryStore`). Tests and
//! non-Windows hosts use [`super::memory::MemoryStore`].

/// Top-level hive probed by the locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootScope {
    /// HKEY_CURRENT_USER
    CurrentUser,
    /// HKEY_LOCAL_MACHINE
    LocalMachine,
    /// HKEY_USERS
    Users,
}

impl RootScope {
    /// Probe order; earlier scopes win.
    pub const SEARCH_ORDER: [RootScope; 3] = [
        RootScope::CurrentUser,
        RootScope::LocalMachine,
        RootScope::Users,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RootScope::CurrentUser => "HKEY_CURRENT_USER",
            RootScope::LocalMachine => "HKEY_LOCAL_MACHINE",
            RootScope::Users => "HKEY_USERS",
        }
    }
}

/// An open key. Dropping it releases the underlying handle.
pub trait ConfigKey {
    /// Names of direct sub-keys in store enumeration order.
    /// Enumeration failures yield an empty list.
    fn subkey_names(&self) -> Vec<String>;

    /// Open a sub-key; `path` may contain `\`-separated segments.
    /// Returns `None` when the key is missing or access is denied.
    fn open_subkey(&self, path: &str) -> Option<Box<dyn ConfigKey>>;

    /// Read a string value. `None` as the name reads the default (unnamed) value.
    fn value(&self, name: Option<&str>) -> Option<String>;
}

/// Entry point into a configuration store.
pub trait ConfigStore {
    fn open_root(&self, scope: RootScope) -> Option<Box<dyn ConfigKey>>;
}
