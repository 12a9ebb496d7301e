//! In-memory configuration store: fixtures for tests and a stand-in on hosts
//! without a registry.

use std::collections::HashMap;

use super::store::{ConfigKey, ConfigStore, RootScope};

/// A key with ordered children. Sub-key names compare case-insensitively,
/// like registry keys.
#[derive(Debug, Clone, Default)]
pub struct MemoryKey {
    default_value: Option<String>,
    values: Vec<(String, String)>,
    children: Vec<(String, MemoryKey)>,
    denied: bool,
}

impl MemoryKey {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, name: &str, value: impl Into<String>) -> Self {
        self.values.push((name.to_string(), value.into()));
        self
    }

    pub fn with_default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Append a child; enumeration follows insertion order.
    pub fn with_child(mut self, name: &str, child: MemoryKey) -> Self {
        self.children.push((name.to_string(), child));
        self
    }

    /// Mark the key as unreadable: opening it fails like a permission error.
    pub fn denied(mut self) -> Self {
        self.denied = true;
        self
    }

    fn child(&self, name: &str) -> Option<&MemoryKey> {
        self.children
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, k)| k)
    }
}

impl ConfigKey for MemoryKey {
    fn subkey_names(&self) -> Vec<String> {
        self.children.iter().map(|(n, _)| n.clone()).collect()
    }

    fn open_subkey(&self, path: &str) -> Option<Box<dyn ConfigKey>> {
        let mut current = self;
        for segment in path.split('\\').filter(|s| !s.is_empty()) {
            current = current.child(segment)?;
            if current.denied {
                return None;
            }
        }
        Some(Box::new(current.clone()))
    }

    fn value(&self, name: Option<&str>) -> Option<String> {
        match name {
            None => self.default_value.clone(),
            Some(name) => self
                .values
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone()),
        }
    }
}

/// Store made of one [`MemoryKey`] tree per root scope.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    roots: HashMap<RootScope, MemoryKey>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(mut self, scope: RootScope, key: MemoryKey) -> Self {
        self.roots.insert(scope, key);
        self
    }
}

impl ConfigStore for MemoryStore {
    fn open_root(&self, scope: RootScope) -> Option<Box<dyn ConfigKey>> {
        self.roots
            .get(&scope)
            .filter(|k| !k.denied)
            .map(|k| Box::new(k.clone()) as Box<dyn ConfigKey>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_path_and_case_insensitive_names() {
        let root = MemoryKey::new().with_child(
            "SOFTWARE",
            MemoryKey::new().with_child("Python", MemoryKey::new().with_value("X", "1")),
        );
        let key = root.open_subkey(r"software\PYTHON").unwrap();
        assert_eq!(key.value(Some("x")).as_deref(), Some("1"));
        assert!(root.open_subkey(r"SOFTWARE\Missing").is_none());
    }

    #[test]
    fn test_denied_key_cannot_be_opened() {
        let root = MemoryKey::new().with_child("Locked", MemoryKey::new().denied());
        assert_eq!(root.subkey_names(), vec!["Locked".to_string()]);
        assert!(root.open_subkey("Locked").is_none());
    }
}
