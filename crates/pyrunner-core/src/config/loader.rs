//! Environment variable loading.
//!
//! Fallback chains live here so callers never repeat `or_else` ladders.

use std::env;
use std::ffi::OsStr;
use std::path::Path;

/// Load `.env` from the current directory once (never overrides set variables).
pub fn load_dotenv() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let dir = env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));
        load_dotenv_from_dir(&dir);
    });
}

/// Load `<dir>/.env` into the process environment. Existing variables win.
///
/// Returns the number of variables that were set.
pub fn load_dotenv_from_dir(dir: &Path) -> usize {
    let Ok(content) = std::fs::read_to_string(dir.join(".env")) else {
        return 0;
    };
    let mut applied = 0;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(eq_pos) = line.find('=') else {
            continue;
        };
        let key = line[..eq_pos].trim();
        let mut value = line[eq_pos + 1..].trim();
        // Strip inline comment (# not inside quotes)
        if let Some(hash_pos) = value.find('#') {
            let before_hash = value[..hash_pos].trim_end();
            if !before_hash.contains('"') && !before_hash.contains('\'') {
                value = before_hash;
            }
        }
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            value = &value[1..value.len() - 1];
        }
        if !key.is_empty() && env::var(key).is_err() {
            set_env_var(key, value);
            applied += 1;
        }
    }
    applied
}

/// Read the primary variable or the first set alias; empty counts as unset.
pub fn env_or<F>(primary: &str, aliases: &[&str], default: F) -> String
where
    F: FnOnce() -> String,
{
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(default)
}

/// Like [`env_or`] but returns `None` for unset or blank values.
pub fn env_optional(primary: &str, aliases: &[&str]) -> Option<String> {
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .and_then(|s| {
            let s = s.trim().to_string();
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        })
}

/// Boolean variable: 0/false/no/off are false, anything else set is true.
pub fn env_bool(primary: &str, aliases: &[&str], default: bool) -> bool {
    let v = env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()));
    match v.as_deref() {
        Some(s) => !matches!(
            s.trim().to_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ),
        None => default,
    }
}

// ─── env::set_var / remove_var wrappers ─────────────────────────────────────
//
// All process environment mutation goes through these two functions.
// SAFETY: callers mutate the environment before spawning worker threads.

#[allow(unsafe_code, unused_unsafe)]
pub fn set_env_var(key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) {
    unsafe { env::set_var(key, value) };
}

#[allow(unsafe_code, unused_unsafe)]
pub fn remove_env_var(key: &str) {
    unsafe { env::remove_var(key) };
}

/// RAII guard: removes the variable on drop via [`remove_env_var`].
pub struct ScopedEnvGuard(pub &'static str);

impl Drop for ScopedEnvGuard {
    fn drop(&mut self) {
        remove_env_var(self.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_optional_treats_blank_as_unset() {
        set_env_var("PYRUNNER_TEST_BLANK", "   ");
        let _g = ScopedEnvGuard("PYRUNNER_TEST_BLANK");
        assert_eq!(env_optional("PYRUNNER_TEST_BLANK", &[]), None);
    }

    #[test]
    fn test_env_or_uses_alias_then_default() {
        set_env_var("PYRUNNER_TEST_ALIAS_B", "from-alias");
        let _g = ScopedEnvGuard("PYRUNNER_TEST_ALIAS_B");
        let v = env_or("PYRUNNER_TEST_ALIAS_A", &["PYRUNNER_TEST_ALIAS_B"], || {
            "default".to_string()
        });
        assert_eq!(v, "from-alias");
        let d = env_or("PYRUNNER_TEST_ALIAS_MISSING", &[], || "default".to_string());
        assert_eq!(d, "default");
    }

    #[test]
    fn test_env_bool_parsing() {
        set_env_var("PYRUNNER_TEST_BOOL", "off");
        let _g = ScopedEnvGuard("PYRUNNER_TEST_BOOL");
        assert!(!env_bool("PYRUNNER_TEST_BOOL", &[], true));
        assert!(env_bool("PYRUNNER_TEST_BOOL_MISSING", &[], true));
    }

    #[test]
    fn test_load_dotenv_from_dir_keeps_existing_values() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(".env"),
            "# comment\nPYRUNNER_TEST_DOTENV_NEW=\"quoted\"\nPYRUNNER_TEST_DOTENV_OLD=new # trailing\n",
        )
        .unwrap();
        set_env_var("PYRUNNER_TEST_DOTENV_OLD", "old");
        let _g1 = ScopedEnvGuard("PYRUNNER_TEST_DOTENV_OLD");
        let _g2 = ScopedEnvGuard("PYRUNNER_TEST_DOTENV_NEW");

        let applied = load_dotenv_from_dir(tmp.path());
        assert_eq!(applied, 1);
        assert_eq!(env::var("PYRUNNER_TEST_DOTENV_NEW").unwrap(), "quoted");
        assert_eq!(env::var("PYRUNNER_TEST_DOTENV_OLD").unwrap(), "old");
    }
}
