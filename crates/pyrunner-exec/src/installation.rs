use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Canonical interpreter executable name searched for in the configuration store.
#[cfg(windows)]
pub const PYTHON_EXECUTABLE: &str = "python.exe";
#[cfg(not(windows))]
pub const PYTHON_EXECUTABLE: &str = "python";

/// One discovered interpreter. Immutable once constructed.
///
/// The file is checked when the value is built; it can still disappear before
/// a run starts, in which case spawning fails with [`Error::Spawn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterInstallation {
    executable_path: PathBuf,
}

impl InterpreterInstallation {
    /// Wrap an existing interpreter file.
    pub fn new(executable_path: impl Into<PathBuf>) -> Result<Self> {
        let executable_path = executable_path.into();
        if executable_path.as_os_str().is_empty() || !executable_path.is_file() {
            return Err(Error::InterpreterMissing(executable_path));
        }
        Ok(Self { executable_path })
    }

    pub fn executable_path(&self) -> &Path {
        &self.executable_path
    }

    /// Directory holding the executable.
    pub fn install_root(&self) -> &Path {
        self.executable_path.parent().unwrap_or_else(|| Path::new(""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_root_is_parent_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let exe = tmp.path().join(PYTHON_EXECUTABLE);
        std::fs::write(&exe, b"bin").unwrap();

        let inst = InterpreterInstallation::new(&exe).unwrap();
        assert_eq!(inst.executable_path(), exe.as_path());
        assert_eq!(inst.install_root(), tmp.path());
    }

    #[test]
    fn test_missing_file_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let err = InterpreterInstallation::new(tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::InterpreterMissing(_)));
        assert!(InterpreterInstallation::new("").is_err());
    }
}
