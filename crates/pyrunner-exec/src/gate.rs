//! VersionGate trait: refuses to run a stale build before any discovery happens.

use pyrunner_core::config::GateConfig;

use crate::error::{Error, Result};

/// Build version of this crate.
pub const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Consulted once before the interpreter is searched for.
pub trait VersionGate {
    /// `Err(Error::OutOfDate)` when `current` must not be used.
    fn check(&self, current: &str) -> Result<()>;
}

/// Accepts every build.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysCurrent;

impl VersionGate for AlwaysCurrent {
    fn check(&self, _current: &str) -> Result<()> {
        Ok(())
    }
}

/// Rejects builds older than a configured minimum.
#[derive(Debug, Clone, Default)]
pub struct MinimumVersionGate {
    minimum: Option<String>,
}

impl MinimumVersionGate {
    pub fn new(minimum: impl Into<String>) -> Self {
        Self {
            minimum: Some(minimum.into()),
        }
    }

    /// No minimum configured means every build passes.
    pub fn from_config(cfg: &GateConfig) -> Self {
        Self {
            minimum: cfg.min_version.clone(),
        }
    }
}

impl VersionGate for MinimumVersionGate {
    fn check(&self, current: &str) -> Result<()> {
        let Some(ref minimum) = self.minimum else {
            return Ok(());
        };
        if version_components(current) < version_components(minimum) {
            tracing::warn!(current, minimum = %minimum, "Build is out of date");
            return Err(Error::OutOfDate {
                current: current.to_string(),
                required: minimum.clone(),
            });
        }
        Ok(())
    }
}

/// "1.2.10-beta" -> [1, 2, 10]; non-numeric parts count as 0.
fn version_components(version: &str) -> Vec<u64> {
    let core = version.trim().trim_start_matches('v');
    let core = core.split(['-', '+']).next().unwrap_or("");
    let mut parts: Vec<u64> = core
        .split('.')
        .map(|p| p.parse::<u64>().unwrap_or(0))
        .collect();
    while parts.len() > 1 && parts.last() == Some(&0) {
        parts.pop();
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimum_gate_compares_numerically() {
        let gate = MinimumVersionGate::new("1.2.10");
        assert!(gate.check("1.2.9").is_err());
        assert!(gate.check("1.2.10").is_ok());
        assert!(gate.check("1.10.0").is_ok());
        assert!(matches!(gate.check("0.9"), Err(Error::OutOfDate { .. })));
    }

    #[test]
    fn test_trailing_zeros_and_prerelease() {
        let gate = MinimumVersionGate::new("2.0");
        assert!(gate.check("2.0.0").is_ok());
        assert!(gate.check("v2.0.0-rc1").is_ok());
    }

    #[test]
    fn test_unconfigured_gate_passes() {
        let gate = MinimumVersionGate::from_config(&GateConfig::default());
        assert!(gate.check("0.0.1").is_ok());
        assert!(AlwaysCurrent.check("anything").is_ok());
    }
}
