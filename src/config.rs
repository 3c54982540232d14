//! Configuration loading and saving for sweeps

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::SweepError;
use crate::SweepConfig;

impl SweepConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, SweepError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| SweepError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<(), SweepError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| SweepError::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Defaults with `FIO_SWEEP_*` environment overrides applied.
pub fn load_with_defaults() -> SweepConfig {
    let mut config = SweepConfig::default();

    if let Ok(binary) = std::env::var("FIO_SWEEP_BINARY") {
        config.fio_binary = binary;
    }

    if let Ok(target) = std::env::var("FIO_SWEEP_TARGET_DIR") {
        config.target_dir = PathBuf::from(target);
    }

    if let Ok(runtime) = std::env::var("FIO_SWEEP_RUNTIME_SECS") {
        config.runtime_secs = runtime.parse().unwrap_or(config.runtime_secs);
    }

    if let Ok(timeout) = std::env::var("FIO_SWEEP_TIMEOUT_SECS") {
        match timeout.parse() {
            Ok(secs) => config.timeout_secs = Some(secs),
            Err(_) => warn!("ignoring unparseable FIO_SWEEP_TIMEOUT_SECS `{}`", timeout),
        }
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_matches_fio_invocation() {
        let config = SweepConfig::default();
        assert_eq!(config.ioengine, "sync");
        assert_eq!(config.file_size, "4m:6m");
        assert_eq!(config.nr_files, 10);
        assert_eq!(config.runtime_secs, 30);
        assert!(config.direct);
        assert!(config.timeout_secs.is_none());
    }

    #[test]
    fn test_unparseable_timeout_env_keeps_prior_value() {
        std::env::set_var("FIO_SWEEP_TIMEOUT_SECS", "soon");
        let config = load_with_defaults();
        assert_eq!(config.timeout_secs, None);
        std::env::remove_var("FIO_SWEEP_TIMEOUT_SECS");
    }

    #[test]
    fn test_config_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sweep.toml");

        let mut config = SweepConfig::default();
        config.runtime_secs = 5;
        config.timeout_secs = Some(120);
        config.to_file(&path).unwrap();

        let loaded = SweepConfig::from_file(&path).unwrap();
        assert_eq!(loaded.runtime_secs, 5);
        assert_eq!(loaded.timeout_secs, Some(120));
        assert_eq!(loaded.fio_binary, config.fio_binary);
    }

    #[test]
    fn test_invalid_config_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sweep.toml");
        std::fs::write(&path, "runtime_secs = \"not a number\"").unwrap();
        assert!(matches!(
            SweepConfig::from_file(&path),
            Err(SweepError::Config(_))
        ));
    }
}
