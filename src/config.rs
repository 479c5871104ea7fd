use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an optional TOML config file.
pub const CONFIG_ENV: &str = "STATE_WRITER_CONFIG";

/// Top-level configuration loaded from the file named by `STATE_WRITER_CONFIG`.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub cadence: CadenceConfig,
    pub log: LogConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CadenceConfig {
    pub interval_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self { interval_ms: 1000 }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl CadenceConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    Invalid {
        path: PathBuf,
        reason: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config {}: {}", path.display(), source)
            }
            ConfigError::Invalid { path, reason } => {
                write!(f, "invalid config {}: {}", path.display(), reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Invalid { .. } => None,
        }
    }
}

impl AppConfig {
    /// Read, parse and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: AppConfig = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate(path)?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise fall back to defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Resolve using the path in `STATE_WRITER_CONFIG`, if set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        Self::resolve(path.as_deref())
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        if self.cadence.interval_ms == 0 {
            return Err(ConfigError::Invalid {
                path: path.to_path_buf(),
                reason: "cadence.interval_ms must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_config(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("state-writer.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.cadence.interval_ms, 1000);
        assert_eq!(config.cadence.interval(), Duration::from_secs(1));
        assert_eq!(config.log.level, "warn");
    }

    #[test]
    fn test_resolve_none_uses_defaults() {
        let config = AppConfig::resolve(None).unwrap();
        assert_eq!(config.cadence.interval_ms, 1000);
    }

    #[test]
    fn test_load_full_config() {
        let dir = tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "[cadence]\ninterval_ms = 250\n\n[log]\nlevel = \"debug\"\n",
        );

        let config = AppConfig::load(&path).unwrap();

        assert_eq!(config.cadence.interval(), Duration::from_millis(250));
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_load_partial_config_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = write_config(dir.path(), "[log]\nlevel = \"info\"\n");

        let config = AppConfig::load(&path).unwrap();

        assert_eq!(config.cadence.interval_ms, 1000);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_load_empty_file_is_default() {
        let dir = tempdir().unwrap();
        let path = write_config(dir.path(), "");

        let config = AppConfig::load(&path).unwrap();

        assert_eq!(config.cadence.interval_ms, 1000);
        assert_eq!(config.log.level, "warn");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = AppConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("failed to read config"));
    }

    #[test]
    fn test_load_malformed_toml() {
        let dir = tempdir().unwrap();
        let path = write_config(dir.path(), "[cadence\ninterval_ms = ");

        let err = AppConfig::load(&path).unwrap_err();

        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_wrong_type() {
        let dir = tempdir().unwrap();
        let path = write_config(dir.path(), "[cadence]\ninterval_ms = \"fast\"\n");

        let err = AppConfig::load(&path).unwrap_err();

        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_rejects_zero_interval() {
        let dir = tempdir().unwrap();
        let path = write_config(dir.path(), "[cadence]\ninterval_ms = 0\n");

        let err = AppConfig::load(&path).unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert!(err.to_string().contains("interval_ms must be greater than 0"));
    }
}
