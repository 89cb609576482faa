//! YAML configuration loading and saving.
//!
//! The file location comes from `CONFIG_PATH` when set, otherwise
//! `config.yaml` next to the executable. A missing file is created with
//! defaults so a fresh install starts with a documented configuration.

use std::path::{Path, PathBuf};

use gravity_types::models::AppConfig;

use crate::error::{AppError, AppResult};

const CONFIG_FILE: &str = "config.yaml";

/// Resolve the configuration file path, honoring the `CONFIG_PATH` override.
pub fn resolve_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("CONFIG_PATH") {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(CONFIG_FILE)))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
}

/// Load configuration from `path`, writing defaults when the file is absent.
pub fn load(path: &Path) -> AppResult<AppConfig> {
    if !path.exists() {
        let config = AppConfig::default();
        save(path, &config)?;
        tracing::info!("created default configuration at {}", path.display());
        return Ok(config);
    }

    let content = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&content)
        .map_err(|e| AppError::Config(format!("failed to parse {}: {}", path.display(), e)))
}

/// Save configuration to `path`.
pub fn save(path: &Path, config: &AppConfig) -> AppResult<()> {
    let content = serde_yaml::to_string(config)
        .map_err(|e| AppError::Config(format!("failed to serialize config: {}", e)))?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let config = load(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.server.port, 8045);

        // A second load reads the file that was just written.
        let reloaded = load(&path).unwrap();
        assert_eq!(reloaded.server.api_key, config.server.api_key);
    }

    #[test]
    fn test_load_rejects_malformed_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "server: [not a mapping").unwrap();
        assert!(load(&path).is_err());
    }
}
