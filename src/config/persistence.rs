//! Config file load, save, and migration logic.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::types::DaemonConfig;

/// Migrate config to current version (renames deprecated keys, adds new
/// fields) so configs written by older builds keep loading.
pub(crate) fn migrate_config(config_path: &Path) -> Result<bool> {
    if !config_path.exists() {
        return Ok(false);
    }

    let content = std::fs::read_to_string(config_path)?;
    let mut json: serde_json::Value = serde_json::from_str(&content)?;
    let mut migrated = false;

    if let Some(polling) = json.get_mut("polling").and_then(|p| p.as_object_mut()) {
        // === RENAMES ===
        if let Some(value) = polling.remove("poll_interval") {
            polling.insert("poll_interval_ms".to_string(), value);
            info!("Migrated: renamed 'poll_interval' to 'poll_interval_ms'");
            migrated = true;
        }

        // === ADDITIONS ===
        if !polling.contains_key("poll_batch_size") {
            polling.insert("poll_batch_size".to_string(), serde_json::json!(1));
            info!("Migrated: added 'poll_batch_size' with default 1");
            migrated = true;
        }
    }

    if migrated {
        std::fs::write(config_path, serde_json::to_string_pretty(&json)?)?;
        info!("Config migrated to latest version: {:?}", config_path);
    }

    Ok(migrated)
}

fn default_config_path() -> Result<PathBuf> {
    let exe_dir = std::env::current_exe()?
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Cannot determine executable directory"))?
        .to_path_buf();
    Ok(exe_dir.join("config.json"))
}

pub async fn load_config(path: Option<&str>) -> Result<DaemonConfig> {
    let config_path = match path {
        Some(p) => PathBuf::from(p),
        None => default_config_path()?,
    };

    if !config_path.exists() {
        warn!("No config file at {:?}, using defaults", config_path);
        return Ok(DaemonConfig::default());
    }

    migrate_config(&config_path)?;

    let content = tokio::fs::read_to_string(&config_path)
        .await
        .context(format!("Failed to read config file: {:?}", config_path))?;
    let config: DaemonConfig = serde_json::from_str(&content)
        .context(format!("Invalid config file: {:?}", config_path))?;
    info!("Loaded configuration from {:?}", config_path);
    Ok(config)
}

pub async fn save_config(config: &DaemonConfig, path: Option<&str>) -> Result<()> {
    let config_path = match path {
        Some(p) => PathBuf::from(p),
        None => default_config_path()?,
    };
    let json = serde_json::to_string_pretty(config)?;
    tokio::fs::write(&config_path, json)
        .await
        .context(format!("Failed to write config file: {:?}", config_path))?;
    info!("Saved configuration to {:?}", config_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_falls_back_to_defaults() {
        let config = load_config(Some("/nonexistent/config.json")).await.unwrap();
        assert_eq!(config.polling.poll_interval_ms, 250);
        assert_eq!(config.polling.poll_batch_size, 1);
    }

    #[tokio::test]
    async fn legacy_poll_interval_key_is_migrated() {
        let dir = std::env::temp_dir().join(format!("platmond-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(
            &path,
            r#"{
                "daemon": { "name": "platmond", "log_level": "INFO" },
                "polling": { "poll_interval": 500 },
                "transport": { "backend": "sim", "sim_termini": 1, "sim_sensors_per_terminus": 1 },
                "logging": {
                    "enable_file_logging": false,
                    "log_file": "/tmp/test.log",
                    "max_log_size_mb": 1,
                    "log_retention_days": 1
                }
            }"#,
        )
        .unwrap();

        let config = load_config(Some(path.to_str().unwrap())).await.unwrap();
        assert_eq!(config.polling.poll_interval_ms, 500);
        assert_eq!(config.polling.poll_batch_size, 1);

        std::fs::remove_dir_all(&dir).ok();
    }
}
