use crate::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

#[instrument(skip(path))]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CarMatchConfig> {
    let path = path.as_ref();
    info!("Loading configuration from: {:?}", path);

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    debug!("Config file content length: {} bytes", content.len());

    parse_config(&content)
}

/// Parse configuration text after environment variable substitution
pub fn parse_config(content: &str) -> Result<CarMatchConfig> {
    let substituted = substitution::substitute_env_vars(content)?;
    debug!("Environment variable substitution completed");

    let config: CarMatchConfig = serde_yaml::from_str(&substituted)
        .with_context(|| "Failed to parse YAML configuration")?;

    info!("Configuration loaded successfully");
    Ok(config)
}

#[instrument]
pub fn generate_default_config() -> CarMatchConfig {
    CarMatchConfig {
        marketplace: MarketplaceConfig {
            name: "My Vehicle Marketplace".to_string(),
            description: "Buy and sell cars and bikes".to_string(),
            version: default_version(),
        },
        store: StoreConfig::default(),
        notifications: NotificationsConfig {
            recheck_delay_seconds: default_recheck_delay_seconds(),
            profile_storage: ProfileStorageConfig {
                storage_type: "file".to_string(),
                path: Some(".carmatch/profile.json".to_string()),
            },
        },
        logging: LoggingConfig::default(),
        metrics: MetricsConfig {
            enabled: false,
            port: default_metrics_port(),
        },
    }
}

#[instrument(skip(config))]
pub fn save_config<P: AsRef<Path> + std::fmt::Debug>(config: &CarMatchConfig, path: P) -> Result<()> {
    let path = path.as_ref();
    info!("Saving configuration to: {:?}", path);

    let yaml = serde_yaml::to_string(config)
        .with_context(|| "Failed to serialize configuration to YAML")?;

    fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    info!("Configuration saved successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_then_load_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("carmatch.yaml");

        let config = generate_default_config();
        save_config(&config, &path).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.marketplace.name, config.marketplace.name);
        assert_eq!(loaded.notifications.profile_storage.storage_type, "file");
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(dir.path().join("nope.yaml")).is_err());
    }

    #[test]
    fn test_parse_substitutes_env_vars() {
        std::env::set_var("CARMATCH_TEST_MARKET_NAME", "Substituted");
        let cfg = parse_config("marketplace:\n  name: ${CARMATCH_TEST_MARKET_NAME}\n").unwrap();
        assert_eq!(cfg.marketplace.name, "Substituted");
    }
}
