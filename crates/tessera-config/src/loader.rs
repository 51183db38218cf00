//! Configuration loader with layered sources.

use crate::{format_validation_errors, AppConfig, ConfigValidator};
use config::{Config, ConfigError, Environment, File};
use std::path::Path;
use std::sync::Arc;
use tessera_core::TesseraError;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Environment variable selecting the environment-specific file.
pub const ENVIRONMENT_VAR: &str = "TESSERA_ENVIRONMENT";

/// Configuration loader with runtime refresh support.
#[derive(Clone)]
pub struct ConfigLoader {
    config: Arc<RwLock<AppConfig>>,
    config_dir: String,
    environment: String,
}

impl ConfigLoader {
    /// Loads configuration for the environment named by `TESSERA_ENVIRONMENT`
    /// (default `development`).
    ///
    /// Sources, later ones overriding earlier ones:
    /// 1. `{config_dir}/default.toml`
    /// 2. `{config_dir}/{environment}.toml`
    /// 3. `{config_dir}/local.toml`
    /// 4. Environment variables `TESSERA__SECTION__KEY`
    pub fn new(config_dir: impl Into<String>) -> Result<Self, TesseraError> {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file loaded: {}", e);
        }
        let environment =
            std::env::var(ENVIRONMENT_VAR).unwrap_or_else(|_| "development".to_string());
        Self::for_environment(config_dir, environment)
    }

    /// Loads configuration for an explicit environment.
    pub fn for_environment(
        config_dir: impl Into<String>,
        environment: impl Into<String>,
    ) -> Result<Self, TesseraError> {
        let config_dir = config_dir.into();
        let environment = environment.into();
        let config = Self::load_config(&config_dir, &environment)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_dir,
            environment,
        })
    }

    /// Loads configuration from `./config`.
    pub fn from_default_location() -> Result<Self, TesseraError> {
        Self::new("./config")
    }

    /// Returns the current configuration.
    pub async fn get(&self) -> AppConfig {
        self.config.read().await.clone()
    }

    /// Re-reads every source. The previous configuration stays active when
    /// the new one fails validation.
    pub async fn reload(&self) -> Result<(), TesseraError> {
        let new_config = Self::load_config(&self.config_dir, &self.environment)?;
        *self.config.write().await = new_config;
        info!("Configuration reloaded");
        Ok(())
    }

    fn load_config(config_dir: &str, environment: &str) -> Result<AppConfig, TesseraError> {
        info!("Loading configuration for environment: {}", environment);

        let mut builder = Config::builder();
        for name in ["default", environment, "local"] {
            let path = format!("{config_dir}/{name}.toml");
            if Path::new(&path).exists() {
                debug!("Loading config file: {}", path);
                builder = builder.add_source(File::with_name(&path).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("TESSERA")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let app_config: AppConfig = builder
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(config_error_to_tessera_error)?;

        ConfigValidator::validate(&app_config)
            .map_err(|errors| TesseraError::Configuration(format_validation_errors(&errors)))?;

        Ok(app_config)
    }

    /// Reads one value by dotted path, e.g. `database.max_connections`.
    pub async fn get_value<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let config = self.config.read().await;
        let json = serde_json::to_value(&*config).ok()?;

        let mut current = &json;
        for part in key.split('.') {
            current = current.get(part)?;
        }

        serde_json::from_value(current.clone()).ok()
    }
}

fn config_error_to_tessera_error(err: ConfigError) -> TesseraError {
    TesseraError::Configuration(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) {
        fs::write(dir.path().join(name), contents).unwrap();
    }

    fn dir_str(dir: &TempDir) -> String {
        dir.path().to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_missing_files_fall_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let loader = ConfigLoader::for_environment(dir_str(&dir), "test").unwrap();
        let config = loader.get().await;
        assert_eq!(config.database.url, "sqlite://tessera.db");
    }

    #[tokio::test]
    async fn test_layering_order() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "default.toml",
            "[database]\nurl = \"sqlite://default.db\"\nmax_connections = 4\n",
        );
        write(&dir, "staging.toml", "[database]\nurl = \"sqlite://staging.db\"\n");
        write(&dir, "local.toml", "[observability]\nlog_level = \"debug\"\n");

        let loader = ConfigLoader::for_environment(dir_str(&dir), "staging").unwrap();
        let config = loader.get().await;
        assert_eq!(config.database.url, "sqlite://staging.db");
        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.observability.log_level, "debug");
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let dir = TempDir::new().unwrap();
        write(&dir, "default.toml", "[database]\nurl = \"postgres://db\"\n");

        let err = ConfigLoader::for_environment(dir_str(&dir), "test")
            .err()
            .expect("validation should fail");
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
        assert!(err.to_string().contains("postgres://db"));
    }

    #[tokio::test]
    async fn test_reload_picks_up_changes() {
        let dir = TempDir::new().unwrap();
        write(&dir, "default.toml", "[database]\nmax_connections = 4\n");
        let loader = ConfigLoader::for_environment(dir_str(&dir), "test").unwrap();
        assert_eq!(loader.get_value::<u32>("database.max_connections").await, Some(4));

        write(&dir, "default.toml", "[database]\nmax_connections = 6\n");
        loader.reload().await.unwrap();
        assert_eq!(loader.get_value::<u32>("database.max_connections").await, Some(6));
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_config() {
        let dir = TempDir::new().unwrap();
        write(&dir, "default.toml", "[database]\nmax_connections = 4\n");
        let loader = ConfigLoader::for_environment(dir_str(&dir), "test").unwrap();

        write(&dir, "default.toml", "[database]\nmax_connections = 0\n");
        assert!(loader.reload().await.is_err());
        assert_eq!(loader.get().await.database.max_connections, 4);
    }

    #[tokio::test]
    async fn test_get_value_unknown_path() {
        let dir = TempDir::new().unwrap();
        let loader = ConfigLoader::for_environment(dir_str(&dir), "test").unwrap();
        assert_eq!(loader.get_value::<String>("app.name").await.as_deref(), Some("tessera"));
        assert!(loader.get_value::<String>("nope.missing").await.is_none());
    }
}
