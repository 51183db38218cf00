//! Configuration validation.
//!
//! Collects every problem in one pass so a misconfigured deployment fails at
//! startup with the full list.

use crate::{AppConfig, AppMetadata, DatabaseConfig, ObservabilityConfig};
use std::fmt;

/// A single configuration problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// The application name is blank.
    MissingAppName,
    /// Database URL is empty or not a SQLite URL.
    InvalidDatabaseUrl { url: String },
    /// Minimum pool size exceeds the maximum.
    InvalidPoolSize { min: u32, max: u32 },
    /// Pool size is zero or above the supported ceiling.
    PoolSizeOutOfRange { value: u32, maximum: u32 },
    /// A timeout that must be positive is zero.
    NonPositiveTimeout { name: &'static str },
    /// A log filter directive names an unknown level.
    InvalidLogLevel { value: String },
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingAppName => write!(f, "Application name must not be blank"),
            Self::InvalidDatabaseUrl { url } => {
                write!(f, "Invalid database URL '{url}' (expected sqlite:...)")
            }
            Self::InvalidPoolSize { min, max } => {
                write!(f, "Invalid pool size: min ({min}) cannot be greater than max ({max})")
            }
            Self::PoolSizeOutOfRange { value, maximum } => {
                write!(f, "Pool size {value} must be between 1 and {maximum}")
            }
            Self::NonPositiveTimeout { name } => write!(f, "Timeout '{name}' must be positive"),
            Self::InvalidLogLevel { value } => write!(
                f,
                "Invalid log level: '{value}' (valid: trace, debug, info, warn, error, off)"
            ),
        }
    }
}

impl std::error::Error for ConfigValidationError {}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Upper bound on pooled SQLite connections.
    const MAX_POOL_SIZE: u32 = 64;
    const VALID_LOG_LEVELS: &'static [&'static str] =
        &["trace", "debug", "info", "warn", "error", "off"];

    /// Validates the entire application configuration.
    pub fn validate(config: &AppConfig) -> Result<(), Vec<ConfigValidationError>> {
        let mut errors = Vec::new();

        Self::validate_app(&config.app, &mut errors);
        Self::validate_database(&config.database, &mut errors);
        Self::validate_observability(&config.observability, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_app(config: &AppMetadata, errors: &mut Vec<ConfigValidationError>) {
        if config.name.trim().is_empty() {
            errors.push(ConfigValidationError::MissingAppName);
        }
    }

    fn validate_database(config: &DatabaseConfig, errors: &mut Vec<ConfigValidationError>) {
        if !config.url.starts_with("sqlite:") {
            errors.push(ConfigValidationError::InvalidDatabaseUrl {
                url: config.url.clone(),
            });
        }

        for value in [config.min_connections, config.max_connections] {
            if value == 0 || value > Self::MAX_POOL_SIZE {
                errors.push(ConfigValidationError::PoolSizeOutOfRange {
                    value,
                    maximum: Self::MAX_POOL_SIZE,
                });
            }
        }
        if config.min_connections > config.max_connections {
            errors.push(ConfigValidationError::InvalidPoolSize {
                min: config.min_connections,
                max: config.max_connections,
            });
        }

        if config.connect_timeout_secs == 0 {
            errors.push(ConfigValidationError::NonPositiveTimeout {
                name: "database.connect_timeout_secs",
            });
        }
        if config.busy_timeout_ms == 0 {
            errors.push(ConfigValidationError::NonPositiveTimeout {
                name: "database.busy_timeout_ms",
            });
        }
    }

    fn validate_observability(
        config: &ObservabilityConfig,
        errors: &mut Vec<ConfigValidationError>,
    ) {
        let valid = config.log_level.split(',').all(|directive| {
            let level = directive.rsplit('=').next().unwrap_or_default().trim();
            Self::VALID_LOG_LEVELS.contains(&level.to_lowercase().as_str())
        });
        if !valid {
            errors.push(ConfigValidationError::InvalidLogLevel {
                value: config.log_level.clone(),
            });
        }
    }
}

/// Joins validation errors into one message.
#[must_use]
pub fn format_validation_errors(errors: &[ConfigValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes() {
        assert!(ConfigValidator::validate(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_invalid_database_url() {
        let mut config = AppConfig::default();
        config.database.url = "mysql://localhost/tessera".to_string();

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(matches!(
            errors.as_slice(),
            [ConfigValidationError::InvalidDatabaseUrl { .. }]
        ));
    }

    #[test]
    fn test_in_memory_url_is_valid() {
        let mut config = AppConfig::default();
        config.database.url = "sqlite::memory:".to_string();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_pool_size() {
        let mut config = AppConfig::default();
        config.database.min_connections = 10;
        config.database.max_connections = 2;

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(errors.contains(&ConfigValidationError::InvalidPoolSize { min: 10, max: 2 }));
    }

    #[test]
    fn test_zero_pool_size() {
        let mut config = AppConfig::default();
        config.database.min_connections = 0;

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(errors.contains(&ConfigValidationError::PoolSizeOutOfRange {
            value: 0,
            maximum: 64
        }));
    }

    #[test]
    fn test_zero_timeouts() {
        let mut config = AppConfig::default();
        config.database.connect_timeout_secs = 0;
        config.database.busy_timeout_ms = 0;

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_log_level_directives() {
        let mut config = AppConfig::default();
        config.observability.log_level = "info,tessera_repository=debug".to_string();
        assert!(ConfigValidator::validate(&config).is_ok());

        config.observability.log_level = "verbose".to_string();
        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(matches!(
            errors.as_slice(),
            [ConfigValidationError::InvalidLogLevel { .. }]
        ));
    }

    #[test]
    fn test_multiple_errors_are_collected() {
        let mut config = AppConfig::default();
        config.app.name = " ".to_string();
        config.database.url = String::new();
        config.observability.log_level = "loud".to_string();

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        let message = format_validation_errors(&errors);
        assert!(message.contains("Application name"));
        assert!(message.contains("loud"));
    }
}
