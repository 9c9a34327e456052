//! Configuration Loader
//!
//! Environment-aware configuration loading. Sources are layered with the
//! `config` crate, later sources overriding earlier ones:
//!
//! 1. built-in defaults
//! 2. `<config_dir>/rcon-relay.toml` (optional)
//! 3. `<config_dir>/rcon-relay.<environment>.toml` (optional)
//! 4. an explicit file (required when given)
//! 5. `RCON_RELAY__<SECTION>__<KEY>` environment variables

use std::env;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use tracing::debug;

use super::error::{ConfigResult, ConfigurationError};
use super::RelayConfig;
use crate::constants::{ENVIRONMENT_VAR, ENV_OVERRIDE_PREFIX};

const BASE_FILE_STEM: &str = "rcon-relay";
const DEFAULT_CONFIG_DIR: &str = "config";

/// Loaded and validated configuration plus where it came from
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: RelayConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<ConfigManager> {
        Self::load_with(None, None, &Self::detect_environment())
    }

    /// Load configuration with an explicit file layered on top of the defaults
    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<ConfigManager> {
        Self::load_with(
            None,
            Some(path.as_ref().to_path_buf()),
            &Self::detect_environment(),
        )
    }

    /// Load configuration from a specific directory with explicit environment.
    /// Useful for testing without modifying global environment variables.
    pub fn load_with(
        config_dir: Option<PathBuf>,
        explicit_file: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<ConfigManager> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR));

        debug!(
            environment = %environment,
            config_directory = %config_directory.display(),
            "Loading configuration"
        );

        let base_file = config_directory.join(format!("{BASE_FILE_STEM}.toml"));
        let env_file = config_directory.join(format!("{BASE_FILE_STEM}.{environment}.toml"));

        let mut builder = Config::builder()
            .add_source(File::from(base_file).required(false))
            .add_source(File::from(env_file).required(false));

        if let Some(path) = explicit_file {
            if !path.is_file() {
                return Err(ConfigurationError::file_not_found(path));
            }
            builder = builder.add_source(File::from(path).required(true));
        }

        let config: RelayConfig = builder
            .add_source(
                Environment::with_prefix(ENV_OVERRIDE_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;

        debug!(
            environment = %environment,
            config = %Self::sanitize_config_for_logging(&config),
            "Configuration loaded successfully"
        );

        Ok(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        })
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn into_config(self) -> RelayConfig {
        self.config
    }

    /// Get the current environment
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Get the configuration directory
    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Configuration as JSON with credential-like fields masked
    pub fn debug_config(&self) -> serde_json::Value {
        Self::sanitize_config_for_logging(&self.config)
    }

    /// Detect current environment from `RCON_RELAY_ENV`, defaulting to development
    pub fn detect_environment() -> String {
        env::var(ENVIRONMENT_VAR)
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn sanitize_config_for_logging(config: &RelayConfig) -> serde_json::Value {
        let mut config_json = serde_json::json!(config);
        let sensitive_patterns = ["password", "secret", "token", "credential"];
        Self::sanitize_json_recursive(&mut config_json, &sensitive_patterns);
        config_json
    }

    fn sanitize_json_recursive(value: &mut serde_json::Value, sensitive_patterns: &[&str]) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let key_lower = key.to_lowercase();
                    let is_sensitive = sensitive_patterns
                        .iter()
                        .any(|pattern| key_lower.contains(pattern));

                    if is_sensitive {
                        *val = match val {
                            serde_json::Value::String(s) if s.is_empty() => {
                                serde_json::Value::String("[EMPTY]".to_string())
                            }
                            _ => serde_json::Value::String("[MASKED]".to_string()),
                        };
                    } else {
                        Self::sanitize_json_recursive(val, sensitive_patterns);
                    }
                }
            }
            serde_json::Value::Array(items) => {
                for item in items.iter_mut() {
                    Self::sanitize_json_recursive(item, sensitive_patterns);
                }
            }
            _ => {}
        }
    }
}
