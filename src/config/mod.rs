//! # Relay Configuration
//!
//! Explicit configuration value for the relay. It is built once by the
//! controller (usually through [`ConfigManager`]) and handed to the console
//! connection, the command source and the dispatcher; nothing reads
//! configuration from ambient global state.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rcon_relay::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let config = manager.config();
//! println!("relaying {} to {}", config.source.folder_path.display(), config.console.address());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::defaults;
use crate::dispatcher::BatchPolicy;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring `config/rcon-relay.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Remote console target and credential
    pub console: ConsoleConfig,

    /// Command tree discovery
    pub source: SourceConfig,

    /// Command dispatch pacing
    pub dispatch: DispatchConfig,
}

impl RelayConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.console.host.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "console.host",
                "console configuration",
            ));
        }

        if self.console.port == 0 {
            return Err(ConfigurationError::invalid_value(
                "console.port",
                "0",
                "port must be greater than 0",
            ));
        }

        if self.console.password.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "console.password",
                "console configuration",
            ));
        }

        if self.source.file_extension.trim_start_matches('.').is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "source.file_extension",
                "source configuration",
            ));
        }

        if self.source.scan_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "source.scan_interval_ms",
                "0",
                "scan interval must be greater than 0",
            ));
        }

        let delay = self.dispatch.command_delay_ms;
        if !(defaults::MIN_COMMAND_DELAY_MS..=defaults::MAX_COMMAND_DELAY_MS).contains(&delay) {
            return Err(ConfigurationError::invalid_value(
                "dispatch.command_delay_ms",
                delay.to_string(),
                format!(
                    "command delay must be between {} and {} milliseconds",
                    defaults::MIN_COMMAND_DELAY_MS,
                    defaults::MAX_COMMAND_DELAY_MS
                ),
            ));
        }

        if self.dispatch.idle_backoff_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "dispatch.idle_backoff_ms",
                "0",
                "idle backoff must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// Remote console connection settings
#[derive(Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub host: String,
    pub port: u16,
    pub password: String,

    /// TCP connect timeout; 0 waits indefinitely
    pub connect_timeout_ms: u64,

    /// Upper bound on waiting for one response frame; unset waits indefinitely
    pub response_timeout_ms: Option<u64>,
}

impl ConsoleConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_ms > 0).then(|| Duration::from_millis(self.connect_timeout_ms))
    }

    pub fn response_timeout(&self) -> Option<Duration> {
        self.response_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            host: defaults::HOST.to_string(),
            port: defaults::PORT,
            password: String::new(),
            connect_timeout_ms: defaults::CONNECT_TIMEOUT_MS,
            response_timeout_ms: None,
        }
    }
}

// Hand-written so the credential never reaches log output
impl fmt::Debug for ConsoleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"[MASKED]")
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("response_timeout_ms", &self.response_timeout_ms)
            .finish()
    }
}

/// Command tree discovery settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    pub folder_path: PathBuf,
    pub file_extension: String,
    pub scan_interval_ms: u64,
}

impl SourceConfig {
    /// Extension with its leading dot, e.g. `.mcfunction`
    pub fn extension(&self) -> String {
        let trimmed = self.file_extension.trim();
        if trimmed.starts_with('.') {
            trimmed.to_string()
        } else {
            format!(".{trimmed}")
        }
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            folder_path: PathBuf::from(defaults::FOLDER_PATH),
            file_extension: defaults::FILE_EXTENSION.to_string(),
            scan_interval_ms: defaults::SCAN_INTERVAL_MS,
        }
    }
}

/// Command dispatch settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Minimum gap between two consecutive commands
    pub command_delay_ms: u64,

    /// Sleep when the queue is empty and there is nothing to replay
    pub idle_backoff_ms: u64,

    /// What happens to the working batch when new commands arrive
    pub batch_policy: BatchPolicy,
}

impl DispatchConfig {
    pub fn command_delay(&self) -> Duration {
        Duration::from_millis(self.command_delay_ms)
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            command_delay_ms: defaults::COMMAND_DELAY_MS,
            idle_backoff_ms: defaults::IDLE_BACKOFF_MS,
            batch_policy: BatchPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> RelayConfig {
        RelayConfig {
            console: ConsoleConfig {
                password: "hunter2".to_string(),
                ..ConsoleConfig::default()
            },
            ..RelayConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.console.address(), "127.0.0.1:25575");
        assert_eq!(config.source.extension(), ".mcfunction");
        assert_eq!(config.source.scan_interval(), Duration::from_secs(5));
        assert_eq!(config.dispatch.command_delay(), Duration::from_millis(60));
        assert_eq!(config.dispatch.idle_backoff(), Duration::from_millis(100));
        assert_eq!(config.dispatch.batch_policy, BatchPolicy::Replace);
        assert_eq!(config.console.response_timeout(), None);
    }

    #[test]
    fn test_validation_requires_password() {
        let err = RelayConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("console.password"));
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validation_bounds_command_delay() {
        let mut config = valid_config();

        config.dispatch.command_delay_ms = 59;
        assert!(config.validate().is_err());

        config.dispatch.command_delay_ms = 101;
        assert!(config.validate().is_err());

        config.dispatch.command_delay_ms = 100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_extension_normalisation() {
        let source = SourceConfig {
            file_extension: "mcfunction".to_string(),
            ..SourceConfig::default()
        };
        assert_eq!(source.extension(), ".mcfunction");

        let mut config = valid_config();
        config.source.file_extension = ".".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeouts_zero_means_unbounded() {
        let console = ConsoleConfig {
            connect_timeout_ms: 0,
            response_timeout_ms: Some(0),
            ..ConsoleConfig::default()
        };
        assert_eq!(console.connect_timeout(), None);
        assert_eq!(console.response_timeout(), None);

        let console = ConsoleConfig {
            response_timeout_ms: Some(1500),
            ..ConsoleConfig::default()
        };
        assert_eq!(console.response_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_debug_masks_password() {
        let rendered = format!("{:?}", valid_config().console);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[MASKED]"));
    }
}
