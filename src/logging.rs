//! # Structured Logging
//!
//! Environment-aware console logging using the tracing ecosystem.
//!
//! - `RUST_LOG` wins when set; otherwise the level follows `RCON_RELAY_ENV`
//!   (`production` logs at info, everything else at debug)
//! - ANSI colours only when stdout is a terminal
//! - `RCON_RELAY_LOG_FORMAT=json` switches to JSON lines

use std::io::IsTerminal;
use std::sync::OnceLock;

use chrono::Utc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::constants::ENVIRONMENT_VAR;

static TRACING_INITIALIZED: OnceLock<()> = OnceLock::new();

const LOG_FORMAT_VAR: &str = "RCON_RELAY_LOG_FORMAT";

/// Initialize console tracing once per process. Safe to call repeatedly and
/// when another subscriber is already installed.
pub fn init_tracing() {
    TRACING_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));
        let json = std::env::var(LOG_FORMAT_VAR).is_ok_and(|format| format == "json");

        let layer = if json {
            fmt::layer()
                .json()
                .with_target(true)
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_ansi(std::io::stdout().is_terminal())
                .with_filter(filter)
                .boxed()
        };

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            environment = %environment,
            pid = std::process::id(),
            "Structured logging initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var(ENVIRONMENT_VAR).unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for remote console operations
pub fn log_console_operation(operation: &str, peer: &str, status: &str, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        peer = %peer,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "CONSOLE_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR"
    );
}
