//! # System Constants
//!
//! Protocol constants and the operational defaults used when a configuration
//! value is not supplied.

/// Remote console wire protocol constants
pub mod protocol {
    /// Bytes of a frame counted by the size field besides the body:
    /// request id (4) + type (4) + two null terminators (2).
    pub const FRAME_OVERHEAD: usize = 10;

    /// Bytes taken by the size field itself
    pub const SIZE_FIELD_LEN: usize = 4;

    /// Largest size field accepted from a peer before the frame is rejected
    /// as malformed.
    pub const MAX_FRAME_SIZE: u32 = 1024 * 1024;

    /// Request id used for the authentication packet
    pub const AUTH_REQUEST_ID: i32 = 1;

    /// Request id used for every command packet; responses are read in lockstep
    pub const EXEC_REQUEST_ID: i32 = 2;

    /// Request id a server answers with when the password was rejected
    pub const AUTH_FAILED_REQUEST_ID: i32 = -1;
}

/// Defaults applied by the configuration layer
pub mod defaults {
    pub const HOST: &str = "127.0.0.1";
    pub const PORT: u16 = 25575;
    pub const CONNECT_TIMEOUT_MS: u64 = 5000;

    pub const FOLDER_PATH: &str = "functions";
    pub const FILE_EXTENSION: &str = ".mcfunction";
    pub const SCAN_INTERVAL_MS: u64 = 5000;

    pub const COMMAND_DELAY_MS: u64 = 60;
    pub const IDLE_BACKOFF_MS: u64 = 100;

    /// Events buffered for a slow controller before the oldest are dropped
    pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

    /// Bounds the controller enforces on the command delay
    pub const MIN_COMMAND_DELAY_MS: u64 = 60;
    pub const MAX_COMMAND_DELAY_MS: u64 = 100;
}

/// Lines starting with this marker are never executed
pub const COMMENT_MARKER: char = '#';

/// Environment variable naming the active configuration environment
pub const ENVIRONMENT_VAR: &str = "RCON_RELAY_ENV";

/// Prefix for environment variable configuration overrides
pub const ENV_OVERRIDE_PREFIX: &str = "RCON_RELAY";
