//! # Remote Console Error Types
//!
//! Structured errors for the wire codec and the console connection. Callers
//! can tell a peer that hung up apart from a malformed frame or a rejected
//! password, although none of them is retried automatically.

use thiserror::Error;

/// Result alias used throughout the `rcon` module
pub type RconResult<T> = Result<T, RconError>;

#[derive(Error, Debug)]
pub enum RconError {
    /// The peer closed the stream before a full frame arrived
    #[error("Connection closed by peer while reading {context}: expected {expected} bytes")]
    ConnectionClosed { context: String, expected: usize },

    /// Frame header is inconsistent with what the protocol allows
    #[error("Malformed frame (size {size}): {reason}")]
    MalformedFrame { size: u32, reason: String },

    /// Packet body contains characters outside ASCII
    #[error("Packet body is not ASCII: {preview}")]
    NonAsciiBody { preview: String },

    /// The server did not accept the credential
    #[error("Authentication failed: server answered request {request_id} with packet type {packet_type}")]
    AuthenticationFailed { request_id: i32, packet_type: i32 },

    /// A configured timeout elapsed
    #[error("Timeout: {operation} did not complete within {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RconError {
    pub fn connection_closed(context: impl Into<String>, expected: usize) -> Self {
        Self::ConnectionClosed {
            context: context.into(),
            expected,
        }
    }

    pub fn malformed_frame(size: u32, reason: impl Into<String>) -> Self {
        Self::MalformedFrame {
            size,
            reason: reason.into(),
        }
    }

    pub fn non_ascii_body(body: &str) -> Self {
        Self::NonAsciiBody {
            preview: body.chars().take(32).collect(),
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Everything except a rejected credential is a transport failure
    pub fn is_transport_error(&self) -> bool {
        !self.is_authentication_failure()
    }

    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
    }

    pub fn is_connection_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed { .. })
    }
}
