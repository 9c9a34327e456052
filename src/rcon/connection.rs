//! # Console Connection
//!
//! A single authenticated remote console session over a byte stream.
//!
//! The connection is created by a successful handshake and closed exactly
//! once by whoever owns it, through [`Console::close`]. Commands are sent one
//! at a time and each call waits for its response frame, so a fixed request id
//! is enough to pair them.

use std::future::Future;
use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use super::error::{RconError, RconResult};
use super::packet::{read_packet, write_packet, Packet, PacketType};
use crate::config::ConsoleConfig;
use crate::constants::protocol::{AUTH_FAILED_REQUEST_ID, AUTH_REQUEST_ID, EXEC_REQUEST_ID};

/// Seam between the dispatcher and the remote console.
///
/// `close` consumes the console so it can only ever be called once.
#[async_trait]
pub trait Console: Send + Sized {
    /// Send one command and wait for its response body
    async fn execute(&mut self, command: &str) -> RconResult<String>;

    /// Close the underlying transport
    async fn close(self) -> RconResult<()>;
}

/// Authenticated remote console session
#[derive(Debug)]
pub struct RconConnection<S = TcpStream> {
    stream: S,
    peer: String,
    response_timeout: Option<Duration>,
}

impl RconConnection<TcpStream> {
    /// Open a TCP stream to the configured console and authenticate.
    ///
    /// The password is sent once with request id 1; anything but an
    /// `AUTH_RESPONSE` accepting that id fails and the socket is closed.
    pub async fn connect(config: &ConsoleConfig) -> RconResult<Self> {
        let address = config.address();
        info!(peer = %address, "Connecting to remote console");

        let stream = with_timeout(
            config.connect_timeout(),
            "connect",
            TcpStream::connect((config.host.as_str(), config.port)),
        )
        .await??;

        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer = %address, error = %e, "Could not disable Nagle's algorithm");
        }

        Self::authenticate(stream, address, &config.password, config.response_timeout()).await
    }
}

impl<S> RconConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Run the authentication handshake over an already open stream
    pub async fn authenticate(
        mut stream: S,
        peer: impl Into<String>,
        password: &str,
        response_timeout: Option<Duration>,
    ) -> RconResult<Self> {
        let peer = peer.into();

        let response = match Self::exchange(
            &mut stream,
            PacketType::AUTH,
            AUTH_REQUEST_ID,
            password,
            response_timeout,
        )
        .await
        {
            Ok(response) => response,
            Err(e) => {
                shutdown_quietly(&mut stream, &peer).await;
                return Err(e);
            }
        };

        if response.packet_type != PacketType::AUTH_RESPONSE
            || response.request_id == AUTH_FAILED_REQUEST_ID
        {
            warn!(
                peer = %peer,
                request_id = response.request_id,
                packet_type = %response.packet_type,
                "Remote console rejected authentication"
            );
            shutdown_quietly(&mut stream, &peer).await;
            return Err(RconError::AuthenticationFailed {
                request_id: response.request_id,
                packet_type: response.packet_type.value(),
            });
        }

        info!(peer = %peer, "Authenticated with remote console");

        Ok(Self {
            stream,
            peer,
            response_timeout,
        })
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    async fn exchange(
        stream: &mut S,
        packet_type: PacketType,
        request_id: i32,
        body: &str,
        response_timeout: Option<Duration>,
    ) -> RconResult<Packet> {
        write_packet(stream, packet_type, request_id, body).await?;
        with_timeout(response_timeout, "response", read_packet(stream)).await?
    }
}

#[async_trait]
impl<S> Console for RconConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn execute(&mut self, command: &str) -> RconResult<String> {
        debug!(peer = %self.peer, command = %command, "Sending command");

        let response = Self::exchange(
            &mut self.stream,
            PacketType::EXEC_COMMAND,
            EXEC_REQUEST_ID,
            command,
            self.response_timeout,
        )
        .await?;

        Ok(response.body)
    }

    async fn close(mut self) -> RconResult<()> {
        info!(peer = %self.peer, "Closing remote console connection");

        match self.stream.shutdown().await {
            Ok(()) => Ok(()),
            // The peer may already be gone; the socket is released on drop either way
            Err(e) if e.kind() == ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(RconError::Io(e)),
        }
    }
}

async fn shutdown_quietly<S>(stream: &mut S, peer: &str)
where
    S: AsyncWrite + Unpin,
{
    if let Err(e) = stream.shutdown().await {
        debug!(peer = %peer, error = %e, "Shutdown after failed handshake reported an error");
    }
}

async fn with_timeout<F, T>(limit: Option<Duration>, operation: &str, future: F) -> RconResult<T>
where
    F: Future<Output = T>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .map_err(|_| RconError::timeout(operation, saturating_millis(limit))),
        None => Ok(future.await),
    }
}

/// Whole milliseconds in `duration`, clamped to `u64::MAX`
fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
