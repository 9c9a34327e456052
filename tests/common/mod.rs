//! Shared fixtures for integration tests: an in-process remote console
//! server and relay configuration builders.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use rcon_relay::config::{ConsoleConfig, DispatchConfig, SourceConfig};
use rcon_relay::rcon::{read_packet, write_packet, PacketType};
use rcon_relay::RelayConfig;

pub const TEST_PASSWORD: &str = "hunter2";

/// How the fake server answers the authentication packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Accept the configured password, reject anything else with id -1
    Password,
    /// Answer with a packet of the wrong type
    WrongType,
    /// Close the socket instead of answering
    Hangup,
}

/// Remote console stand-in bound to an ephemeral localhost port.
///
/// Replies to every command with `ack:<command>` and records what it saw.
pub struct FakeConsoleServer {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<String>>>,
    auth_attempts: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl FakeConsoleServer {
    pub async fn start() -> Self {
        Self::start_with(AuthMode::Password).await
    }

    pub async fn start_with(mode: AuthMode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));
        let auth_attempts = Arc::new(Mutex::new(Vec::new()));

        let task = {
            let received = received.clone();
            let auth_attempts = auth_attempts.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let received = received.clone();
                    let auth_attempts = auth_attempts.clone();
                    tokio::spawn(serve(stream, mode, received, auth_attempts));
                }
            })
        };

        Self {
            addr,
            received,
            auth_attempts,
            task,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn console_config(&self, password: &str) -> ConsoleConfig {
        ConsoleConfig {
            host: "127.0.0.1".to_string(),
            port: self.port(),
            password: password.to_string(),
            connect_timeout_ms: 2000,
            response_timeout_ms: Some(2000),
        }
    }

    /// Commands received so far, in arrival order
    pub fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }

    pub fn auth_attempts(&self) -> Vec<String> {
        self.auth_attempts.lock().clone()
    }
}

impl Drop for FakeConsoleServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(
    mut stream: TcpStream,
    mode: AuthMode,
    received: Arc<Mutex<Vec<String>>>,
    auth_attempts: Arc<Mutex<Vec<String>>>,
) {
    let Ok(auth) = read_packet(&mut stream).await else {
        return;
    };
    auth_attempts.lock().push(auth.body.clone());

    match mode {
        AuthMode::Hangup => return,
        AuthMode::WrongType => {
            let _ = write_packet(
                &mut stream,
                PacketType::RESPONSE_VALUE,
                auth.request_id,
                "",
            )
            .await;
            return;
        }
        AuthMode::Password => {
            let id = if auth.body == TEST_PASSWORD {
                auth.request_id
            } else {
                -1
            };
            let sent = write_packet(&mut stream, PacketType::AUTH_RESPONSE, id, "").await;
            if sent.is_err() || id == -1 {
                return;
            }
        }
    }

    while let Ok(packet) = read_packet(&mut stream).await {
        received.lock().push(packet.body.clone());
        let reply = format!("ack:{}", packet.body);
        if write_packet(&mut stream, PacketType::RESPONSE_VALUE, packet.request_id, &reply)
            .await
            .is_err()
        {
            break;
        }
    }
}

/// Relay configuration pointing at `server` and `folder` with fast scanning
pub fn relay_config(server: &FakeConsoleServer, folder: &Path) -> RelayConfig {
    RelayConfig {
        console: server.console_config(TEST_PASSWORD),
        source: SourceConfig {
            folder_path: folder.to_path_buf(),
            scan_interval_ms: 50,
            ..SourceConfig::default()
        },
        dispatch: DispatchConfig {
            command_delay_ms: 60,
            idle_backoff_ms: 10,
            ..DispatchConfig::default()
        },
    }
}

/// Write `contents` to `folder/name`, creating parent directories
pub fn write_command_file(folder: &Path, name: &str, contents: &str) {
    let path = folder.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}
