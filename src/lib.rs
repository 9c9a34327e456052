#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # RCON Relay
//!
//! Relays command lines from a folder of text files to a game server's remote
//! console and reports each command together with the server's reply.
//!
//! ## Architecture
//!
//! Two long-running tasks share a [`CommandQueue`] and a [`CancellationToken`]:
//!
//! - the [`CommandSource`] rescans the folder on a fixed interval, enqueueing
//!   every command line and publishing the current file list
//! - the [`Dispatcher`] drains the queue, sends each command over an
//!   authenticated [`RconConnection`] at a bounded rate, then replays the last
//!   batch until new commands arrive
//!
//! The [`RelayController`] wires both together and surfaces
//! [`RelayEvent`]s to whoever drives the relay.
//!
//! ## Module Organization
//!
//! - [`rcon`] - Wire codec and authenticated console connection
//! - [`source`] - Command file discovery and line parsing
//! - [`queue`] - Shared FIFO between source and dispatcher
//! - [`dispatcher`] - Rate-limited execution state machine
//! - [`controller`] - Pipeline lifecycle and event surface
//! - [`config`] - Layered configuration
//! - [`error`] - Crate-level error type
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rcon_relay::config::ConfigManager;
//! use rcon_relay::{RelayController, RelayEvent};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! rcon_relay::logging::init_tracing();
//!
//! let config = ConfigManager::load()?.into_config();
//! let mut handle = RelayController::new(config)?.start();
//!
//! while let Some(event) = handle.next_event().await {
//!     if let RelayEvent::CommandExecuted(execution) = event {
//!         let (command, response) = execution.as_pair();
//!         println!("Executed: {command}, Response: {response}");
//!     }
//! }
//!
//! handle.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod cancellation;
pub mod config;
pub mod constants;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod logging;
pub mod queue;
pub mod rcon;
pub mod source;

pub use cancellation::CancellationToken;
pub use config::{ConfigManager, RelayConfig};
pub use controller::{RelayController, RelayHandle, RelaySummary};
pub use dispatcher::{BatchPolicy, DispatchSummary, Dispatcher, DispatcherState};
pub use error::{RelayError, Result};
pub use events::{ExecutionEvent, RelayEvent};
pub use queue::CommandQueue;
pub use rcon::{Console, RconConnection, RconError};
pub use source::{Command, CommandSource};
