//! # Relay Controller
//!
//! Wires the command source and the dispatcher together and runs each as its
//! own task, sharing one [`CancellationToken`] and one [`CommandQueue`].
//! Whoever drives the relay (the bundled binary, or a UI) calls
//! [`RelayController::start`], consumes [`RelayEvent`]s from the returned
//! [`RelayHandle`], and eventually calls [`RelayHandle::stop`].
//!
//! When the dispatcher exits for any reason, including a failed handshake,
//! the shared token is cancelled so the watch loop stops with it.
//!
//! ```rust,no_run
//! use rcon_relay::{RelayConfig, RelayController};
//!
//! # async fn example(config: RelayConfig) -> rcon_relay::Result<()> {
//! let controller = RelayController::new(config)?;
//! let mut handle = controller.start();
//!
//! while let Some(event) = handle.next_event().await {
//!     println!("{event:?}");
//! }
//!
//! let summary = handle.stop().await?;
//! println!("executed {} commands", summary.dispatch.commands_executed);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::cancellation::CancellationToken;
use crate::config::RelayConfig;
use crate::constants::defaults;
use crate::dispatcher::{DispatchSummary, Dispatcher};
use crate::error::{RelayError, Result};
use crate::events::{event_channel, EventReceiver, RelayEvent};
use crate::logging::{log_console_operation, log_error};
use crate::queue::CommandQueue;
use crate::rcon::RconResult;
use crate::source::{CommandSource, WatchStats};

/// Holds a validated configuration and starts relay runs from it
#[derive(Debug, Clone)]
pub struct RelayController {
    config: Arc<RelayConfig>,
}

impl RelayController {
    pub fn new(config: RelayConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Current eligible files under the configured folder, relative to it
    pub async fn list_files(&self) -> Result<Vec<PathBuf>> {
        let source = CommandSource::from_config(&self.config.source);
        Ok(source.list_files().await?)
    }

    /// Spawn the watch loop and the dispatcher. Must be called from within a
    /// tokio runtime. Each call starts an independent run with its own queue,
    /// token and console connection.
    pub fn start(&self) -> RelayHandle {
        let run_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let queue = CommandQueue::new();
        let (events_tx, events_rx) = event_channel(defaults::EVENT_CHANNEL_CAPACITY);
        let watch_stats = Arc::new(WatchStats::default());

        info!(
            run_id = %run_id,
            folder = %self.config.source.folder_path.display(),
            peer = %self.config.console.address(),
            "Starting relay"
        );

        let source_task = {
            let source = CommandSource::from_config(&self.config.source);
            let queue = queue.clone();
            let cancel = cancel.clone();
            let events = events_tx.clone();
            let stats = watch_stats.clone();
            tokio::spawn(async move {
                source.watch(queue, cancel, Some(events), &stats).await;
            })
        };

        let dispatch_task = {
            let dispatcher = Dispatcher::new(&self.config.dispatch, queue, cancel.clone())
                .with_events(events_tx);
            let config = self.config.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let peer = config.console.address();
                let result = dispatcher.connect_and_run(&config.console).await;
                match &result {
                    Ok(summary) => log_console_operation(
                        "dispatch",
                        &peer,
                        "stopped",
                        Some(format!("{} commands executed", summary.commands_executed).as_str()),
                    ),
                    Err(e) => log_error("dispatcher", "run", &e.to_string(), Some(peer.as_str())),
                }
                // The whole pipeline stops with the dispatcher
                cancel.cancel();
                result
            })
        };

        RelayHandle {
            run_id,
            cancel,
            events: events_rx,
            source_task,
            dispatch_task,
            watch_stats,
            started_at: Instant::now(),
        }
    }
}

/// What a finished run accomplished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySummary {
    pub dispatch: DispatchSummary,
    pub scans_completed: u64,
    pub commands_enqueued: u64,
    pub uptime: Duration,
}

/// A running relay
#[derive(Debug)]
pub struct RelayHandle {
    run_id: Uuid,
    cancel: CancellationToken,
    events: EventReceiver,
    source_task: JoinHandle<()>,
    dispatch_task: JoinHandle<RconResult<DispatchSummary>>,
    watch_stats: Arc<WatchStats>,
    started_at: Instant,
}

impl RelayHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Next file-list snapshot or execution. `None` once both tasks have
    /// exited and every event has been consumed.
    ///
    /// Up to `EVENT_CHANNEL_CAPACITY` events are buffered; a caller that polls
    /// less often than events arrive loses the oldest ones (see
    /// [`RelayHandle::events_dropped`]).
    pub async fn next_event(&mut self) -> Option<RelayEvent> {
        self.events.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<RelayEvent> {
        self.events.try_recv()
    }

    /// Events discarded so far because this handle was not polled fast enough
    pub fn events_dropped(&self) -> u64 {
        self.events.dropped()
    }

    /// `false` once the dispatcher has exited
    pub fn is_running(&self) -> bool {
        !self.dispatch_task.is_finished()
    }

    /// Request shutdown and wait for both tasks to exit
    pub async fn stop(self) -> Result<RelaySummary> {
        info!(run_id = %self.run_id, "Stopping relay");
        self.cancel.cancel();
        self.wait().await
    }

    /// Wait for the dispatcher to exit on its own (cancellation from
    /// elsewhere, or a console failure), then for the watch loop.
    pub async fn wait(self) -> Result<RelaySummary> {
        let dispatch = self
            .dispatch_task
            .await
            .map_err(|e| RelayError::task_failed("dispatcher", e.to_string()));

        // Covers a panicked dispatcher that never reached its own cancel
        self.cancel.cancel();

        self.source_task
            .await
            .map_err(|e| RelayError::task_failed("command_source", e.to_string()))?;

        let dispatch = dispatch??;

        let summary = RelaySummary {
            dispatch,
            scans_completed: self.watch_stats.scans_completed.load(Ordering::Relaxed),
            commands_enqueued: self.watch_stats.commands_enqueued.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        };

        info!(
            run_id = %self.run_id,
            commands_executed = summary.dispatch.commands_executed,
            scans_completed = summary.scans_completed,
            uptime_ms = summary.uptime.as_millis() as u64,
            "Relay stopped"
        );

        Ok(summary)
    }
}
