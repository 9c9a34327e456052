//! RCON Relay Binary
//!
//! Headless relay: loads configuration, starts the pipeline and logs every
//! executed command with the server's reply until Ctrl-C or the console
//! connection ends.
//!
//! Usage: `rcon-relay [config-file]`

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};

use rcon_relay::config::ConfigManager;
use rcon_relay::{logging, RelayController, RelayEvent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();

    let manager = match std::env::args().nth(1) {
        Some(path) => ConfigManager::load_from_file(&path)
            .with_context(|| format!("failed to load configuration from {path}"))?,
        None => ConfigManager::load().context("failed to load configuration")?,
    };

    info!(
        environment = %manager.environment(),
        config = %manager.debug_config(),
        "Configuration loaded"
    );

    let controller = RelayController::new(manager.into_config())?;

    match controller.list_files().await {
        Ok(files) => {
            for file in &files {
                info!(file = %file.display(), "Command file");
            }
        }
        Err(e) => warn!(error = %e, "Could not list command files"),
    }

    let mut handle = controller.start();
    info!(run_id = %handle.run_id(), "Relay running, press Ctrl-C to stop");

    let mut ctrl_c = std::pin::pin!(signal::ctrl_c());
    loop {
        tokio::select! {
            event = handle.next_event() => match event {
                Some(RelayEvent::CommandExecuted(execution)) => {
                    let (command, response) = execution.as_pair();
                    info!("Executed: {command}, Response: {response}");
                }
                Some(RelayEvent::FilesDiscovered(files)) => {
                    info!(files = files.len(), "Command files rescanned");
                }
                // Both pipeline tasks have exited
                None => break,
            },
            result = &mut ctrl_c => {
                result.context("failed to listen for Ctrl-C")?;
                info!("Shutdown signal received");
                break;
            }
        }
    }

    let summary = handle.stop().await?;
    info!(
        commands_executed = summary.dispatch.commands_executed,
        passes_completed = summary.dispatch.passes_completed,
        "Relay stopped"
    );

    Ok(())
}
