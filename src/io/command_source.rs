//! Text command source
//!
//! Reads one command per line (stdin for the binary) and applies it to the
//! controller. Parse errors and rejected commands are logged and the loop
//! keeps reading; only `stop`, end of input, or a finished shutdown end it.

use crate::domain::command::COMMAND_HELP;
use crate::domain::{Command, CommandError};
use crate::infra::signal::shutdown_requested;
use crate::services::SimulationController;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

/// Why the command loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSourceExit {
    /// A `stop` command ran to completion
    Stopped,
    /// Input ended (or failed) before any `stop`
    EndOfInput,
    /// The simulation was stopped from elsewhere
    ShutdownObserved,
}

/// Apply one parsed command
pub async fn apply_command(controller: &SimulationController, command: Command) -> Result<(), CommandError> {
    match command {
        Command::Start => controller.start(),
        Command::Pause => controller.pause_all(),
        Command::Resume => controller.resume_all(),
        Command::AddVehicle(speed) => controller.add_vehicle(speed).map(|id| {
            info!(vehicle = %id, "vehicle_added");
        }),
        Command::AddLight(position) => controller.add_light(position).map(|position| {
            info!(position = %position, "light_added");
        }),
        Command::Status => {
            controller.status().log();
            Ok(())
        }
        Command::Help => {
            info!("{}", COMMAND_HELP);
            Ok(())
        }
        Command::Stop => controller.stop().await,
    }
}

/// Read commands until stop, end of input, or external shutdown
pub async fn run_command_source<R>(reader: R, controller: Arc<SimulationController>) -> CommandSourceExit
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut stopped = controller.stopped_signal();
    info!("command_source_started");

    loop {
        let line = tokio::select! {
            biased;
            _ = shutdown_requested(&mut stopped) => {
                debug!("command_source_shutdown");
                return CommandSourceExit::ShutdownObserved;
            }
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("command_source_eof");
                return CommandSourceExit::EndOfInput;
            }
            Err(e) => {
                warn!(error = %e, "command_source_read_failed");
                return CommandSourceExit::EndOfInput;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                warn!(line = %line, error = %e, "command_parse_failed");
                continue;
            }
        };

        debug!(command = %command.as_str(), "command_received");
        match apply_command(&controller, command).await {
            Ok(()) if command == Command::Stop => return CommandSourceExit::Stopped,
            Ok(()) => {}
            Err(e) => {
                warn!(command = %command.as_str(), reason = %e.as_str(), error = %e, "command_rejected");
            }
        }
    }
}
