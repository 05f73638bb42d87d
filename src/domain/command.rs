//! Control commands and their rejection reasons

use crate::domain::types::EntityKind;

/// A command issued by the command source to the simulation controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Pause,
    Resume,
    /// Admit a vehicle; `None` uses the configured default speed
    AddVehicle(Option<u32>),
    /// Admit a light; `None` uses the configured default position
    AddLight(Option<u32>),
    Stop,
    Status,
    Help,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::AddVehicle(_) => "add-vehicle",
            Command::AddLight(_) => "add-light",
            Command::Stop => "stop",
            Command::Status => "status",
            Command::Help => "help",
        }
    }
}

pub const COMMAND_HELP: &str = "commands: start | pause | resume | add-vehicle [speed] | \
                                add-light [position] | status | stop | help";

/// A line the command source could not understand
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandParseError {
    Empty,
    Unknown(String),
    InvalidArgument { command: &'static str, value: String },
    UnexpectedArgument { command: &'static str },
    TooManyArguments { command: &'static str, extra: String },
}

impl std::fmt::Display for CommandParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandParseError::Empty => write!(f, "empty command"),
            CommandParseError::Unknown(word) => write!(f, "unknown command '{}'", word),
            CommandParseError::InvalidArgument { command, value } => {
                write!(f, "invalid argument '{}' for {}", value, command)
            }
            CommandParseError::UnexpectedArgument { command } => {
                write!(f, "{} takes no argument", command)
            }
            CommandParseError::TooManyArguments { command, extra } => {
                write!(f, "{} takes at most one argument, got extra '{}'", command, extra)
            }
        }
    }
}

impl std::error::Error for CommandParseError {}

impl std::str::FromStr for Command {
    type Err = CommandParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let Some(word) = words.next() else {
            return Err(CommandParseError::Empty);
        };
        let arg = words.next();

        let word = word.to_ascii_lowercase();
        let command = match word.as_str() {
            "start" => Command::Start,
            "pause" => Command::Pause,
            "resume" => Command::Resume,
            "add-vehicle" | "add-car" => Command::AddVehicle(parse_arg("add-vehicle", arg)?),
            "add-light" => Command::AddLight(parse_arg("add-light", arg)?),
            "stop" | "quit" | "exit" => Command::Stop,
            "status" => Command::Status,
            "help" | "?" => Command::Help,
            other => return Err(CommandParseError::Unknown(other.to_string())),
        };

        if let Some(extra) = words.next() {
            return Err(CommandParseError::TooManyArguments {
                command: command.as_str(),
                extra: extra.to_string(),
            });
        }
        let takes_arg = matches!(command, Command::AddVehicle(_) | Command::AddLight(_));
        if !takes_arg && arg.is_some() {
            return Err(CommandParseError::UnexpectedArgument { command: command.as_str() });
        }
        Ok(command)
    }
}

fn parse_arg(command: &'static str, arg: Option<&str>) -> Result<Option<u32>, CommandParseError> {
    arg.map(|value| {
        value
            .parse::<u32>()
            .map_err(|_| CommandParseError::InvalidArgument { command, value: value.to_string() })
    })
    .transpose()
}

/// Why the controller refused a command
///
/// Rejections are never fatal; the simulation keeps running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    NotStarted,
    AlreadyStarted,
    ShuttingDown,
    CapacityReached { kind: EntityKind, max: usize },
    DuplicateIntersection(u32),
    PositionOutOfTrack { position: u32, track_length: u32 },
    InvalidSpeed,
}

impl CommandError {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandError::NotStarted => "not_started",
            CommandError::AlreadyStarted => "already_started",
            CommandError::ShuttingDown => "shutting_down",
            CommandError::CapacityReached { .. } => "capacity_reached",
            CommandError::DuplicateIntersection(_) => "duplicate_intersection",
            CommandError::PositionOutOfTrack { .. } => "position_out_of_track",
            CommandError::InvalidSpeed => "invalid_speed",
        }
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::NotStarted => write!(f, "simulation has not been started"),
            CommandError::AlreadyStarted => write!(f, "simulation is already running"),
            CommandError::ShuttingDown => write!(f, "simulation is shutting down"),
            CommandError::CapacityReached { kind, max } => {
                write!(f, "no more {}s can be added (max {})", kind, max)
            }
            CommandError::DuplicateIntersection(position) => {
                write!(f, "a light already exists at position {}", position)
            }
            CommandError::PositionOutOfTrack { position, track_length } => {
                write!(f, "position {} is beyond the track end {}", position, track_length)
            }
            CommandError::InvalidSpeed => write!(f, "vehicle speed must be at least 1"),
        }
    }
}

impl std::error::Error for CommandError {}
