//! IO modules - the edges of the simulation
//!
//! This module contains everything that moves data in or out of the core:
//! - `event_channel` - Typed bounded channel carrying entity events
//! - `dispatcher` - Single consumer that fans events out to sinks
//! - `sink` - Presentation sink trait and the log sink
//! - `egress` - Event log output to file (JSONL format)
//! - `command_source` - Line-based command reader driving the controller

pub mod command_source;
pub mod dispatcher;
pub mod egress;
pub mod event_channel;
pub mod sink;

// Re-export commonly used types
pub use command_source::{apply_command, run_command_source, CommandSourceExit};
pub use dispatcher::EventDispatcher;
pub use egress::{new_run_id, JsonlSink};
pub use event_channel::{create_event_channel, EventChannelClosed, EventSender};
pub use sink::{LogSink, PresentationSink};
