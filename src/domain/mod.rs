//! Domain models - core simulation types
//!
//! This module contains the canonical data types used throughout the system:
//! - `TrafficLightColor` - the three-state light cycle
//! - `Command` / `CommandError` - control surface and rejection reasons
//! - `SimEvent` - state changes pushed to the presentation sink
//! - `motion` - clamped vehicle advance arithmetic
//! - `BrakingWindow` / `HoldDurations` - timing and range constants

pub mod command;
pub mod event;
pub mod motion;
pub mod types;

// Re-export commonly used types at module level
pub use command::{Command, CommandError};
pub use event::SimEvent;
pub use types::{BrakingWindow, EntityKind, HoldDurations, TrafficLightColor, VehicleId};
