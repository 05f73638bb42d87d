//! Shared types for the track simulation

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Newtype wrapper for vehicle slot ids to provide type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct VehicleId(pub u32);

impl std::fmt::Display for VehicleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Traffic light color
///
/// Cycles Red -> Green -> Yellow -> Red with no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficLightColor {
    Red,
    Green,
    Yellow,
}

impl TrafficLightColor {
    /// Cyclic successor
    pub fn next(self) -> Self {
        match self {
            TrafficLightColor::Red => TrafficLightColor::Green,
            TrafficLightColor::Green => TrafficLightColor::Yellow,
            TrafficLightColor::Yellow => TrafficLightColor::Red,
        }
    }

    /// How long a light stays in this color before advancing
    pub fn hold(self, holds: &HoldDurations) -> Duration {
        match self {
            TrafficLightColor::Red => holds.red,
            TrafficLightColor::Green => holds.green,
            TrafficLightColor::Yellow => holds.yellow,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrafficLightColor::Red => "red",
            TrafficLightColor::Green => "green",
            TrafficLightColor::Yellow => "yellow",
        }
    }
}

impl std::fmt::Display for TrafficLightColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-color hold durations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldDurations {
    pub red: Duration,
    pub green: Duration,
    pub yellow: Duration,
}

impl Default for HoldDurations {
    fn default() -> Self {
        Self {
            red: Duration::from_secs(2),
            green: Duration::from_secs(2),
            yellow: Duration::from_secs(4),
        }
    }
}

/// Range of vehicle positions around a light in which the light governs the vehicle.
///
/// A light at `L` is relevant to a vehicle at `p` when `L - ahead <= p <= L + behind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrakingWindow {
    pub ahead: u32,
    pub behind: u32,
}

impl Default for BrakingWindow {
    fn default() -> Self {
        Self { ahead: 100, behind: 10 }
    }
}

impl BrakingWindow {
    /// Whether a light at `light_pos` is relevant to a vehicle at `vehicle_pos`
    #[inline]
    pub fn covers(&self, light_pos: u32, vehicle_pos: u32) -> bool {
        vehicle_pos >= light_pos.saturating_sub(self.ahead)
            && vehicle_pos <= light_pos.saturating_add(self.behind)
    }

    /// Inclusive range of light positions relevant to a vehicle at `vehicle_pos`
    #[inline]
    pub fn light_range(&self, vehicle_pos: u32) -> std::ops::RangeInclusive<u32> {
        vehicle_pos.saturating_sub(self.behind)..=vehicle_pos.saturating_add(self.ahead)
    }
}

/// Kind of entity the controller admits at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Vehicle,
    Light,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Vehicle => "vehicle",
            EntityKind::Light => "light",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
