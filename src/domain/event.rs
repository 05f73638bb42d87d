//! Simulation events pushed to the presentation sink
//!
//! Every entity task produces `SimEvent`s into one FIFO channel. Events from
//! the same entity therefore arrive in the order they were produced; there is
//! no ordering across entities.

use crate::domain::types::{TrafficLightColor, VehicleId};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum SimEvent {
    /// A light transitioned to a new color
    LightChanged { position: u32, color: TrafficLightColor },
    /// A vehicle moved, or reports standing still at a red light
    VehicleUpdate { id: VehicleId, position: u32, speed: u32 },
    /// Decorative wall clock update (HH:MM:SS)
    ClockTick { time: String },
    /// Countdown notice emitted when shutdown begins
    ShutdownNotice { message: String },
}

impl SimEvent {
    /// Countdown notice for a shutdown that completes after `grace`
    pub fn shutdown_notice(grace: Duration) -> Self {
        let ms = grace.as_millis();
        let message = match (ms / 1000, ms % 1000) {
            (1, 0) => "Shutting down in 1 second...".to_string(),
            (secs, 0) => format!("Shutting down in {} seconds...", secs),
            _ => format!("Shutting down in {} ms...", ms),
        };
        SimEvent::ShutdownNotice { message }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SimEvent::LightChanged { .. } => "light_changed",
            SimEvent::VehicleUpdate { .. } => "vehicle_update",
            SimEvent::ClockTick { .. } => "clock_tick",
            SimEvent::ShutdownNotice { .. } => "shutdown_notice",
        }
    }
}
