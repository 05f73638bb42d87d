//! Presentation sinks - consumers of simulation events
//!
//! The dispatcher owns every sink and calls them one event at a time, so a
//! sink needs no internal synchronization.

use crate::domain::SimEvent;
use tracing::info;

/// Something that displays or records simulation state changes
pub trait PresentationSink: Send {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Handle one event. An error is counted and logged but never stops the run.
    fn deliver(&mut self, event: &SimEvent) -> anyhow::Result<()>;

    /// Called once after the last event
    fn finish(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Renders every event as one structured log line
#[derive(Debug, Default)]
pub struct LogSink {
    /// Clock ticks are noisy; they are only logged when enabled
    show_clock: bool,
}

impl LogSink {
    pub fn new(show_clock: bool) -> Self {
        Self { show_clock }
    }
}

impl PresentationSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn deliver(&mut self, event: &SimEvent) -> anyhow::Result<()> {
        match event {
            SimEvent::LightChanged { position, color } => {
                info!(position = %position, color = %color, "light_changed");
            }
            SimEvent::VehicleUpdate { id, position, speed } => {
                info!(vehicle = %id, position = %position, speed = %speed, "vehicle_update");
            }
            SimEvent::ClockTick { time } => {
                if self.show_clock {
                    info!(time = %time, "clock_tick");
                }
            }
            SimEvent::ShutdownNotice { message } => {
                info!(message = %message, "shutdown_notice");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TrafficLightColor, VehicleId};

    #[test]
    fn test_log_sink_accepts_every_event() {
        let mut sink = LogSink::new(true);
        let events = [
            SimEvent::LightChanged { position: 1250, color: TrafficLightColor::Green },
            SimEvent::VehicleUpdate { id: VehicleId(1), position: 15, speed: 15 },
            SimEvent::ClockTick { time: "10:00:00".to_string() },
            SimEvent::ShutdownNotice { message: "Shutting down in 3 seconds...".to_string() },
        ];
        for event in &events {
            sink.deliver(event).unwrap();
        }
        sink.finish().unwrap();
        assert_eq!(sink.name(), "log");
    }
}
