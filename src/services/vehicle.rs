//! Vehicle task: one car moving along the track
//!
//! Each tick the vehicle looks up the lights whose braking window contains
//! its current position and evaluates them in ascending order. A red light
//! stops the tick: the vehicle reports speed 0 and waits for that light to
//! leave red before looking at the rest. A yellow light halves the speed.
//! Pause preempts everything, including a wait at red.

use crate::domain::motion::TickPlan;
use crate::domain::{BrakingWindow, SimEvent, VehicleId};
use crate::infra::signal::{paused, shutdown_requested, until_resumed, PauseSwitch};
use crate::services::context::TaskContext;
use crate::services::registry::TrackRegistry;
use crate::services::traffic_light::TrafficLight;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

/// Motion parameters fixed for the life of a vehicle
#[derive(Debug, Clone, Copy)]
pub struct VehicleParams {
    pub base_speed: u32,
    pub track_length: u32,
    pub tick: Duration,
    pub window: BrakingWindow,
}

pub struct Vehicle {
    id: VehicleId,
    params: VehicleParams,
    /// Written only by the vehicle's own task
    position: AtomicU32,
    arrived: AtomicBool,
    pause: PauseSwitch,
}

/// How a wait inside a tick ended
enum Wake {
    Proceed,
    Stop,
}

impl Vehicle {
    pub fn new(id: VehicleId, params: VehicleParams, paused: bool) -> Self {
        Self::starting_at(id, params, 0, paused)
    }

    pub fn starting_at(id: VehicleId, params: VehicleParams, position: u32, paused: bool) -> Self {
        let position = position.min(params.track_length);
        Self {
            id,
            params,
            position: AtomicU32::new(position),
            arrived: AtomicBool::new(false),
            pause: PauseSwitch::new(paused),
        }
    }

    pub fn id(&self) -> VehicleId {
        self.id
    }

    pub fn base_speed(&self) -> u32 {
        self.params.base_speed
    }

    pub fn position(&self) -> u32 {
        self.position.load(Ordering::Acquire)
    }

    pub fn has_arrived(&self) -> bool {
        self.arrived.load(Ordering::Acquire)
    }

    pub fn pause(&self) -> bool {
        self.pause.pause()
    }

    pub fn resume(&self) -> bool {
        self.pause.resume()
    }

    pub fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }

    /// Tick loop; ends on arrival, shutdown, or a closed event channel
    pub async fn run(self: Arc<Self>, registry: TrackRegistry, ctx: TaskContext) {
        let TaskContext { events, metrics, mut shutdown } = ctx;
        let mut pause_rx = self.pause.subscribe();

        info!(
            vehicle = %self.id,
            base_speed = %self.params.base_speed,
            position = %self.position(),
            "vehicle_started"
        );

        if self.position() >= self.params.track_length {
            self.arrived.store(true, Ordering::Release);
            let _ = events
                .send(SimEvent::VehicleUpdate { id: self.id, position: self.position(), speed: 0 })
                .await;
            return;
        }

        loop {
            if !until_resumed(&mut pause_rx, &mut shutdown).await {
                break;
            }

            // Relevance is decided on the position before this tick's advance
            let position = self.position();
            let mut plan = TickPlan::default();

            for light in registry.relevant(position, self.params.window) {
                if !plan.observe(light.current_color()) {
                    continue;
                }
                debug!(vehicle = %self.id, light = %light.position(), "vehicle_stopped_at_red");
                let stopped = SimEvent::VehicleUpdate { id: self.id, position, speed: 0 };
                if events.send(stopped).await.is_err() {
                    return;
                }

                let waited_from = Instant::now();
                match self.hold_at_red(&light, &mut pause_rx, &mut shutdown).await {
                    Wake::Proceed => {}
                    Wake::Stop => return,
                }
                metrics.record_red_wait(waited_from.elapsed().as_millis() as u64);
                debug!(vehicle = %self.id, light = %light.position(), "vehicle_released");
            }

            if !plan.blocked {
                // A pause that landed while the lights were evaluated still wins
                if !until_resumed(&mut pause_rx, &mut shutdown).await {
                    break;
                }
            }

            if let Some(step) = plan.apply(position, self.params.base_speed, self.params.track_length) {
                self.position.store(step.position, Ordering::Release);
                metrics.record_vehicle_move();

                let update = SimEvent::VehicleUpdate { id: self.id, position: step.position, speed: step.speed };
                if events.send(update).await.is_err() {
                    return;
                }

                if step.arrived {
                    self.arrived.store(true, Ordering::Release);
                    metrics.record_vehicle_arrived();
                    info!(vehicle = %self.id, position = %step.position, "vehicle_arrived");
                    return;
                }
            }

            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                _ = sleep(self.params.tick) => {}
            }
        }

        debug!(vehicle = %self.id, position = %self.position(), "vehicle_shutdown");
    }

    /// Block until `light` leaves red
    ///
    /// While paused the vehicle stays put even if the light changes; once
    /// resumed it re-reads the light's current color.
    async fn hold_at_red(
        &self,
        light: &TrafficLight,
        pause_rx: &mut watch::Receiver<bool>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Wake {
        loop {
            tokio::select! {
                biased;
                _ = shutdown_requested(shutdown) => return Wake::Stop,
                _ = paused(pause_rx) => {
                    if !until_resumed(pause_rx, shutdown).await {
                        return Wake::Stop;
                    }
                }
                _ = light.wait_while_red() => return Wake::Proceed,
            }
        }
    }
}
