//! Simulation lifecycle: start, pause broadcast, runtime admission, shutdown
//!
//! The controller is the only writer of the track registry and the only
//! holder of every entity handle. Admission and the pause broadcast share
//! one lock, and new entities are created in the controller's current pause
//! state, so a pause can never miss an entity admitted concurrently.


use crate::domain::{CommandError, EntityKind, SimEvent, TrafficLightColor, VehicleId};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::EventSender;
use crate::services::clock::SimulationClock;
use crate::services::context::TaskContext;
use crate::services::registry::TrackRegistry;
use crate::services::traffic_light::TrafficLight;
use crate::services::vehicle::{Vehicle, VehicleParams};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Stopping,
}

/// Everything guarded by the controller lock
struct ControllerState {
    phase: Phase,
    paused: bool,
    clock: Option<Arc<SimulationClock>>,
    lights: Vec<Arc<TrafficLight>>,
    vehicles: Vec<Arc<Vehicle>>,
    extra_vehicles: usize,
    extra_lights: usize,
    next_vehicle_id: u32,
    tasks: Vec<JoinHandle<()>>,
}

impl ControllerState {
    fn new() -> Self {
        Self {
            phase: Phase::Idle,
            paused: false,
            clock: None,
            lights: Vec::new(),
            vehicles: Vec::new(),
            extra_vehicles: 0,
            extra_lights: 0,
            next_vehicle_id: 1,
            tasks: Vec::new(),
        }
    }

    /// Gate for commands that need a running simulation
    fn ensure_running(&self) -> Result<(), CommandError> {
        match self.phase {
            Phase::Idle => Err(CommandError::NotStarted),
            Phase::Running => Ok(()),
            Phase::Stopping => Err(CommandError::ShuttingDown),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightStatus {
    pub position: u32,
    pub color: TrafficLightColor,
    pub changes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleStatus {
    pub id: VehicleId,
    pub position: u32,
    pub base_speed: u32,
    pub arrived: bool,
}

/// Point-in-time view for the `status` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationStatus {
    pub phase: Phase,
    pub paused: bool,
    /// Ascending by position
    pub lights: Vec<LightStatus>,
    /// In admission order
    pub vehicles: Vec<VehicleStatus>,
}

impl SimulationStatus {
    pub fn started(&self) -> bool {
        self.phase != Phase::Idle
    }

    pub fn stopping(&self) -> bool {
        self.phase == Phase::Stopping
    }

    pub fn log(&self) {
        info!(
            started = %self.started(),
            paused = %self.paused,
            stopping = %self.stopping(),
            lights = %self.lights.len(),
            vehicles = %self.vehicles.len(),
            "status"
        );
        for light in &self.lights {
            info!(position = %light.position, color = %light.color, changes = %light.changes, "status_light");
        }
        for vehicle in &self.vehicles {
            info!(
                vehicle = %vehicle.id,
                position = %vehicle.position,
                base_speed = %vehicle.base_speed,
                arrived = %vehicle.arrived,
                "status_vehicle"
            );
        }
    }
}

pub struct SimulationController {
    config: Config,
    registry: TrackRegistry,
    events: EventSender,
    metrics: Arc<Metrics>,
    shutdown_tx: watch::Sender<bool>,
    /// Flips to true once every entity task has been awaited
    stopped_tx: watch::Sender<bool>,
    state: Mutex<ControllerState>,
}

impl SimulationController {
    pub fn new(config: Config, events: EventSender, metrics: Arc<Metrics>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let (stopped_tx, _) = watch::channel(false);
        Self {
            config,
            registry: TrackRegistry::new(),
            events,
            metrics,
            shutdown_tx,
            stopped_tx,
            state: Mutex::new(ControllerState::new()),
        }
    }

    pub fn registry(&self) -> &TrackRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Receiver that turns true after `stop()` finished awaiting all tasks
    pub fn stopped_signal(&self) -> watch::Receiver<bool> {
        self.stopped_tx.subscribe()
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped_tx.borrow()
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    fn task_context(&self) -> TaskContext {
        TaskContext::new(self.events.clone(), self.metrics.clone(), self.shutdown_tx.subscribe())
    }

    fn vehicle_params(&self, base_speed: u32) -> VehicleParams {
        VehicleParams {
            base_speed,
            track_length: self.config.track_length(),
            tick: self.config.tick_period(),
            window: self.config.braking_window(),
        }
    }

    fn reject<T>(&self, command: &'static str, err: CommandError) -> Result<T, CommandError> {
        self.metrics.record_command_rejected();
        debug!(command = command, reason = err.as_str(), "command_rejected");
        Err(err)
    }

    /// Launch the clock, the configured lights and the configured vehicles
    pub fn start(&self) -> Result<(), CommandError> {
        let mut state = self.state.lock();
        match state.phase {
            Phase::Idle => {}
            Phase::Running => return self.reject("start", CommandError::AlreadyStarted),
            Phase::Stopping => return self.reject("start", CommandError::ShuttingDown),
        }

        let clock = Arc::new(SimulationClock::new(self.config.clock_interval(), false));
        state.tasks.push(tokio::spawn(clock.clone().run(self.task_context())));
        state.clock = Some(clock);

        for &position in self.config.initial_lights() {
            if position > self.config.track_length() {
                warn!(position = %position, track_length = %self.config.track_length(), "initial_light_beyond_track");
                continue;
            }
            let light = Arc::new(TrafficLight::new(position, false));
            if let Err(e) = self.registry.insert(light.clone()) {
                warn!(position = %position, error = %e, "initial_light_skipped");
                continue;
            }
            self.spawn_light(&mut state, light);
        }

        for &base_speed in self.config.initial_speeds() {
            if base_speed == 0 {
                warn!("initial_vehicle_zero_speed_skipped");
                continue;
            }
            self.spawn_vehicle(&mut state, base_speed);
        }

        state.phase = Phase::Running;
        info!(
            lights = %state.lights.len(),
            vehicles = %state.vehicles.len(),
            track_length = %self.config.track_length(),
            "simulation_started"
        );
        Ok(())
    }

    fn spawn_light(&self, state: &mut ControllerState, light: Arc<TrafficLight>) {
        let task = tokio::spawn(light.clone().run(self.config.holds(), self.task_context()));
        state.tasks.push(task);
        state.lights.push(light);
    }

    fn spawn_vehicle(&self, state: &mut ControllerState, base_speed: u32) -> VehicleId {
        let id = VehicleId(state.next_vehicle_id);
        state.next_vehicle_id += 1;
        let vehicle = Arc::new(Vehicle::new(id, self.vehicle_params(base_speed), state.paused));
        let task = tokio::spawn(vehicle.clone().run(self.registry.clone(), self.task_context()));
        state.tasks.push(task);
        state.vehicles.push(vehicle);
        id
    }

    /// Pause every live entity. Idempotent.
    pub fn pause_all(&self) -> Result<(), CommandError> {
        self.set_paused("pause", true)
    }

    /// Resume every live entity. Idempotent.
    pub fn resume_all(&self) -> Result<(), CommandError> {
        self.set_paused("resume", false)
    }

    fn set_paused(&self, command: &'static str, paused: bool) -> Result<(), CommandError> {
        let mut state = self.state.lock();
        if state.phase == Phase::Idle {
            return self.reject(command, CommandError::NotStarted);
        }
        if state.paused == paused {
            debug!(paused = %paused, "pause_state_unchanged");
            return Ok(());
        }
        state.paused = paused;

        // Arrived vehicles are paused too; their tasks are already gone
        if paused {
            state.lights.iter().for_each(|light| {
                light.pause();
            });
            state.vehicles.iter().for_each(|vehicle| {
                vehicle.pause();
            });
            if let Some(clock) = &state.clock {
                clock.pause();
            }
        } else {
            state.lights.iter().for_each(|light| {
                light.resume();
            });
            state.vehicles.iter().for_each(|vehicle| {
                vehicle.resume();
            });
            if let Some(clock) = &state.clock {
                clock.resume();
            }
        }

        info!(
            paused = %paused,
            lights = %state.lights.len(),
            vehicles = %state.vehicles.len(),
            "simulation_pause_changed"
        );
        Ok(())
    }

    /// Admit one more vehicle at the start of the track
    pub fn add_vehicle(&self, base_speed: Option<u32>) -> Result<VehicleId, CommandError> {
        let mut state = self.state.lock();
        if let Err(e) = state.ensure_running() {
            return self.reject("add-vehicle", e);
        }
        let max = self.config.max_extra_vehicles();
        if state.extra_vehicles >= max {
            return self.reject("add-vehicle", CommandError::CapacityReached { kind: EntityKind::Vehicle, max });
        }
        let base_speed = base_speed.unwrap_or(self.config.extra_vehicle_speed());
        if base_speed == 0 {
            return self.reject("add-vehicle", CommandError::InvalidSpeed);
        }

        let id = self.spawn_vehicle(&mut state, base_speed);
        state.extra_vehicles += 1;
        self.metrics.record_admitted();
        info!(vehicle = %id, base_speed = %base_speed, paused = %state.paused, "vehicle_admitted");
        Ok(id)
    }

    /// Admit one more light and register its intersection
    pub fn add_light(&self, position: Option<u32>) -> Result<u32, CommandError> {
        let mut state = self.state.lock();
        if let Err(e) = state.ensure_running() {
            return self.reject("add-light", e);
        }
        let max = self.config.max_extra_lights();
        if state.extra_lights >= max {
            return self.reject("add-light", CommandError::CapacityReached { kind: EntityKind::Light, max });
        }
        let position = position.unwrap_or(self.config.extra_light_position());
        let track_length = self.config.track_length();
        if position > track_length {
            return self.reject("add-light", CommandError::PositionOutOfTrack { position, track_length });
        }

        let light = Arc::new(TrafficLight::new(position, state.paused));
        if let Err(e) = self.registry.insert(light.clone()) {
            return self.reject("add-light", e);
        }
        self.spawn_light(&mut state, light);
        state.extra_lights += 1;
        self.metrics.record_admitted();
        info!(position = %position, paused = %state.paused, "light_admitted");
        Ok(position)
    }

    pub fn status(&self) -> SimulationStatus {
        let state = self.state.lock();
        let lights = self
            .registry
            .snapshot()
            .values()
            .map(|light| {
                let snapshot = light.snapshot();
                LightStatus { position: light.position(), color: snapshot.color, changes: snapshot.changes }
            })
            .collect();
        let vehicles = state
            .vehicles
            .iter()
            .map(|vehicle| VehicleStatus {
                id: vehicle.id(),
                position: vehicle.position(),
                base_speed: vehicle.base_speed(),
                arrived: vehicle.has_arrived(),
            })
            .collect();
        SimulationStatus { phase: state.phase, paused: state.paused, lights, vehicles }
    }

    /// Delayed shutdown
    ///
    /// Publishes the countdown notice, waits the grace period, cancels every
    /// entity task and awaits them all. Only the first call does anything.
    pub async fn stop(&self) -> Result<(), CommandError> {
        {
            let mut state = self.state.lock();
            if state.phase == Phase::Stopping {
                return self.reject("stop", CommandError::ShuttingDown);
            }
            state.phase = Phase::Stopping;
        }

        let grace = self.config.shutdown_grace();
        info!(grace_ms = %grace.as_millis(), "simulation_stopping");
        if self.events.send(SimEvent::shutdown_notice(grace)).await.is_err() {
            debug!("shutdown_notice_undelivered");
        }

        sleep(grace).await;

        self.shutdown_tx.send_replace(true);
        let tasks = std::mem::take(&mut self.state.lock().tasks);
        let count = tasks.len();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "entity_task_failed");
            }
        }

        self.stopped_tx.send_replace(true);
        info!(tasks = %count, "simulation_stopped");
        Ok(())
    }
}
