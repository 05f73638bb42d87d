//! Services - simulation entities and their lifecycle
//!
//! This module contains the concurrent core:
//! - `controller` - Start, pause broadcast, runtime admission, shutdown
//! - `traffic_light` - Light state machine and scheduling task
//! - `vehicle` - Per-tick braking and advance logic
//! - `clock` - Decorative wall-clock ticker
//! - `registry` - Append-only intersection map shared by all vehicles
//! - `context` - Channel and signal handles every task starts with

pub mod clock;
pub mod context;
pub mod controller;
pub mod registry;
pub mod traffic_light;
pub mod vehicle;

// Re-export commonly used types
pub use clock::SimulationClock;
pub use context::TaskContext;
pub use controller::{SimulationController, SimulationStatus};
pub use registry::TrackRegistry;
pub use traffic_light::TrafficLight;
pub use vehicle::{Vehicle, VehicleParams};
