//! Track registry: intersection position -> traffic light
//!
//! Append-only, snapshot-and-swap. Readers clone the current `Arc<BTreeMap>`
//! under a read lock held for a pointer copy, then iterate without any lock.
//! The controller is the only writer; an insert copies the map only if a
//! reader still holds the previous snapshot.

use crate::domain::{BrakingWindow, CommandError};
use crate::services::traffic_light::TrafficLight;
use parking_lot::RwLock;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type LightMap = BTreeMap<u32, Arc<TrafficLight>>;

/// Lights relevant to one vehicle tick, in ascending position
pub type RelevantLights = SmallVec<[Arc<TrafficLight>; 4]>;

#[derive(Clone, Default)]
pub struct TrackRegistry {
    lights: Arc<RwLock<Arc<LightMap>>>,
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current immutable view of all intersections
    pub fn snapshot(&self) -> Arc<LightMap> {
        self.lights.read().clone()
    }

    /// Register a light at its position. Existing entries are never replaced.
    pub fn insert(&self, light: Arc<TrafficLight>) -> Result<(), CommandError> {
        let position = light.position();
        let mut guard = self.lights.write();
        if guard.contains_key(&position) {
            return Err(CommandError::DuplicateIntersection(position));
        }
        Arc::make_mut(&mut *guard).insert(position, light);
        Ok(())
    }

    pub fn contains(&self, position: u32) -> bool {
        self.lights.read().contains_key(&position)
    }

    pub fn get(&self, position: u32) -> Option<Arc<TrafficLight>> {
        self.lights.read().get(&position).cloned()
    }

    pub fn len(&self) -> usize {
        self.lights.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lights whose braking window contains `vehicle_pos`, ascending by position
    pub fn relevant(&self, vehicle_pos: u32, window: BrakingWindow) -> RelevantLights {
        let snapshot = self.snapshot();
        snapshot.range(window.light_range(vehicle_pos)).map(|(_, light)| light.clone()).collect()
    }
}
