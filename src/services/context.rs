//! Handles every entity task is launched with

use crate::infra::metrics::Metrics;
use crate::io::EventSender;
use std::sync::Arc;
use tokio::sync::watch;

/// Shared plumbing for light, vehicle and clock tasks
#[derive(Clone)]
pub struct TaskContext {
    /// Outbound events to the dispatcher
    pub events: EventSender,
    pub metrics: Arc<Metrics>,
    /// Process-wide cancellation; flips to true once
    pub shutdown: watch::Receiver<bool>,
}

impl TaskContext {
    pub fn new(events: EventSender, metrics: Arc<Metrics>, shutdown: watch::Receiver<bool>) -> Self {
        Self { events, metrics, shutdown }
    }
}
