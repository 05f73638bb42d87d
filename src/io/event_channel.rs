//! Typed channel carrying simulation events to the dispatcher
//!
//! Every entity task holds a clone of `EventSender`. The channel is a single
//! bounded FIFO, so events from one entity keep their production order.
//! Sends wait for capacity rather than dropping: a light change or a vehicle
//! arrival must never be lost.

use crate::domain::SimEvent;
use tokio::sync::mpsc;

/// The dispatcher side of the channel is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventChannelClosed;

impl std::fmt::Display for EventChannelClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("event channel closed")
    }
}

impl std::error::Error for EventChannelClosed {}

/// Sender handle for simulation events
///
/// Clone this to share across entity tasks.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<SimEvent>,
}

impl EventSender {
    pub fn new(tx: mpsc::Sender<SimEvent>) -> Self {
        Self { tx }
    }

    /// Publish an event, waiting for channel capacity
    pub async fn send(&self, event: SimEvent) -> Result<(), EventChannelClosed> {
        self.tx.send(event).await.map_err(|_| EventChannelClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Create a new event channel pair
///
/// Returns (sender, receiver) where sender can be cloned and shared.
pub fn create_event_channel(buffer_size: usize) -> (EventSender, mpsc::Receiver<SimEvent>) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (EventSender::new(tx), rx)
}
