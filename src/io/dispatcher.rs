//! Event dispatcher - forwards simulation events to presentation sinks
//!
//! The dispatcher is the only consumer of the event channel. It delivers each
//! event to every sink in turn, so per-entity ordering survives all the way to
//! the sink. Once the controller reports that all entity tasks are joined,
//! the dispatcher drains what is still buffered and exits.

use crate::domain::SimEvent;
use crate::infra::metrics::Metrics;
use crate::infra::signal::shutdown_requested;
use crate::io::sink::PresentationSink;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

pub struct EventDispatcher {
    rx: mpsc::Receiver<SimEvent>,
    sinks: Vec<Box<dyn PresentationSink>>,
    metrics: Arc<Metrics>,
    // Rate-limit sink failure warnings to 1 per second
    last_error_warn: Option<Instant>,
}

impl EventDispatcher {
    pub fn new(
        rx: mpsc::Receiver<SimEvent>,
        sinks: Vec<Box<dyn PresentationSink>>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { rx, sinks, metrics, last_error_warn: None }
    }

    /// Run until the channel closes or `stopped` flips to true
    ///
    /// Returns the number of events dispatched.
    pub async fn run(mut self, mut stopped: watch::Receiver<bool>) -> u64 {
        let names: Vec<&str> = self.sinks.iter().map(|s| s.name()).collect();
        info!(sinks = ?names, "dispatcher_started");

        let mut dispatched = 0u64;
        loop {
            tokio::select! {
                biased;
                event = self.rx.recv() => match event {
                    Some(event) => {
                        self.dispatch(&event);
                        dispatched += 1;
                    }
                    None => {
                        debug!("dispatcher_channel_closed");
                        break;
                    }
                },
                _ = shutdown_requested(&mut stopped) => {
                    // No producer is left; empty the buffer and leave
                    while let Ok(event) = self.rx.try_recv() {
                        self.dispatch(&event);
                        dispatched += 1;
                    }
                    break;
                }
            }
        }

        for sink in &mut self.sinks {
            if let Err(e) = sink.finish() {
                warn!(sink = %sink.name(), error = %e, "sink_finish_failed");
            }
        }
        info!(events = %dispatched, "dispatcher_stopped");
        dispatched
    }

    fn dispatch(&mut self, event: &SimEvent) {
        self.metrics.record_event_dispatched();
        for sink in &mut self.sinks {
            if let Err(e) = sink.deliver(event) {
                self.metrics.record_sink_error();
                let now = Instant::now();
                let quiet = self
                    .last_error_warn
                    .is_some_and(|last| now.duration_since(last) < Duration::from_secs(1));
                if !quiet {
                    warn!(sink = %sink.name(), event = %event.as_str(), error = %e, "sink_delivery_failed");
                    self.last_error_warn = Some(now);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VehicleId;
    use crate::io::create_event_channel;
    use parking_lot::Mutex;

    /// Records every event it receives
    struct RecordingSink {
        seen: Arc<Mutex<Vec<SimEvent>>>,
        finished: Arc<Mutex<bool>>,
    }

    impl PresentationSink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn deliver(&mut self, event: &SimEvent) -> anyhow::Result<()> {
            self.seen.lock().push(event.clone());
            Ok(())
        }

        fn finish(&mut self) -> anyhow::Result<()> {
            *self.finished.lock() = true;
            Ok(())
        }
    }

    struct FailingSink;

    impl PresentationSink for FailingSink {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn deliver(&mut self, _event: &SimEvent) -> anyhow::Result<()> {
            anyhow::bail!("display gone")
        }
    }

    fn update(position: u32) -> SimEvent {
        SimEvent::VehicleUpdate { id: VehicleId(1), position, speed: 1 }
    }

    #[tokio::test]
    async fn test_forwards_in_order_and_drains_on_stop() {
        let (events, rx) = create_event_channel(64);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let finished = Arc::new(Mutex::new(false));
        let sink = RecordingSink { seen: seen.clone(), finished: finished.clone() };
        let metrics = Arc::new(Metrics::new());
        let (stopped_tx, stopped_rx) = watch::channel(false);

        // Buffered before the dispatcher even starts
        for position in 0..10 {
            events.send(update(position)).await.unwrap();
        }
        stopped_tx.send(true).unwrap();

        let sinks: Vec<Box<dyn PresentationSink>> = vec![Box::new(sink)];
        let dispatcher = EventDispatcher::new(rx, sinks, metrics.clone());
        let count = dispatcher.run(stopped_rx).await;

        assert_eq!(count, 10);
        let positions: Vec<u32> = seen
            .lock()
            .iter()
            .filter_map(|e| match e {
                SimEvent::VehicleUpdate { position, .. } => Some(*position),
                _ => None,
            })
            .collect();
        assert_eq!(positions, (0..10).collect::<Vec<_>>());
        assert!(*finished.lock());
        assert_eq!(metrics.events_dispatched_total(), 10);
    }

    #[tokio::test]
    async fn test_exits_when_all_senders_dropped() {
        let (events, rx) = create_event_channel(8);
        let (_stopped_tx, stopped_rx) = watch::channel(false);
        let metrics = Arc::new(Metrics::new());
        events.send(update(1)).await.unwrap();
        drop(events);

        let dispatcher = EventDispatcher::new(rx, Vec::new(), metrics);
        assert_eq!(dispatcher.run(stopped_rx).await, 1);
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_block_others() {
        let (events, rx) = create_event_channel(8);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink { seen: seen.clone(), finished: Arc::new(Mutex::new(false)) };
        let metrics = Arc::new(Metrics::new());
        let (_stopped_tx, stopped_rx) = watch::channel(false);

        events.send(update(1)).await.unwrap();
        events.send(update(2)).await.unwrap();
        drop(events);

        let sinks: Vec<Box<dyn PresentationSink>> = vec![Box::new(FailingSink), Box::new(sink)];
        let dispatcher = EventDispatcher::new(rx, sinks, metrics.clone());
        dispatcher.run(stopped_rx).await;

        assert_eq!(seen.lock().len(), 2);
        assert_eq!(metrics.report().sink_errors_total, 2);
    }
}
