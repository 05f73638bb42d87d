//! Wall-clock ticker for the time display
//!
//! Purely decorative: nothing in the simulation reads it, and the clock
//! stopping never affects lights or vehicles.

use crate::domain::SimEvent;
use crate::infra::signal::{paused, shutdown_requested, until_resumed, PauseSwitch};
use crate::services::context::TaskContext;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

pub const CLOCK_FORMAT: &str = "%H:%M:%S";

pub struct SimulationClock {
    interval: Duration,
    pause: PauseSwitch,
}

impl SimulationClock {
    pub fn new(interval: Duration, paused: bool) -> Self {
        Self { interval, pause: PauseSwitch::new(paused) }
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

    /// Publish the local time every interval while not paused
    ///
    /// Ticks missed while paused are dropped; the first tick after resume
    /// comes one full interval later.
    pub async fn run(self: std::sync::Arc<Self>, ctx: TaskContext) {
        let TaskContext { events, mut shutdown, .. } = ctx;
        let mut pause_rx = self.pause.subscribe();

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip the immediate first tick
        ticker.reset();

        loop {
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                _ = paused(&mut pause_rx) => {
                    if !until_resumed(&mut pause_rx, &mut shutdown).await {
                        break;
                    }
                    ticker.reset();
                }
                _ = ticker.tick() => {
                    let time = chrono::Local::now().format(CLOCK_FORMAT).to_string();
                    if events.send(SimEvent::ClockTick { time }).await.is_err() {
                        break;
                    }
                }
            }
        }

        debug!("clock_stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::metrics::Metrics;
    use crate::io::create_event_channel;
    use std::sync::Arc;
    use tokio::sync::{mpsc, watch};

    fn count_ticks(rx: &mut mpsc::Receiver<SimEvent>) -> usize {
        let mut n = 0;
        while let Ok(event) = rx.try_recv() {
            if let SimEvent::ClockTick { time } = event {
                assert_eq!(time.len(), 8);
                n += 1;
            }
        }
        n
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_pause_and_resume_without_catch_up() {
        let (events, mut rx) = create_event_channel(64);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ctx = TaskContext::new(events, Arc::new(Metrics::new()), shutdown_rx);
        let clock = Arc::new(SimulationClock::new(Duration::from_secs(1), false));
        let task = tokio::spawn(clock.clone().run(ctx));

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(count_ticks(&mut rx), 3);

        clock.pause();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count_ticks(&mut rx), 0);

        clock.resume();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count_ticks(&mut rx), 0);
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(count_ticks(&mut rx), 1);

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_while_paused() {
        let (events, _rx) = create_event_channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ctx = TaskContext::new(events, Arc::new(Metrics::new()), shutdown_rx);
        let clock = Arc::new(SimulationClock::new(Duration::from_secs(1), true));
        let task = tokio::spawn(clock.clone().run(ctx));

        tokio::time::sleep(Duration::from_secs(2)).await;
        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
        assert!(clock.is_paused());
    }
}
