//! Traffic light state machine and its scheduling task
//!
//! A light's color and change counter live together in a `watch` channel:
//! vehicles read a consistent snapshot under a short read lock, and anything
//! waiting on a color change is woken by the same send that publishes it.
//! Only the light's own task calls `advance()`.

use crate::domain::{HoldDurations, SimEvent, TrafficLightColor};
use crate::infra::signal::{paused, shutdown_requested, until_resumed, PauseSwitch};
use crate::services::context::TaskContext;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info};

/// Color plus the number of transitions made so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightState {
    pub color: TrafficLightColor,
    pub changes: u64,
}

pub struct TrafficLight {
    /// Intersection offset along the track
    position: u32,
    state: watch::Sender<LightState>,
    pause: PauseSwitch,
}

impl TrafficLight {
    /// Create a light that starts red
    pub fn new(position: u32, paused: bool) -> Self {
        Self::with_color(position, TrafficLightColor::Red, paused)
    }

    pub fn with_color(position: u32, color: TrafficLightColor, paused: bool) -> Self {
        let (state, _rx) = watch::channel(LightState { color, changes: 0 });
        Self { position, state, pause: PauseSwitch::new(paused) }
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn current_color(&self) -> TrafficLightColor {
        self.state.borrow().color
    }

    pub fn snapshot(&self) -> LightState {
        *self.state.borrow()
    }

    pub fn changes(&self) -> u64 {
        self.state.borrow().changes
    }

    /// Step to the next color and return the event describing it
    pub fn advance(&self) -> SimEvent {
        let mut color = TrafficLightColor::Red;
        self.state.send_modify(|state| {
            state.color = state.color.next();
            state.changes += 1;
            color = state.color;
        });
        SimEvent::LightChanged { position: self.position, color }
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

    pub fn subscribe(&self) -> watch::Receiver<LightState> {
        self.state.subscribe()
    }

    /// Wait until the light changes color at least once after this call
    pub async fn wait_for_change(&self) {
        let mut rx = self.state.subscribe();
        let start = rx.borrow_and_update().changes;
        // The sender lives as long as `self`, so this only ends on a change
        let _ = rx.wait_for(|state| state.changes > start).await;
    }

    /// Wait until the light shows anything but red
    pub async fn wait_while_red(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|state| state.color != TrafficLightColor::Red).await;
    }

    /// Scheduling loop: hold the current color, then advance, forever
    ///
    /// A pause abandons the running hold; after resume the light starts a
    /// fresh full hold of the same color. Ends on shutdown or when the
    /// event channel closes.
    pub async fn run(self: Arc<Self>, holds: HoldDurations, ctx: TaskContext) {
        let TaskContext { events, metrics, mut shutdown } = ctx;
        let mut pause_rx = self.pause.subscribe();

        info!(position = %self.position, color = %self.current_color(), "light_started");

        loop {
            if !until_resumed(&mut pause_rx, &mut shutdown).await {
                break;
            }

            let hold = self.current_color().hold(&holds);
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                _ = paused(&mut pause_rx) => {
                    debug!(position = %self.position, "light_hold_abandoned");
                    continue;
                }
                _ = sleep(hold) => {}
            }

            let event = self.advance();
            metrics.record_light_change();
            debug!(position = %self.position, color = %self.current_color(), "light_changed");
            if events.send(event).await.is_err() {
                debug!(position = %self.position, "light_event_channel_closed");
                break;
            }
        }

        info!(position = %self.position, changes = %self.changes(), "light_stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::metrics::Metrics;
    use crate::io::create_event_channel;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    struct Harness {
        ctx: TaskContext,
        rx: mpsc::Receiver<SimEvent>,
        shutdown_tx: watch::Sender<bool>,
    }

    fn harness() -> Harness {
        let (events, rx) = create_event_channel(64);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ctx = TaskContext::new(events, Arc::new(Metrics::new()), shutdown_rx);
        Harness { ctx, rx, shutdown_tx }
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn millis(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    #[test]
    fn test_advance_cycles_and_counts() {
        let light = TrafficLight::new(1250, false);
        assert_eq!(light.current_color(), TrafficLightColor::Red);

        let event = light.advance();
        assert_eq!(
            event,
            SimEvent::LightChanged { position: 1250, color: TrafficLightColor::Green }
        );
        light.advance();
        assert_eq!(light.current_color(), TrafficLightColor::Yellow);
        light.advance();
        assert_eq!(light.snapshot(), LightState { color: TrafficLightColor::Red, changes: 3 });
    }

    #[test]
    fn test_pause_resume_flags() {
        let light = TrafficLight::new(10, true);
        assert!(light.is_paused());
        assert!(light.resume());
        assert!(!light.is_paused());
        assert!(light.pause());
        assert!(!light.pause());
    }

    #[tokio::test(start_paused = true)]
    async fn test_color_trace_with_hold_durations() {
        let Harness { ctx, mut rx, shutdown_tx } = harness();
        let light = Arc::new(TrafficLight::new(1250, false));
        let task = tokio::spawn(light.clone().run(HoldDurations::default(), ctx));

        let start = Instant::now();
        let mut trace = Vec::new();
        while trace.len() < 7 {
            match rx.recv().await {
                Some(SimEvent::LightChanged { position, color }) => {
                    assert_eq!(position, 1250);
                    trace.push((color, start.elapsed()));
                }
                other => panic!("unexpected event {:?}", other),
            }
        }

        use TrafficLightColor::*;
        let colors: Vec<_> = trace.iter().map(|(c, _)| *c).collect();
        assert_eq!(colors, vec![Green, Yellow, Red, Green, Yellow, Red, Green]);

        // Red 2s, green 2s, yellow 4s
        let times: Vec<_> = trace.iter().map(|(_, t)| t.as_millis()).collect();
        assert_eq!(times, vec![2000, 4000, 8000, 10000, 12000, 16000, 18000]);
        assert_eq!(light.changes(), 7);

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_abandons_partial_hold() {
        let Harness { ctx, mut rx, shutdown_tx } = harness();
        let light = Arc::new(TrafficLight::new(2500, false));
        let task = tokio::spawn(light.clone().run(HoldDurations::default(), ctx));

        // 1.5s into a 2s red hold
        tokio::time::sleep(millis(1500)).await;
        light.pause();
        tokio::time::sleep(secs(10)).await;
        assert_eq!(light.snapshot(), LightState { color: TrafficLightColor::Red, changes: 0 });
        assert!(rx.try_recv().is_err());

        // A fresh 2s hold starts on resume; the earlier 1.5s is not banked
        light.resume();
        tokio::time::sleep(millis(1900)).await;
        assert_eq!(light.current_color(), TrafficLightColor::Red);
        tokio::time::sleep(millis(200)).await;
        assert_eq!(light.current_color(), TrafficLightColor::Green);
        assert!(matches!(rx.try_recv(), Ok(SimEvent::LightChanged { .. })));

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_paused_until_resumed() {
        let Harness { ctx, rx: _rx, shutdown_tx } = harness();
        let light = Arc::new(TrafficLight::new(3750, true));
        let task = tokio::spawn(light.clone().run(HoldDurations::default(), ctx));

        tokio::time::sleep(secs(30)).await;
        assert_eq!(light.changes(), 0);

        light.resume();
        tokio::time::sleep(millis(2100)).await;
        assert_eq!(light.changes(), 1);

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_change() {
        let light = Arc::new(TrafficLight::new(100, false));
        let waiter = {
            let light = light.clone();
            tokio::spawn(async move { light.wait_for_change().await })
        };

        tokio::time::sleep(secs(1)).await;
        assert!(!waiter.is_finished());

        light.advance();
        waiter.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_while_red() {
        let light = Arc::new(TrafficLight::with_color(100, TrafficLightColor::Green, false));
        // Not red: returns immediately
        light.wait_while_red().await;

        let light = Arc::new(TrafficLight::new(100, false));
        let waiter = {
            let light = light.clone();
            tokio::spawn(async move { light.wait_while_red().await })
        };
        tokio::time::sleep(secs(1)).await;
        assert!(!waiter.is_finished());
        light.advance();
        waiter.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_while_paused() {
        let Harness { ctx, rx: _rx, shutdown_tx } = harness();
        let light = Arc::new(TrafficLight::new(1250, true));
        let task = tokio::spawn(light.clone().run(HoldDurations::default(), ctx));

        tokio::time::sleep(secs(1)).await;
        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
        assert_eq!(light.changes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_event_channel_closes() {
        let Harness { ctx, rx, shutdown_tx: _shutdown_tx } = harness();
        drop(rx);
        let light = Arc::new(TrafficLight::new(1250, false));
        let task = tokio::spawn(light.clone().run(HoldDurations::default(), ctx));
        task.await.unwrap();
        assert_eq!(light.changes(), 1);
    }
}
