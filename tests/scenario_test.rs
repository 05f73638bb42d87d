//! End-to-end simulation scenarios on the paused tokio clock

use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::mpsc;
use track_sim::domain::{HoldDurations, SimEvent, TrafficLightColor, VehicleId};
use track_sim::infra::{Config, Metrics};
use track_sim::io::{create_event_channel, EventDispatcher, JsonlSink, PresentationSink};
use track_sim::services::SimulationController;

fn controller(config: Config) -> (Arc<SimulationController>, mpsc::Receiver<SimEvent>) {
    let (events, rx) = create_event_channel(64 * 1024);
    let controller = SimulationController::new(config, events, Arc::new(Metrics::new()));
    (Arc::new(controller), rx)
}

fn drain(rx: &mut mpsc::Receiver<SimEvent>) -> Vec<SimEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

async fn wait_for_arrival(controller: &SimulationController, max_secs: u64) {
    for _ in 0..max_secs {
        if controller.status().vehicles.iter().all(|v| v.arrived) {
            return;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    panic!("vehicles did not arrive within {}s", max_secs);
}

fn updates_for(events: &[SimEvent], vehicle: VehicleId) -> Vec<(u32, u32)> {
    events
        .iter()
        .filter_map(|e| match e {
            SimEvent::VehicleUpdate { id, position, speed } if *id == vehicle => Some((*position, *speed)),
            _ => None,
        })
        .collect()
}

fn assert_monotonic_within_track(updates: &[(u32, u32)], track_length: u32) {
    let mut last = 0;
    for &(position, _) in updates {
        assert!(position >= last, "position went back from {} to {}", last, position);
        assert!(position <= track_length);
        last = position;
    }
}

#[tokio::test(start_paused = true)]
async fn test_vehicle_holds_at_red_until_light_changes() {
    let config = Config::default()
        .with_initial_lights(vec![1250])
        .with_initial_speeds(vec![15])
        .with_holds(HoldDurations {
            red: Duration::from_secs(10),
            green: Duration::from_secs(2),
            yellow: Duration::from_secs(4),
        });
    let (ctl, mut rx) = controller(config);
    ctl.start().unwrap();
    wait_for_arrival(&ctl, 120).await;

    let events = drain(&mut rx);
    let updates = updates_for(&events, VehicleId(1));
    assert_monotonic_within_track(&updates, 5000);

    // Free running until the braking window is entered
    let first_stop = updates.iter().position(|&(_, speed)| speed == 0).unwrap();
    let approach: Vec<(u32, u32)> = (1..=77).map(|k| (15 * k, 15)).collect();
    assert_eq!(&updates[..first_stop], &approach[..]);
    assert_eq!(updates[first_stop], (1155, 0));

    // Nothing moves until the light shows green
    let green_at = events
        .iter()
        .position(|e| {
            *e == SimEvent::LightChanged { position: 1250, color: TrafficLightColor::Green }
        })
        .unwrap();
    let stop_at = events
        .iter()
        .position(|e| *e == SimEvent::VehicleUpdate { id: VehicleId(1), position: 1155, speed: 0 })
        .unwrap();
    assert!(stop_at < green_at);
    let resumed_at = events
        .iter()
        .position(|e| matches!(e, SimEvent::VehicleUpdate { position: 1170, .. }))
        .unwrap();
    assert!(resumed_at > green_at);
    assert_eq!(updates[first_stop + 1], (1170, 15));

    // Arrival is the last update and reports zero speed
    assert_eq!(updates.last(), Some(&(5000, 0)));
    assert_eq!(updates.iter().filter(|&&(p, _)| p == 5000).count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_clamped_arrival_is_final_update() {
    let config = Config::default().with_initial_lights(vec![]).with_initial_speeds(vec![9]);
    let (ctl, mut rx) = controller(config);
    ctl.start().unwrap();
    wait_for_arrival(&ctl, 60).await;

    tokio::time::sleep(Duration::from_secs(5)).await;
    let updates = updates_for(&drain(&mut rx), VehicleId(1));

    assert_eq!(updates.len(), 556);
    assert_eq!(updates[554], (4995, 9));
    assert_eq!(updates[555], (5000, 0));
    assert!(updates[..555].iter().all(|&(_, speed)| speed == 9));
}

#[tokio::test(start_paused = true)]
async fn test_reference_run_stays_on_track() {
    let (ctl, mut rx) = controller(Config::default());
    ctl.start().unwrap();
    wait_for_arrival(&ctl, 300).await;

    let events = drain(&mut rx);
    for id in 1..=3 {
        let updates = updates_for(&events, VehicleId(id));
        assert_monotonic_within_track(&updates, 5000);
        assert_eq!(updates.last(), Some(&(5000, 0)));
    }

    // Each light cycles red, green, yellow with no skips
    for position in [1250, 2500, 3750] {
        let colors: Vec<TrafficLightColor> = events
            .iter()
            .filter_map(|e| match e {
                SimEvent::LightChanged { position: p, color } if *p == position => Some(*color),
                _ => None,
            })
            .collect();
        assert!(colors.len() > 3);
        let mut expected = TrafficLightColor::Red;
        for color in colors {
            expected = expected.next();
            assert_eq!(color, expected);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_pipeline_writes_event_log_and_drains_on_stop() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.jsonl");

    let config = Config::default().with_shutdown_grace(Duration::from_secs(1));
    let metrics = Arc::new(Metrics::new());
    let (events, rx) = create_event_channel(config.event_channel_capacity());
    let ctl = Arc::new(SimulationController::new(config, events, metrics.clone()));

    let sinks: Vec<Box<dyn PresentationSink>> = vec![Box::new(JsonlSink::open(&path, "scenario").unwrap())];
    let dispatcher = tokio::spawn(EventDispatcher::new(rx, sinks, metrics.clone()).run(ctl.stopped_signal()));

    ctl.start().unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    ctl.add_light(None).unwrap();
    ctl.stop().await.unwrap();

    let dispatched = dispatcher.await.unwrap();
    assert!(dispatched > 0);
    assert_eq!(metrics.events_dispatched_total(), dispatched);

    let content = std::fs::read_to_string(&path).unwrap();
    let records: Vec<serde_json::Value> =
        content.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(records.len() as u64, dispatched);
    assert!(records.iter().all(|r| r["run_id"] == "scenario"));

    let kinds: Vec<&str> = records.iter().map(|r| r["t"].as_str().unwrap()).collect();
    assert!(kinds.contains(&"light_changed"));
    assert!(kinds.contains(&"vehicle_update"));
    assert!(kinds.contains(&"clock_tick"));
    assert_eq!(kinds.iter().filter(|k| **k == "shutdown_notice").count(), 1);
    let notice = records.iter().find(|r| r["t"] == "shutdown_notice").unwrap();
    assert_eq!(notice["message"], "Shutting down in 1 second...");
}
