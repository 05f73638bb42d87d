//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations so vehicle and light tasks never
//! contend on a mutex. Reporting swaps the periodic counters to get a
//! snapshot.
//!
//! NOTE: All atomics use Relaxed ordering intentionally; these are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Exponential bucket boundaries for red-light wait times (milliseconds)
/// Buckets: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200
const BUCKET_BOUNDS: [u64; 10] = [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200];
pub const METRICS_NUM_BUCKETS: usize = 11;

#[inline]
fn bucket_index(wait_ms: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < wait_ms)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

#[inline]
fn swap_buckets(buckets: &[AtomicU64; METRICS_NUM_BUCKETS]) -> [u64; METRICS_NUM_BUCKETS] {
    let mut result = [0u64; METRICS_NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Upper bound of the bucket containing the given percentile
fn percentile_from_buckets(buckets: &[u64; METRICS_NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = ((total as f64 * percentile) as u64).max(1);
    let mut cumulative = 0u64;

    const BUCKET_UPPER_BOUNDS: [u64; METRICS_NUM_BUCKETS] =
        [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200, 102400];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[METRICS_NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
pub struct Metrics {
    /// Light color transitions (monotonic)
    light_changes_total: AtomicU64,
    /// Advancing vehicle ticks (monotonic)
    vehicle_moves_total: AtomicU64,
    /// Vehicles that reached the track end (monotonic)
    vehicles_arrived_total: AtomicU64,
    /// Times a vehicle stopped at a red light (monotonic)
    red_stops_total: AtomicU64,
    /// Red wait histogram (reset on report)
    red_wait_buckets: [AtomicU64; METRICS_NUM_BUCKETS],
    /// Longest red wait since last report (reset on report)
    red_wait_max_ms: AtomicU64,
    /// Events forwarded to sinks (monotonic)
    events_dispatched_total: AtomicU64,
    /// Events since last report (reset on report)
    events_since_report: AtomicU64,
    /// Sink delivery failures (monotonic)
    sink_errors_total: AtomicU64,
    /// Entities admitted at runtime (monotonic)
    admitted_total: AtomicU64,
    /// Commands rejected by the controller (monotonic)
    commands_rejected_total: AtomicU64,
    /// Last report time (only accessed from reporter)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            light_changes_total: AtomicU64::new(0),
            vehicle_moves_total: AtomicU64::new(0),
            vehicles_arrived_total: AtomicU64::new(0),
            red_stops_total: AtomicU64::new(0),
            red_wait_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            red_wait_max_ms: AtomicU64::new(0),
            events_dispatched_total: AtomicU64::new(0),
            events_since_report: AtomicU64::new(0),
            sink_errors_total: AtomicU64::new(0),
            admitted_total: AtomicU64::new(0),
            commands_rejected_total: AtomicU64::new(0),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    #[inline]
    pub fn record_light_change(&self) {
        self.light_changes_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_vehicle_move(&self) {
        self.vehicle_moves_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_vehicle_arrived(&self) {
        self.vehicles_arrived_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed wait at a red light
    #[inline]
    pub fn record_red_wait(&self, wait_ms: u64) {
        self.red_stops_total.fetch_add(1, Ordering::Relaxed);
        self.red_wait_buckets[bucket_index(wait_ms)].fetch_add(1, Ordering::Relaxed);
        update_atomic_max(&self.red_wait_max_ms, wait_ms);
    }

    #[inline]
    pub fn record_event_dispatched(&self) {
        self.events_dispatched_total.fetch_add(1, Ordering::Relaxed);
        self.events_since_report.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_sink_error(&self) {
        self.sink_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_admitted(&self) {
        self.admitted_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_command_rejected(&self) {
        self.commands_rejected_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn light_changes_total(&self) -> u64 {
        self.light_changes_total.load(Ordering::Relaxed)
    }

    pub fn vehicles_arrived_total(&self) -> u64 {
        self.vehicles_arrived_total.load(Ordering::Relaxed)
    }

    pub fn red_stops_total(&self) -> u64 {
        self.red_stops_total.load(Ordering::Relaxed)
    }

    pub fn events_dispatched_total(&self) -> u64 {
        self.events_dispatched_total.load(Ordering::Relaxed)
    }

    pub fn commands_rejected_total(&self) -> u64 {
        self.commands_rejected_total.load(Ordering::Relaxed)
    }

    /// Build a summary, resetting the periodic counters
    pub fn report(&self) -> MetricsSummary {
        let events_count = self.events_since_report.swap(0, Ordering::Relaxed);
        let red_wait_buckets = swap_buckets(&self.red_wait_buckets);
        let red_wait_max_ms = self.red_wait_max_ms.swap(0, Ordering::Relaxed);

        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let events_per_sec = if elapsed.as_secs_f64() > 0.0 {
            events_count as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        MetricsSummary {
            light_changes_total: self.light_changes_total.load(Ordering::Relaxed),
            vehicle_moves_total: self.vehicle_moves_total.load(Ordering::Relaxed),
            vehicles_arrived_total: self.vehicles_arrived_total.load(Ordering::Relaxed),
            red_stops_total: self.red_stops_total.load(Ordering::Relaxed),
            red_wait_buckets,
            red_wait_p50_ms: percentile_from_buckets(&red_wait_buckets, 0.50),
            red_wait_p95_ms: percentile_from_buckets(&red_wait_buckets, 0.95),
            red_wait_max_ms,
            events_dispatched_total: self.events_dispatched_total.load(Ordering::Relaxed),
            events_per_sec,
            sink_errors_total: self.sink_errors_total.load(Ordering::Relaxed),
            admitted_total: self.admitted_total.load(Ordering::Relaxed),
            commands_rejected_total: self.commands_rejected_total.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time metrics snapshot
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub light_changes_total: u64,
    pub vehicle_moves_total: u64,
    pub vehicles_arrived_total: u64,
    pub red_stops_total: u64,
    /// Red wait histogram since last report
    /// Bounds: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200 ms
    pub red_wait_buckets: [u64; METRICS_NUM_BUCKETS],
    pub red_wait_p50_ms: u64,
    pub red_wait_p95_ms: u64,
    pub red_wait_max_ms: u64,
    pub events_dispatched_total: u64,
    pub events_per_sec: f64,
    pub sink_errors_total: u64,
    pub admitted_total: u64,
    pub commands_rejected_total: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            light_changes = %self.light_changes_total,
            vehicle_moves = %self.vehicle_moves_total,
            arrived = %self.vehicles_arrived_total,
            red_stops = %self.red_stops_total,
            red_wait_p50_ms = %self.red_wait_p50_ms,
            red_wait_p95_ms = %self.red_wait_p95_ms,
            red_wait_max_ms = %self.red_wait_max_ms,
            events_total = %self.events_dispatched_total,
            events_per_sec = format!("{:.1}", self.events_per_sec),
            sink_errors = %self.sink_errors_total,
            admitted = %self.admitted_total,
            rejected = %self.commands_rejected_total,
            "metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_index() {
        assert_eq!(bucket_index(0), 0);
        assert_eq!(bucket_index(100), 0);
        assert_eq!(bucket_index(101), 1);
        assert_eq!(bucket_index(2000), 5);
        assert_eq!(bucket_index(60_000), 10);
    }

    #[test]
    fn test_red_wait_recording() {
        let metrics = Metrics::new();
        metrics.record_red_wait(1500);
        metrics.record_red_wait(4000);
        metrics.record_red_wait(50);
        assert_eq!(metrics.red_stops_total(), 3);

        let summary = metrics.report();
        assert_eq!(summary.red_stops_total, 3);
        assert_eq!(summary.red_wait_max_ms, 4000);
        assert_eq!(summary.red_wait_buckets.iter().sum::<u64>(), 3);
        assert_eq!(summary.red_wait_p50_ms, 100);
        assert_eq!(summary.red_wait_p95_ms, 1600);

        // Periodic counters reset, monotonic ones do not
        let summary = metrics.report();
        assert_eq!(summary.red_wait_max_ms, 0);
        assert_eq!(summary.red_wait_buckets.iter().sum::<u64>(), 0);
        assert_eq!(summary.red_stops_total, 3);
    }

    #[test]
    fn test_percentile_empty() {
        assert_eq!(percentile_from_buckets(&[0; METRICS_NUM_BUCKETS], 0.99), 0);
    }

    #[test]
    fn test_counters() {
        let metrics = Metrics::new();
        metrics.record_light_change();
        metrics.record_light_change();
        metrics.record_vehicle_arrived();
        metrics.record_event_dispatched();
        metrics.record_command_rejected();
        assert_eq!(metrics.light_changes_total(), 2);
        assert_eq!(metrics.vehicles_arrived_total(), 1);
        assert_eq!(metrics.events_dispatched_total(), 1);
        assert_eq!(metrics.commands_rejected_total(), 1);
    }

    #[test]
    fn test_atomic_max() {
        let max = AtomicU64::new(10);
        update_atomic_max(&max, 5);
        assert_eq!(max.load(Ordering::Relaxed), 10);
        update_atomic_max(&max, 25);
        assert_eq!(max.load(Ordering::Relaxed), 25);
    }
}
