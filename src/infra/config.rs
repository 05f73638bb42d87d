//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument (parsed by the binary)
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml
//!
//! Every section is optional; missing keys fall back to the reference
//! simulation (5000-unit track, lights at 1250/2500/3750, three vehicles).
//! Periods of zero are raised to 1 ms so no timer loop is handed a zero period.

use crate::domain::types::{BrakingWindow, HoldDurations};
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct TrackConfig {
    #[serde(default = "default_track_length")]
    pub length: u32,
    /// Intersection positions with a light at simulation start
    #[serde(default = "default_light_positions")]
    pub lights: Vec<u32>,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self { length: default_track_length(), lights: default_light_positions() }
    }
}

fn default_track_length() -> u32 {
    5000
}

fn default_light_positions() -> Vec<u32> {
    vec![1250, 2500, 3750]
}

#[derive(Debug, Clone, Deserialize)]
pub struct LightsConfig {
    #[serde(default = "default_red_ms")]
    pub red_ms: u64,
    #[serde(default = "default_green_ms")]
    pub green_ms: u64,
    #[serde(default = "default_yellow_ms")]
    pub yellow_ms: u64,
}

impl Default for LightsConfig {
    fn default() -> Self {
        Self { red_ms: default_red_ms(), green_ms: default_green_ms(), yellow_ms: default_yellow_ms() }
    }
}

fn default_red_ms() -> u64 {
    2000
}

fn default_green_ms() -> u64 {
    2000
}

fn default_yellow_ms() -> u64 {
    4000
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehiclesConfig {
    /// Base speed (distance units per tick) of each vehicle launched at start
    #[serde(default = "default_base_speeds")]
    pub base_speeds: Vec<u32>,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Distance before a light at which it starts governing a vehicle
    #[serde(default = "default_braking_ahead")]
    pub braking_ahead: u32,
    /// Distance past a light for which it still governs a vehicle
    #[serde(default = "default_braking_behind")]
    pub braking_behind: u32,
}

impl Default for VehiclesConfig {
    fn default() -> Self {
        Self {
            base_speeds: default_base_speeds(),
            tick_ms: default_tick_ms(),
            braking_ahead: default_braking_ahead(),
            braking_behind: default_braking_behind(),
        }
    }
}

fn default_base_speeds() -> Vec<u32> {
    vec![15, 5, 9]
}

fn default_tick_ms() -> u64 {
    50
}

fn default_braking_ahead() -> u32 {
    100
}

fn default_braking_behind() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdmissionConfig {
    #[serde(default = "default_max_extra")]
    pub max_extra_vehicles: usize,
    #[serde(default = "default_max_extra")]
    pub max_extra_lights: usize,
    /// Base speed used by `add-vehicle` when none is given
    #[serde(default = "default_extra_vehicle_speed")]
    pub extra_vehicle_speed: u32,
    /// Position used by `add-light` when none is given
    #[serde(default = "default_extra_light_position")]
    pub extra_light_position: u32,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_extra_vehicles: default_max_extra(),
            max_extra_lights: default_max_extra(),
            extra_vehicle_speed: default_extra_vehicle_speed(),
            extra_light_position: default_extra_light_position(),
        }
    }
}

fn default_max_extra() -> usize {
    1
}

fn default_extra_vehicle_speed() -> u32 {
    6
}

fn default_extra_light_position() -> u32 {
    4000
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownConfig {
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_ms: default_grace_ms() }
    }
}

fn default_grace_ms() -> u64 {
    3000
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClockConfig {
    #[serde(default = "default_clock_interval_ms")]
    pub interval_ms: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self { interval_ms: default_clock_interval_ms() }
    }
}

fn default_clock_interval_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    /// Bounded capacity of the entity -> dispatcher channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Optional JSONL event log path
    #[serde(default)]
    pub jsonl_file: Option<String>,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { channel_capacity: default_channel_capacity(), jsonl_file: None }
    }
}

fn default_channel_capacity() -> usize {
    1024
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

fn default_metrics_interval() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub track: TrackConfig,
    #[serde(default)]
    pub lights: LightsConfig,
    #[serde(default)]
    pub vehicles: VehiclesConfig,
    #[serde(default)]
    pub admission: AdmissionConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    track_length: u32,
    initial_lights: Vec<u32>,
    holds: HoldDurations,
    initial_speeds: Vec<u32>,
    tick_period: Duration,
    braking_window: BrakingWindow,
    max_extra_vehicles: usize,
    max_extra_lights: usize,
    extra_vehicle_speed: u32,
    extra_light_position: u32,
    shutdown_grace: Duration,
    clock_interval: Duration,
    event_channel_capacity: usize,
    events_file: Option<String>,
    metrics_interval_secs: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default")
    }
}

/// Shortest period any timer loop is given
const MIN_PERIOD: Duration = Duration::from_millis(1);

fn period_ms(ms: u64) -> Duration {
    Duration::from_millis(ms).max(MIN_PERIOD)
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: &str) -> Self {
        Self {
            track_length: toml_config.track.length,
            initial_lights: toml_config.track.lights,
            holds: HoldDurations {
                red: period_ms(toml_config.lights.red_ms),
                green: period_ms(toml_config.lights.green_ms),
                yellow: period_ms(toml_config.lights.yellow_ms),
            },
            initial_speeds: toml_config.vehicles.base_speeds,
            tick_period: period_ms(toml_config.vehicles.tick_ms),
            braking_window: BrakingWindow {
                ahead: toml_config.vehicles.braking_ahead,
                behind: toml_config.vehicles.braking_behind,
            },
            max_extra_vehicles: toml_config.admission.max_extra_vehicles,
            max_extra_lights: toml_config.admission.max_extra_lights,
            extra_vehicle_speed: toml_config.admission.extra_vehicle_speed,
            extra_light_position: toml_config.admission.extra_light_position,
            shutdown_grace: Duration::from_millis(toml_config.shutdown.grace_ms),
            clock_interval: period_ms(toml_config.clock.interval_ms),
            event_channel_capacity: toml_config.events.channel_capacity.max(1),
            events_file: toml_config.events.jsonl_file,
            metrics_interval_secs: toml_config.metrics.interval_secs.max(1),
            config_file: config_file.to_string(),
        }
    }

    /// Config path used when none is given on the command line
    pub fn default_config_path() -> String {
        env::var("CONFIG_FILE").unwrap_or_else(|_| "config/dev.toml".to_string())
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, &path.display().to_string()))
    }

    /// Load configuration from an explicit path, falling back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    pub fn track_length(&self) -> u32 {
        self.track_length
    }

    pub fn initial_lights(&self) -> &[u32] {
        &self.initial_lights
    }

    pub fn holds(&self) -> HoldDurations {
        self.holds
    }

    pub fn initial_speeds(&self) -> &[u32] {
        &self.initial_speeds
    }

    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }

    pub fn braking_window(&self) -> BrakingWindow {
        self.braking_window
    }

    pub fn max_extra_vehicles(&self) -> usize {
        self.max_extra_vehicles
    }

    pub fn max_extra_lights(&self) -> usize {
        self.max_extra_lights
    }

    pub fn extra_vehicle_speed(&self) -> u32 {
        self.extra_vehicle_speed
    }

    pub fn extra_light_position(&self) -> u32 {
        self.extra_light_position
    }

    pub fn shutdown_grace(&self) -> Duration {
        self.shutdown_grace
    }

    pub fn clock_interval(&self) -> Duration {
        self.clock_interval
    }

    pub fn event_channel_capacity(&self) -> usize {
        self.event_channel_capacity
    }

    pub fn events_file(&self) -> Option<&str> {
        self.events_file.as_deref()
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    // Builders, used by the CLI overrides and by tests that need a small track

    pub fn with_track_length(mut self, length: u32) -> Self {
        self.track_length = length;
        self
    }

    pub fn with_initial_lights(mut self, lights: Vec<u32>) -> Self {
        self.initial_lights = lights;
        self
    }

    pub fn with_initial_speeds(mut self, speeds: Vec<u32>) -> Self {
        self.initial_speeds = speeds;
        self
    }

    pub fn with_holds(mut self, holds: HoldDurations) -> Self {
        self.holds = HoldDurations {
            red: holds.red.max(MIN_PERIOD),
            green: holds.green.max(MIN_PERIOD),
            yellow: holds.yellow.max(MIN_PERIOD),
        };
        self
    }

    pub fn with_tick_period(mut self, tick: Duration) -> Self {
        self.tick_period = tick.max(MIN_PERIOD);
        self
    }

    pub fn with_max_extra(mut self, vehicles: usize, lights: usize) -> Self {
        self.max_extra_vehicles = vehicles;
        self.max_extra_lights = lights;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn with_events_file(mut self, path: Option<String>) -> Self {
        self.events_file = path;
        self
    }
}
