//! Infrastructure - configuration, metrics, and broadcast signals
//!
//! This module contains infrastructure concerns:
//! - `config` - Application configuration (TOML loading, defaults)
//! - `metrics` - Lock-free metrics collection
//! - `signal` - Pause and shutdown broadcast helpers

pub mod config;
pub mod metrics;
pub mod signal;

// Re-export commonly used types
pub use config::Config;
pub use metrics::Metrics;
pub use signal::PauseSwitch;
