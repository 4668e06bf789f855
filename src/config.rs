//! Controller configuration.
//!
//! Both structs deserialize from JSON with every field optional, so a host
//! can override only what it needs:
//!
//! ```
//! use kickr_rust_ble::ControllerConfig;
//!
//! let config = ControllerConfig::from_json(r#"{"target_name": "snap"}"#).unwrap();
//! assert_eq!(config.target_name, "snap");
//! assert_eq!(config.simulator.period_ms, 500);
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ble::filter::{DeviceFilter, DEFAULT_TARGET_NAME};
use crate::error::{Error, Result};

/// Default simulator sample period in milliseconds.
pub const DEFAULT_SAMPLE_PERIOD_MS: u64 = 500;
/// Default lower bound of simulated power, in watts (inclusive).
pub const DEFAULT_POWER_MIN_WATTS: f64 = 140.0;
/// Default upper bound of simulated power, in watts (exclusive).
pub const DEFAULT_POWER_MAX_WATTS: f64 = 240.0;
/// Default lower bound of simulated cadence, in rpm (inclusive).
pub const DEFAULT_CADENCE_MIN_RPM: f64 = 78.0;
/// Default upper bound of simulated cadence, in rpm (exclusive).
pub const DEFAULT_CADENCE_MAX_RPM: f64 = 178.0;

/// Settings for the telemetry simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Milliseconds between samples.
    pub period_ms: u64,
    /// Lower bound of power, inclusive.
    pub power_min_watts: f64,
    /// Upper bound of power, exclusive.
    pub power_max_watts: f64,
    /// Lower bound of cadence, inclusive.
    pub cadence_min_rpm: f64,
    /// Upper bound of cadence, exclusive.
    pub cadence_max_rpm: f64,
    /// Seed for a reproducible sample sequence. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            period_ms: DEFAULT_SAMPLE_PERIOD_MS,
            power_min_watts: DEFAULT_POWER_MIN_WATTS,
            power_max_watts: DEFAULT_POWER_MAX_WATTS,
            cadence_min_rpm: DEFAULT_CADENCE_MIN_RPM,
            cadence_max_rpm: DEFAULT_CADENCE_MAX_RPM,
            seed: None,
        }
    }
}

impl SimulatorConfig {
    /// The sample period as a duration.
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    /// Use a fixed seed for the sample sequence.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Change the sample period.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period_ms = period.as_millis() as u64;
        self
    }

    /// Check the settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for a zero period or an empty or
    /// non-finite range.
    pub fn validate(&self) -> Result<()> {
        if self.period_ms == 0 {
            return Err(invalid("period_ms", self.period_ms));
        }

        check_range(
            "power_watts",
            self.power_min_watts,
            self.power_max_watts,
        )?;
        check_range(
            "cadence_rpm",
            self.cadence_min_rpm,
            self.cadence_max_rpm,
        )
    }
}

/// Settings for a [`TrainerController`](crate::TrainerController).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Substring identifying the trainer by advertised name, any letter case.
    pub target_name: String,
    /// Simulator settings, used when no Bluetooth adapter is available.
    pub simulator: SimulatorConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            target_name: DEFAULT_TARGET_NAME.to_string(),
            simulator: SimulatorConfig::default(),
        }
    }
}

impl ControllerConfig {
    /// Parse a configuration from JSON and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] for malformed input and
    /// [`Error::InvalidParameter`] when validation fails.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Change the target name substring.
    pub fn with_target_name(mut self, target_name: impl Into<String>) -> Self {
        self.target_name = target_name.into();
        self
    }

    /// Replace the simulator settings.
    pub fn with_simulator(mut self, simulator: SimulatorConfig) -> Self {
        self.simulator = simulator;
        self
    }

    /// The device filter for this configuration.
    pub fn device_filter(&self) -> DeviceFilter {
        DeviceFilter::new(&self.target_name)
    }

    /// Check the settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for a blank target name or
    /// invalid simulator settings.
    pub fn validate(&self) -> Result<()> {
        if self.target_name.trim().is_empty() {
            return Err(invalid("target_name", &self.target_name));
        }

        self.simulator.validate()
    }
}

fn invalid(name: &str, value: impl std::fmt::Display) -> Error {
    Error::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
    }
}

fn check_range(name: &str, min: f64, max: f64) -> Result<()> {
    if !min.is_finite() || !max.is_finite() || min >= max {
        return Err(invalid(name, format!("{min}..{max}")));
    }
    Ok(())
}
