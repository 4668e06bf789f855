//! Telemetry sample data structures.

use serde::{Deserialize, Serialize};

use crate::utils::{format_cadence, format_power};

/// One power and cadence reading.
///
/// Samples are produced and consumed immediately; nothing buffers them.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Instantaneous power in watts.
    pub power_watts: f64,
    /// Crank cadence in revolutions per minute.
    pub cadence_rpm: f64,
}

impl TelemetrySample {
    /// Create a new sample.
    pub fn new(power_watts: f64, cadence_rpm: f64) -> Self {
        Self {
            power_watts,
            cadence_rpm,
        }
    }

    /// Power formatted for display, e.g. `"183 W"`.
    pub fn power_text(&self) -> String {
        format_power(self.power_watts)
    }

    /// Cadence formatted for display, e.g. `"91 rpm"`.
    pub fn cadence_text(&self) -> String {
        format_cadence(self.cadence_rpm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_display_text() {
        let sample = TelemetrySample::new(182.51, 90.49);
        assert_eq!(sample.power_text(), "183 W");
        assert_eq!(sample.cadence_text(), "90 rpm");
    }
}
