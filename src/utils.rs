//! Display helpers for the kickr-rust-ble crate.

/// Text shown for power and cadence when no telemetry is flowing.
pub const STATS_PLACEHOLDER: &str = "--";

/// Format a power reading for display, rounded to the nearest watt
/// (halves round up).
///
/// # Example
///
/// ```
/// use kickr_rust_ble::format_power;
///
/// assert_eq!(format_power(182.6), "183 W");
/// ```
#[inline]
pub fn format_power(watts: f64) -> String {
    format!("{:.0} W", watts.round())
}

/// Format a cadence reading for display, rounded to the nearest rpm.
///
/// # Example
///
/// ```
/// use kickr_rust_ble::format_cadence;
///
/// assert_eq!(format_cadence(91.2), "91 rpm");
/// ```
#[inline]
pub fn format_cadence(rpm: f64) -> String {
    format!("{:.0} rpm", rpm.round())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_power() {
        assert_eq!(format_power(140.0), "140 W");
        assert_eq!(format_power(239.4), "239 W");
        assert_eq!(format_power(0.0), "0 W");
    }

    #[test]
    fn test_format_cadence() {
        assert_eq!(format_cadence(78.0), "78 rpm");
        assert_eq!(format_cadence(177.7), "178 rpm");
    }

    #[test]
    fn test_halves_round_up() {
        assert_eq!(format_power(140.5), "141 W");
        assert_eq!(format_power(182.5), "183 W");
        assert_eq!(format_cadence(177.5), "178 rpm");
        assert_eq!(format_cadence(88.5), "89 rpm");
    }

    #[test]
    fn test_placeholder() {
        assert_eq!(STATS_PLACEHOLDER, "--");
    }
}
