//! Target device selection.

use crate::data::Device;

/// Default substring identifying a KICKR trainer by its advertised name.
pub const DEFAULT_TARGET_NAME: &str = "KICKR";

/// Selects the trainer to connect to from a batch of scan results.
///
/// Matching is an ASCII case-insensitive substring test on the advertised
/// name, so it behaves the same regardless of the host locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFilter {
    /// Target substring, already uppercased.
    target: String,
}

impl DeviceFilter {
    /// Create a filter for names containing `target` in any letter case.
    pub fn new(target: impl AsRef<str>) -> Self {
        Self {
            target: target.as_ref().to_ascii_uppercase(),
        }
    }

    /// The uppercased target substring.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Check if a device name matches the target.
    pub fn matches(&self, name: &str) -> bool {
        name.to_ascii_uppercase().contains(&self.target)
    }

    /// Return the first device, in delivery order, whose name matches.
    pub fn select_target<'a>(&self, devices: &'a [Device]) -> Option<&'a Device> {
        devices.iter().find(|device| self.matches(&device.name))
    }
}

impl Default for DeviceFilter {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn device(name: &str, address: &str) -> Device {
        Device::new(name, address)
    }

    #[test]
    fn test_matches_any_case() {
        let filter = DeviceFilter::default();
        assert!(filter.matches("KICKR CORE 1A2B"));
        assert!(filter.matches("Wahoo kickr snap"));
        assert!(filter.matches("myKiCkRbike"));
        assert!(!filter.matches("KICK R"));
        assert!(!filter.matches(""));
    }

    #[test]
    fn test_first_match_wins() {
        let filter = DeviceFilter::default();
        let devices = vec![
            device("Polar H10", "00:01"),
            device("KICKR BIKE", "00:02"),
            device("KICKR CORE", "00:03"),
        ];

        let target = filter.select_target(&devices).unwrap();
        assert_eq!(target.address, "00:02");
    }

    #[test]
    fn test_no_match() {
        let filter = DeviceFilter::default();
        let devices = vec![device("Polar H10", "00:01"), device("", "00:02")];
        assert!(filter.select_target(&devices).is_none());
        assert!(filter.select_target(&[]).is_none());
    }

    #[test]
    fn test_custom_target_is_case_folded() {
        let filter = DeviceFilter::new("snap");
        assert_eq!(filter.target(), "SNAP");
        assert!(filter.matches("KICKR SNAP"));
        assert!(!filter.matches("KICKR CORE"));
    }

    #[test]
    fn test_non_ascii_names_are_not_folded() {
        // Only ASCII letters are case-folded; the German sharp s stays as is.
        let filter = DeviceFilter::new("straße");
        assert!(filter.matches("STRAßE"));
        assert!(!filter.matches("STRASSE"));
    }

    proptest! {
        #[test]
        fn prop_name_containing_target_matches(
            prefix in "[a-zA-Z0-9 ]{0,8}",
            suffix in "[a-zA-Z0-9 ]{0,8}",
            mask in proptest::collection::vec(any::<bool>(), 5),
        ) {
            let target: String = "kickr"
                .chars()
                .zip(mask)
                .map(|(c, upper)| if upper { c.to_ascii_uppercase() } else { c })
                .collect();
            let devices = vec![device(&format!("{prefix}{target}{suffix}"), "AA")];

            let selected = DeviceFilter::default().select_target(&devices);
            prop_assert_eq!(selected.map(|d| d.address.as_str()), Some("AA"));
        }

        #[test]
        fn prop_names_without_target_never_match(
            names in proptest::collection::vec("[a-jl-zA-JL-Z0-9 ]{0,12}", 0..6),
        ) {
            // The alphabet excludes 'k', so no name can contain "KICKR".
            let devices: Vec<Device> = names
                .iter()
                .enumerate()
                .map(|(i, name)| device(name, &i.to_string()))
                .collect();

            prop_assert!(DeviceFilter::default().select_target(&devices).is_none());
        }

        #[test]
        fn prop_first_match_in_delivery_order(
            before in proptest::collection::vec("[a-jl-z ]{0,6}", 0..4),
            after in proptest::collection::vec("(KICKR|kickr|[a-z]{0,6})", 0..4),
        ) {
            let mut devices: Vec<Device> = before
                .iter()
                .map(|name| device(name, "before"))
                .collect();
            devices.push(device("Kickr Core", "first"));
            devices.extend(after.iter().map(|name| device(name, "after")));

            let selected = DeviceFilter::default().select_target(&devices);
            prop_assert_eq!(selected.map(|d| d.address.as_str()), Some("first"));
        }
    }
}
