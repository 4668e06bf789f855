//! Discovered device data structures.

use serde::{Deserialize, Serialize};

/// A BLE device reported by one scan callback.
///
/// Devices are transient: they only live inside the [`ScanResult`] batch
/// that reported them and are never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Device {
    /// Advertised local name. Empty when the device advertises none.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,

    /// Opaque platform address used to connect to the device.
    pub address: String,
}

impl Device {
    /// Create a new device.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// One batch of devices delivered by a scan subscription.
///
/// The host service may omit the `devices` list entirely; that is treated
/// the same as an empty batch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanResult {
    /// Devices in delivery order.
    #[serde(default)]
    pub devices: Option<Vec<Device>>,
}

impl ScanResult {
    /// Create a scan result from a list of devices.
    pub fn new(devices: Vec<Device>) -> Self {
        Self {
            devices: Some(devices),
        }
    }

    /// A scan result without a device list.
    pub fn empty() -> Self {
        Self { devices: None }
    }

    /// Devices in this batch; empty when the list was absent.
    pub fn devices(&self) -> &[Device] {
        self.devices.as_deref().unwrap_or_default()
    }

    /// Check if the batch carries no devices.
    pub fn is_empty(&self) -> bool {
        self.devices().is_empty()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_display() {
        let device = Device::new("KICKR CORE 1A2B", "AA:BB:CC:DD");
        assert_eq!(device.to_string(), "KICKR CORE 1A2B (AA:BB:CC:DD)");
    }

    #[test]
    fn test_scan_result_wire_shape() {
        let result: ScanResult = serde_json::from_str(
            r#"{"returnValue": true, "devices": [{"name": "KICKR CORE", "address": "AA:BB:CC:DD"}, {"name": null, "address": "11:22"}, {"address": "33:44"}]}"#,
        )
        .unwrap();

        assert_eq!(result.devices().len(), 3);
        assert_eq!(result.devices()[0], Device::new("KICKR CORE", "AA:BB:CC:DD"));
        assert_eq!(result.devices()[1].name, "");
        assert_eq!(result.devices()[2].name, "");
    }

    #[test]
    fn test_scan_result_absent_devices() {
        let result: ScanResult = serde_json::from_str(r#"{"returnValue": true}"#).unwrap();
        assert!(result.devices.is_none());
        assert!(result.is_empty());
        assert!(ScanResult::empty().devices().is_empty());
    }
}
