//! Service request shapes.
//!
//! Every transport operation corresponds to one request against the host
//! Bluetooth GATT service:
//! - `isEnabled`: subscribe to the adapter power state
//! - `startScan`: subscribe to scan result batches
//! - `stopScan`: stop an active scan (one-shot)
//! - `client/connect`: open a GATT client connection and subscribe to its events

use serde::{Deserialize, Serialize};

/// Methods of the host GATT service used by the connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceMethod {
    /// Adapter enablement check.
    #[serde(rename = "isEnabled")]
    IsEnabled,
    /// Start scanning for devices.
    #[serde(rename = "startScan")]
    StartScan,
    /// Stop scanning.
    #[serde(rename = "stopScan")]
    StopScan,
    /// Connect to a device as a GATT client.
    #[serde(rename = "client/connect")]
    ClientConnect,
}

impl ServiceMethod {
    /// The wire name of this method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IsEnabled => "isEnabled",
            Self::StartScan => "startScan",
            Self::StopScan => "stopScan",
            Self::ClientConnect => "client/connect",
        }
    }

    /// Check if requests for this method stay open as event subscriptions.
    pub fn is_subscription(&self) -> bool {
        !matches!(self, Self::StopScan)
    }
}

impl std::fmt::Display for ServiceMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of a service request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestParameters {
    /// Keep the request open and deliver repeated events.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub subscribe: bool,

    /// Device address, for `client/connect`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// A request against the host GATT service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRequest {
    /// The method to invoke.
    pub method: ServiceMethod,
    /// Method parameters.
    pub parameters: RequestParameters,
}

impl ServiceRequest {
    /// Subscribe to the adapter enablement state.
    pub fn is_enabled() -> Self {
        Self::subscription(ServiceMethod::IsEnabled, None)
    }

    /// Subscribe to scan results.
    pub fn start_scan() -> Self {
        Self::subscription(ServiceMethod::StartScan, None)
    }

    /// Stop the active scan.
    pub fn stop_scan() -> Self {
        Self {
            method: ServiceMethod::StopScan,
            parameters: RequestParameters::default(),
        }
    }

    /// Connect to `address` and subscribe to its GATT events.
    pub fn connect(address: impl Into<String>) -> Self {
        Self::subscription(ServiceMethod::ClientConnect, Some(address.into()))
    }

    fn subscription(method: ServiceMethod, address: Option<String>) -> Self {
        Self {
            method,
            parameters: RequestParameters {
                subscribe: true,
                address,
            },
        }
    }

    /// Serialize the request to its JSON wire form.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_method_names() {
        assert_eq!(ServiceMethod::IsEnabled.to_string(), "isEnabled");
        assert_eq!(ServiceMethod::ClientConnect.as_str(), "client/connect");
        assert!(!ServiceMethod::StopScan.is_subscription());
        assert!(ServiceMethod::StartScan.is_subscription());
    }

    #[test]
    fn test_connect_request_json() {
        let json = ServiceRequest::connect("AA:BB:CC:DD").to_json().unwrap();
        assert_eq!(
            json,
            r#"{"method":"client/connect","parameters":{"subscribe":true,"address":"AA:BB:CC:DD"}}"#
        );
    }

    #[test]
    fn test_stop_scan_request_json() {
        let json = ServiceRequest::stop_scan().to_json().unwrap();
        assert_eq!(json, r#"{"method":"stopScan","parameters":{}}"#);
    }

    #[test]
    fn test_request_parse() {
        let request: ServiceRequest =
            serde_json::from_str(r#"{"method":"isEnabled","parameters":{"subscribe":true}}"#)
                .unwrap();
        assert_eq!(request, ServiceRequest::is_enabled());
    }
}
