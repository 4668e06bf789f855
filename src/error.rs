//! Error types for the kickr-rust-ble crate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A failure reported by a BLE transport for one request.
///
/// Mirrors the `{errorCode, errorText}` payload of the host Bluetooth
/// service. Transport failures are never retried by the crate; they abort
/// the connection attempt in progress and are surfaced through the sink log.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("[{code}] {text}")]
pub struct TransportFailure {
    /// Numeric error code.
    #[serde(rename = "errorCode")]
    pub code: i32,
    /// Human readable error text.
    #[serde(rename = "errorText", default)]
    pub text: String,
}

impl TransportFailure {
    /// Code used for failures the host stack reports without a specific code.
    pub const UNKNOWN: i32 = 0;
    /// The host refused Bluetooth access.
    pub const PERMISSION_DENIED: i32 = 1;
    /// The requested peripheral is not known to the adapter.
    pub const DEVICE_NOT_FOUND: i32 = 2;
    /// The peripheral is not connected.
    pub const NOT_CONNECTED: i32 = 3;
    /// The host stack does not support the request.
    pub const NOT_SUPPORTED: i32 = 4;
    /// The request timed out in the host stack.
    pub const TIMED_OUT: i32 = 5;

    /// Create a new transport failure.
    pub fn new(code: i32, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
        }
    }
}

impl From<&btleplug::Error> for TransportFailure {
    fn from(error: &btleplug::Error) -> Self {
        let code = match error {
            btleplug::Error::PermissionDenied => Self::PERMISSION_DENIED,
            btleplug::Error::DeviceNotFound => Self::DEVICE_NOT_FOUND,
            btleplug::Error::NotConnected => Self::NOT_CONNECTED,
            btleplug::Error::NotSupported(_) => Self::NOT_SUPPORTED,
            btleplug::Error::TimedOut(_) => Self::TIMED_OUT,
            _ => Self::UNKNOWN,
        };

        Self::new(code, error.to_string())
    }
}

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Bluetooth is not available or is disabled on this system.
    #[error("Bluetooth not available or disabled")]
    BluetoothUnavailable,

    /// No peripheral with the given address is known to the adapter.
    #[error("Device not found: {address}")]
    DeviceNotFound {
        /// The address that was searched for.
        address: String,
    },

    /// A transport request failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportFailure),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter {
        /// The name of the parameter.
        name: String,
        /// The invalid value that was provided.
        value: String,
    },

    /// An inbound event could not be understood.
    #[error("Invalid event: {context}")]
    InvalidEvent {
        /// Description of what was wrong with the event.
        context: String,
    },

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error means the host has no usable Bluetooth stack,
    /// in which case callers fall back to the simulator.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::BluetoothUnavailable | Self::Bluetooth(btleplug::Error::PermissionDenied)
        )
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
