//! # kickr-rust-ble
//!
//! A Rust library for discovering, connecting to and streaming live
//! telemetry from a Wahoo KICKR smart trainer over Bluetooth Low Energy.
//!
//! The heart of the crate is the connection lifecycle: check that Bluetooth
//! is enabled, scan, pick the first device whose name contains the target
//! substring, stop the scan, connect and dispatch GATT events until the
//! session ends. Only one request of each kind is ever outstanding.
//!
//! ## Features
//!
//! - **Trainer Discovery**: Case-insensitive name matching (default `KICKR`)
//! - **Lifecycle**: Enable check, scan, connect and teardown with stale
//!   event protection
//! - **GATT Events**: Link state, service discovery and characteristic
//!   notifications routed to a [`TelemetrySink`]
//! - **Simulator**: Synthetic power and cadence on hosts without Bluetooth
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kickr_rust_ble::{ControllerConfig, RecordingSink, Result, TrainerController};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let sink = RecordingSink::new();
//!     let controller =
//!         TrainerController::detect(ControllerConfig::default(), Arc::new(sink.clone())).await?;
//!
//!     controller.connect();
//!     tokio::time::sleep(std::time::Duration::from_secs(10)).await;
//!
//!     let (power, cadence) = sink.stats();
//!     println!("{} | {} ({})", power, cadence, sink.status());
//!
//!     controller.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Platform Notes
//!
//! ### macOS
//! Requires Bluetooth permission. Add `NSBluetoothAlwaysUsageDescription`
//! to your Info.plist for bundled apps. Trainers are addressed by their
//! platform identifier because macOS hides MAC addresses.
//!
//! ### Linux
//! Requires BlueZ. User may need to be in the `bluetooth` group.
//!
//! ### Windows
//! Requires Windows 10 or later with Bluetooth LE support.

// Public modules
pub mod ble;
pub mod config;
pub mod controller;
pub mod data;
pub mod error;
pub mod protocol;
pub mod simulator;
pub mod sink;
pub mod utils;

// Re-exports for convenience
pub use config::{ControllerConfig, SimulatorConfig};
pub use controller::{Capability, TrainerController};
pub use error::{Error, Result, TransportFailure};
pub use simulator::TelemetrySimulator;
pub use sink::{PendingUpdates, RecordingSink, TelemetrySink, TracingSink};
pub use utils::{format_cadence, format_power};

// Re-export commonly used types from submodules
pub use ble::{
    BleTransport, BtleplugTransport, ConnectPhase, ConnectionStateMachine, DeviceFilter,
    LifecycleState,
};
pub use data::{ConnectionSession, Device, ScanResult, TelemetrySample};
pub use protocol::{GattEvent, GattEventKind, ServiceMethod, ServiceRequest};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        // Verify that key types are exported
        let _ = std::any::TypeId::of::<TrainerController>();
        let _ = std::any::TypeId::of::<ConnectionStateMachine>();
        let _ = std::any::TypeId::of::<TelemetrySimulator>();
        let _ = std::any::TypeId::of::<Error>();
        let _ = std::any::TypeId::of::<GattEvent>();
        let _ = std::any::TypeId::of::<DeviceFilter>();
        let _ = std::any::TypeId::of::<RecordingSink>();
    }

    #[test]
    fn test_display_formatting() {
        assert_eq!(format_power(182.6), "183 W");
        assert_eq!(format_cadence(91.2), "91 rpm");
    }
}
