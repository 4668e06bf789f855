//! Data structures for trainer discovery and telemetry.
//!
//! This module contains the transient types that flow through the
//! connection lifecycle: discovered devices, the connection session and
//! telemetry samples.

pub mod device;
pub mod session;
pub mod telemetry;

pub use device::{Device, ScanResult};
pub use session::ConnectionSession;
pub use telemetry::TelemetrySample;
