//! BLE communication module.
//!
//! This module provides the trainer connection lifecycle and the transport
//! seam it runs against: a `btleplug` implementation for real hardware and
//! the pieces (filter, dispatcher, reducer) the lifecycle is built from.

pub mod connection;
pub mod dispatcher;
pub mod filter;
pub mod lifecycle;
pub mod platform;
pub mod transport;
pub mod uuids;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::{ConnectionEvent, ConnectionStateMachine};
pub use dispatcher::{Dispatch, GattDispatcher, TelemetryDecoder};
pub use filter::{DeviceFilter, DEFAULT_TARGET_NAME};
pub use lifecycle::{ConnectPhase, LifecycleState};
pub use platform::BtleplugTransport;
pub use transport::{
    BleTransport, OperationHandle, OperationId, Responder, TransportEvent, TransportPayload,
};
pub use uuids::*;
