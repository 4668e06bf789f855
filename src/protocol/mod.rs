//! Protocol module for the host GATT service wire shapes.
//!
//! This module contains the implementations for:
//! - Service requests (`isEnabled`, `startScan`, `stopScan`, `client/connect`)
//! - GATT event parsing

pub mod gatt;
pub mod request;

pub use gatt::{GattEvent, GattEventKind};
pub use request::{RequestParameters, ServiceMethod, ServiceRequest};
