//! GATT event classification.
//!
//! Turns events from a `client/connect` subscription into either a link
//! transition for the state machine or a message for the sink.

use tracing::trace;

use crate::data::TelemetrySample;
use crate::protocol::{GattEvent, GattEventKind};

/// Converts raw characteristic values into a telemetry sample.
///
/// No decoder ships with the crate; hosts that know their trainer's
/// characteristic layout can install one on the dispatcher.
pub trait TelemetryDecoder: Send + Sync {
    /// Decode `values` from a `characteristicChanged` event.
    fn decode(&self, values: &serde_json::Value) -> Option<TelemetrySample>;
}

/// Outcome of dispatching one GATT event.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// The link went up (`true`) or down (`false`).
    Link(bool),
    /// A connection state change without a usable `connected` flag.
    MissingState,
    /// Informational message for the sink log.
    Info(String),
    /// A decoded telemetry sample.
    Telemetry(TelemetrySample),
    /// Nothing to do.
    Ignore,
}

/// Classifies GATT events.
#[derive(Default)]
pub struct GattDispatcher {
    decoder: Option<Box<dyn TelemetryDecoder>>,
}

impl GattDispatcher {
    /// Create a dispatcher without a telemetry decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a decoder for `characteristicChanged` values.
    pub fn with_decoder(mut self, decoder: impl TelemetryDecoder + 'static) -> Self {
        self.decoder = Some(Box::new(decoder));
        self
    }

    /// Check if a decoder is installed.
    pub fn has_decoder(&self) -> bool {
        self.decoder.is_some()
    }

    /// Classify an event.
    pub fn dispatch(&self, event: &GattEvent) -> Dispatch {
        match &event.kind {
            GattEventKind::ConnectionStateChange => match event.connected() {
                Some(connected) => Dispatch::Link(connected),
                None => Dispatch::MissingState,
            },
            GattEventKind::ServicesDiscovered => {
                Dispatch::Info(format!("Services discovered: {}", event.values_text()))
            }
            GattEventKind::CharacteristicChanged => {
                let decoded = self
                    .decoder
                    .as_ref()
                    .zip(event.values.as_ref())
                    .and_then(|(decoder, values)| decoder.decode(values));

                match decoded {
                    Some(sample) => Dispatch::Telemetry(sample),
                    None => {
                        Dispatch::Info(format!("Characteristic changed: {}", event.values_text()))
                    }
                }
            }
            GattEventKind::Unknown(name) => {
                trace!("Ignoring unknown GATT event {}", name);
                Dispatch::Ignore
            }
        }
    }
}

impl std::fmt::Debug for GattDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GattDispatcher")
            .field("has_decoder", &self.has_decoder())
            .finish()
    }
}
