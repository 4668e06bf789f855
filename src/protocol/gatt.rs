//! GATT event types and parsing.
//!
//! Events arrive from a `client/connect` subscription in the form
//! `{"event": "<kind>", "values": {...}}`. The host service prefixes event
//! names with `on` (`onConnectionStateChange`); both spellings are accepted.
//! `values` is kept as opaque JSON.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Kind of a GATT event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GattEventKind {
    /// The link to the peripheral went up or down.
    ConnectionStateChange,
    /// Service discovery finished.
    ServicesDiscovered,
    /// A subscribed characteristic notified a new value.
    CharacteristicChanged,
    /// Any other event. Kept so newer hosts do not break older clients.
    Unknown(String),
}

impl GattEventKind {
    /// Parse an event name, with or without the `on` prefix.
    pub fn parse(name: &str) -> Self {
        let bare = name
            .strip_prefix("on")
            .filter(|rest| rest.starts_with(|c: char| c.is_ascii_uppercase()))
            .map(|rest| {
                let mut chars = rest.chars();
                chars
                    .next()
                    .map(|first| first.to_ascii_lowercase().to_string() + chars.as_str())
                    .unwrap_or_default()
            })
            .unwrap_or_else(|| name.to_string());

        match bare.as_str() {
            "connectionStateChange" => Self::ConnectionStateChange,
            "servicesDiscovered" => Self::ServicesDiscovered,
            "characteristicChanged" => Self::CharacteristicChanged,
            _ => Self::Unknown(name.to_string()),
        }
    }

    /// The canonical event name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::ConnectionStateChange => "connectionStateChange",
            Self::ServicesDiscovered => "servicesDiscovered",
            Self::CharacteristicChanged => "characteristicChanged",
            Self::Unknown(name) => name,
        }
    }
}

impl std::fmt::Display for GattEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An asynchronous event from a GATT client connection.
#[derive(Debug, Clone, PartialEq)]
pub struct GattEvent {
    /// What happened.
    pub kind: GattEventKind,
    /// Event payload, if the host sent one.
    pub values: Option<Value>,
}

#[derive(Deserialize)]
struct WireGattEvent {
    event: String,
    // Some host firmware misspells the field.
    #[serde(default, alias = "vales")]
    values: Option<Value>,
}

impl GattEvent {
    /// Create an event from its parts.
    pub fn new(kind: GattEventKind, values: Option<Value>) -> Self {
        Self { kind, values }
    }

    /// A `connectionStateChange` event.
    pub fn connection_state_change(connected: bool) -> Self {
        Self::new(
            GattEventKind::ConnectionStateChange,
            Some(serde_json::json!({ "connected": connected })),
        )
    }

    /// A `servicesDiscovered` event.
    pub fn services_discovered(values: Value) -> Self {
        Self::new(GattEventKind::ServicesDiscovered, Some(values))
    }

    /// A `characteristicChanged` event.
    pub fn characteristic_changed(values: Value) -> Self {
        Self::new(GattEventKind::CharacteristicChanged, Some(values))
    }

    /// Parse an event from its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] for malformed JSON and [`Error::InvalidEvent`]
    /// when the `event` field is missing or empty.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse an event from an already decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        let wire: WireGattEvent =
            serde_json::from_value(value).map_err(|e| Error::InvalidEvent {
                context: e.to_string(),
            })?;

        if wire.event.is_empty() {
            return Err(Error::InvalidEvent {
                context: "empty event name".to_string(),
            });
        }

        Ok(Self::new(GattEventKind::parse(&wire.event), wire.values))
    }

    /// The `connected` flag of a `connectionStateChange` event.
    ///
    /// Returns `None` when the event carries no values or no boolean
    /// `connected` field.
    pub fn connected(&self) -> Option<bool> {
        self.values
            .as_ref()
            .and_then(|values| values.get("connected"))
            .and_then(Value::as_bool)
    }

    /// The raw values rendered for diagnostics.
    pub fn values_text(&self) -> String {
        match &self.values {
            Some(values) => values.to_string(),
            None => "null".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_parse_prefixed() {
        assert_eq!(
            GattEventKind::parse("onConnectionStateChange"),
            GattEventKind::ConnectionStateChange
        );
        assert_eq!(
            GattEventKind::parse("onServicesDiscovered"),
            GattEventKind::ServicesDiscovered
        );
        assert_eq!(
            GattEventKind::parse("onCharacteristicChanged"),
            GattEventKind::CharacteristicChanged
        );
    }

    #[test]
    fn test_kind_parse_bare() {
        assert_eq!(
            GattEventKind::parse("connectionStateChange"),
            GattEventKind::ConnectionStateChange
        );
        assert_eq!(
            GattEventKind::parse("onDescriptorRead"),
            GattEventKind::Unknown("onDescriptorRead".to_string())
        );
        assert_eq!(
            GattEventKind::parse("one"),
            GattEventKind::Unknown("one".to_string())
        );
    }

    #[test]
    fn test_from_json() {
        let event =
            GattEvent::from_json(r#"{"event":"onConnectionStateChange","values":{"connected":true,"address":"AA:BB"}}"#)
                .unwrap();
        assert_eq!(event.kind, GattEventKind::ConnectionStateChange);
        assert_eq!(event.connected(), Some(true));
    }

    #[test]
    fn test_from_json_misspelled_values() {
        let event =
            GattEvent::from_json(r#"{"event":"onConnectionStateChange","vales":{"connected":false}}"#)
                .unwrap();
        assert_eq!(event.connected(), Some(false));
    }

    #[test]
    fn test_missing_values() {
        let event = GattEvent::from_json(r#"{"event":"onConnectionStateChange"}"#).unwrap();
        assert_eq!(event.values, None);
        assert_eq!(event.connected(), None);
        assert_eq!(event.values_text(), "null");
    }

    #[test]
    fn test_invalid_events() {
        assert!(matches!(
            GattEvent::from_json(r#"{"values":{}}"#),
            Err(Error::InvalidEvent { .. })
        ));
        assert!(matches!(
            GattEvent::from_json(r#"{"event":""}"#),
            Err(Error::InvalidEvent { .. })
        ));
        assert!(matches!(GattEvent::from_json("not json"), Err(Error::Json(_))));
    }

    #[test]
    fn test_constructors() {
        let event = GattEvent::connection_state_change(true);
        assert_eq!(event.connected(), Some(true));

        let event = GattEvent::characteristic_changed(json!({"value": [1, 2]}));
        assert_eq!(event.values_text(), r#"{"value":[1,2]}"#);
    }
}
