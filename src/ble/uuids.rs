//! BLE Service and Characteristic UUIDs.
//!
//! Well-known services exposed by smart trainers. They are only used to
//! label the `servicesDiscovered` diagnostics; the crate does not decode
//! any characteristic payloads.

use uuid::Uuid;

// Fitness Machine Service (Bluetooth SIG)
/// Fitness Machine Service (FTMS) UUID.
pub const FITNESS_MACHINE_SERVICE_UUID: Uuid =
    Uuid::from_u128(0x0000_1826_0000_1000_8000_00805f9b34fb);
/// Indoor Bike Data characteristic UUID (Notify).
pub const INDOOR_BIKE_DATA_UUID: Uuid = Uuid::from_u128(0x0000_2ad2_0000_1000_8000_00805f9b34fb);

// Cycling Power Service (Bluetooth SIG)
/// Cycling Power Service UUID.
pub const CYCLING_POWER_SERVICE_UUID: Uuid =
    Uuid::from_u128(0x0000_1818_0000_1000_8000_00805f9b34fb);
/// Cycling Power Measurement characteristic UUID (Notify).
pub const CYCLING_POWER_MEASUREMENT_UUID: Uuid =
    Uuid::from_u128(0x0000_2a63_0000_1000_8000_00805f9b34fb);

// Cycling Speed and Cadence Service (Bluetooth SIG)
/// Cycling Speed and Cadence Service UUID.
pub const CYCLING_SPEED_CADENCE_SERVICE_UUID: Uuid =
    Uuid::from_u128(0x0000_1816_0000_1000_8000_00805f9b34fb);

// Wahoo proprietary trainer control
/// Wahoo trainer control service UUID.
pub const WAHOO_TRAINER_SERVICE_UUID: Uuid =
    Uuid::from_u128(0xa026_ee0b_0a7d_4ab3_97fa_f1500f9feb8b);

/// Check if a service UUID carries trainer telemetry.
pub fn is_telemetry_service(uuid: &Uuid) -> bool {
    *uuid == FITNESS_MACHINE_SERVICE_UUID
        || *uuid == CYCLING_POWER_SERVICE_UUID
        || *uuid == CYCLING_SPEED_CADENCE_SERVICE_UUID
}

/// Services with a human readable label, used in diagnostics.
const SERVICE_LABELS: [(Uuid, &str); 4] = [
    (FITNESS_MACHINE_SERVICE_UUID, "Fitness Machine"),
    (CYCLING_POWER_SERVICE_UUID, "Cycling Power"),
    (CYCLING_SPEED_CADENCE_SERVICE_UUID, "Cycling Speed and Cadence"),
    (WAHOO_TRAINER_SERVICE_UUID, "Wahoo Trainer"),
];

/// Short human readable label for a known service, if any.
pub fn service_label(uuid: &Uuid) -> Option<&'static str> {
    SERVICE_LABELS
        .iter()
        .find(|(known, _)| known == uuid)
        .map(|(_, label)| *label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_format() {
        assert!(FITNESS_MACHINE_SERVICE_UUID.to_string().contains("1826"));
        assert!(CYCLING_POWER_MEASUREMENT_UUID.to_string().contains("2a63"));
        assert_eq!(
            WAHOO_TRAINER_SERVICE_UUID.to_string(),
            "a026ee0b-0a7d-4ab3-97fa-f1500f9feb8b"
        );
    }

    #[test]
    fn test_is_telemetry_service() {
        assert!(is_telemetry_service(&FITNESS_MACHINE_SERVICE_UUID));
        assert!(is_telemetry_service(&CYCLING_POWER_SERVICE_UUID));
        assert!(!is_telemetry_service(&WAHOO_TRAINER_SERVICE_UUID));
        assert!(!is_telemetry_service(&INDOOR_BIKE_DATA_UUID));
    }

    #[test]
    fn test_service_label() {
        assert_eq!(
            service_label(&CYCLING_POWER_SERVICE_UUID),
            Some("Cycling Power")
        );
        assert_eq!(service_label(&Uuid::nil()), None);
    }
}
