//! GATT identifiers shared by the firmware and host tooling

/// Primary service carrying the telemetry frame characteristic
pub const SENSOR_SERVICE_UUID: &str = "7b2d0001-3c5e-4f5a-9b61-8f2a0c1d7e40";

/// Frame characteristic (read, notify). Value is the last encoded frame.
pub const FRAME_CHARACTERISTIC_UUID: &str = "7b2d0002-3c5e-4f5a-9b61-8f2a0c1d7e40";

/// Current Time Service, discovered on the central
pub const CURRENT_TIME_SERVICE_UUID16: u16 = 0x1805;

/// Current Time characteristic within the Current Time Service
pub const CURRENT_TIME_CHARACTERISTIC_UUID16: u16 = 0x2a2b;

/// Client Characteristic Configuration value enabling notifications
pub const CCCD_NOTIFY: u16 = 0x0001;

/// Whether a CCCD write enables notifications.
pub fn cccd_enables_notify(value: &[u8]) -> bool {
    match value {
        [lo, hi, ..] => u16::from_le_bytes([*lo, *hi]) & CCCD_NOTIFY != 0,
        [lo] => u16::from(*lo) & CCCD_NOTIFY != 0,
        [] => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cccd_decoding() {
        assert!(cccd_enables_notify(&[0x01, 0x00]));
        assert!(cccd_enables_notify(&[0x03, 0x00]));
        assert!(!cccd_enables_notify(&[0x02, 0x00]));
        assert!(!cccd_enables_notify(&[0x00, 0x00]));
        assert!(!cccd_enables_notify(&[]));
    }
}
