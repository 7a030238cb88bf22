//! BLE GATT protocol constants for Setu Wi-Fi provisioning.
//!
//! Both sides of the link use these: the device daemon (`setu-device`)
//! registers the service and characteristics under these UUIDs, and the
//! companion tools (`setu-ble`, the mobile app) discover them by the same
//! values. They must match exactly - a companion scanning for a different
//! service UUID will never find the device.

/// Provisioning service UUID (custom 128-bit UUID).
pub const SERVICE_UUID: &str = "a0a8e453-562a-49a3-a2e4-29a8e88b0e9b";

/// Wi-Fi SSID characteristic UUID (write).
pub const WIFI_SSID_UUID: &str = "b1b0ac35-a253-4258-a5a5-a2a6a928b03b";

/// Wi-Fi passphrase characteristic UUID (write).
pub const WIFI_PASS_UUID: &str = "c2c1bd48-b363-4369-b2b9-b3b8b5b6b4b3";

/// Local name carried in the advertisement. This is what shows up when the
/// companion app scans for nearby devices.
pub const DEVICE_NAME: &str = "Setu-WiFi-Setup";

#[cfg(test)]
mod tests {
    #[test]
    fn uuids_parse() {
        for s in [super::SERVICE_UUID, super::WIFI_SSID_UUID, super::WIFI_PASS_UUID] {
            uuid::Uuid::parse_str(s).unwrap();
        }
    }

    #[test]
    fn uuids_are_distinct() {
        assert_ne!(super::WIFI_SSID_UUID, super::WIFI_PASS_UUID);
        assert_ne!(super::SERVICE_UUID, super::WIFI_SSID_UUID);
    }
}
