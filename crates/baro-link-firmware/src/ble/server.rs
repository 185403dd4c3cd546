use baro_link_core::FRAME_LEN;
use baro_link_core::gatt::{FRAME_CHARACTERISTIC_UUID, SENSOR_SERVICE_UUID};
use trouble_host::prelude::*;

#[gatt_server]
pub struct Server {
    pub sensor: SensorService,
}

/// Telemetry service. The frame characteristic holds the last encoded frame
/// and notifies every new one to a subscribed central.
#[gatt_service(uuid = SENSOR_SERVICE_UUID)]
pub struct SensorService {
    #[characteristic(uuid = FRAME_CHARACTERISTIC_UUID, read, notify)]
    pub frame: [u8; FRAME_LEN],
}
