//! Process-wide state shared between the firmware tasks

mod hardware;

pub use hardware::*;

use baro_link_core::clock::CURRENT_TIME_LEN;
use baro_link_core::config::NodeConfig;
use baro_link_core::frame::DeviceId;
use baro_link_core::work::SampleQueue;
use baro_link_core::{ReferenceClock, TelemetryNode};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex as AsyncMutex;
use log::warn;
use trouble_host::prelude::Characteristic;

use crate::ble::FrameOutbox;
use crate::sensors::Bmp388Sensor;

/// Milliseconds since boot, or since the last successful time sync.
/// Advanced by the tick task, read by the sample worker.
pub static CLOCK: ReferenceClock = ReferenceClock::new();

/// Sample timer to sample worker handoff
pub static SAMPLE_QUEUE: SampleQueue = SampleQueue::new();

/// Current Time characteristic discovered on the central
pub type CtsCharacteristic = Characteristic<[u8; CURRENT_TIME_LEN]>;

pub type Barometer = Bmp388Sensor<SharedI2c>;

pub type FirmwareNode = TelemetryNode<'static, Barometer, FrameOutbox, CtsCharacteristic>;

/// The node is shared by the sample worker and the BLE connection task.
pub type NodeMutex = AsyncMutex<CriticalSectionRawMutex, FirmwareNode>;

/// Node configuration baked in at build time from `.env`.
///
/// Unparseable values are logged and replaced by the defaults.
pub fn baked_config() -> NodeConfig {
    let device_id = match option_env!("BARO_DEVICE_ID") {
        Some(raw) => match raw.parse::<u8>().ok().and_then(DeviceId::new) {
            Some(id) => id,
            None => {
                warn!("BARO_DEVICE_ID={} is not a single digit, using default", raw);
                DeviceId::DEFAULT
            }
        },
        None => DeviceId::DEFAULT,
    };

    let config = NodeConfig::for_device(device_id);
    match option_env!("BARO_DEVICE_NAME") {
        Some(name) => match config.clone().with_device_name(name) {
            Ok(named) => named,
            Err(e) => {
                warn!("BARO_DEVICE_NAME rejected: {}", e);
                config
            }
        },
        None => config,
    }
}
