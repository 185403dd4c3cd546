//! Board bring-up for the M5Stack CoreS3
//!
//! The external I2C port is powered from the AXP2101 rails, so the power
//! chip has to be configured before the barometer answers.

use axp2101_embedded::AsyncAxp2101;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex as AsyncMutex;
use esp_hal::i2c::master::{Config as I2cConfig, ConfigError, I2c};
use esp_hal::time::Rate;
use esp_hal::Async;
use log::{info, warn};
use static_cell::StaticCell;

use crate::async_i2c_bus::AsyncI2cDevice;

pub type SharedI2c = AsyncI2cDevice<'static, I2c<'static, Async>>;

/// Create the I2C0 peripheral at 400 kHz.
pub fn create_i2c_bus(
    i2c0: esp_hal::peripherals::I2C0<'static>,
    sda: esp_hal::peripherals::GPIO12<'static>,
    scl: esp_hal::peripherals::GPIO11<'static>,
) -> Result<I2c<'static, Async>, ConfigError> {
    Ok(
        I2c::new(i2c0, I2cConfig::default().with_frequency(Rate::from_khz(400)))?
            .with_sda(sda)
            .with_scl(scl)
            .into_async(),
    )
}

/// Share the bus, power the peripheral rails and hand back the barometer's
/// device handle.
///
/// Power failures are logged rather than returned: the barometer may still be
/// powered from a previous boot, and a dead sensor shows up as read errors.
pub async fn init_i2c_hardware(i2c0: I2c<'static, Async>) -> SharedI2c {
    static I2C0_BUS: StaticCell<AsyncMutex<CriticalSectionRawMutex, I2c<'static, Async>>> =
        StaticCell::new();
    let i2c0_bus = I2C0_BUS.init(AsyncMutex::new(i2c0));

    let mut power_mgmt = AsyncAxp2101::new(AsyncI2cDevice::new(i2c0_bus));

    info!("Configuring power management");
    if let Err(e) = power_mgmt.init().await {
        warn!("Power init failed: {:?}", e);
    }

    // ALDO1..3 feed the Port A connector and the internal I2C pull-ups
    if let Err(e) = power_mgmt.enable_aldo1().await {
        warn!("Failed to enable ALDO1: {:?}", e);
    }
    if let Err(e) = power_mgmt.enable_aldo2().await {
        warn!("Failed to enable ALDO2: {:?}", e);
    }
    if let Err(e) = power_mgmt.enable_aldo3().await {
        warn!("Failed to enable ALDO3: {:?}", e);
    }
    info!("Peripheral rails up");

    AsyncI2cDevice::new(i2c0_bus)
}
