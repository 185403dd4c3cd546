//! ESP32-S3 firmware-specific modules for baro-link
//!
//! This crate contains the code that cannot compile on desktop targets: board
//! bring-up, the BMP388 driver adapter, the trouble-host BLE peripheral and
//! the Embassy tasks that drive [`baro_link_core::TelemetryNode`].

#![no_std]

pub mod app_state;
pub mod async_i2c_bus;
pub mod ble;
pub mod sensors;
pub mod tasks;
