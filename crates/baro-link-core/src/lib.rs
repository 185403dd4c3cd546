//! Hardware-independent core library for baro-link
//!
//! This crate contains the platform-agnostic part of the BLE barometer: the
//! millisecond reference clock, the Current Time Service sync state machine,
//! the fixed-period sampler, the telemetry frame codec and the single-peer
//! notifier, tied together by [`node::TelemetryNode`].
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32-S3) and desktop hosts (for the simulator and tests).

#![no_std]

extern crate alloc;

pub mod clock;
pub mod config;
pub mod frame;
pub mod gatt;
pub mod link;
pub mod node;
pub mod notifier;
pub mod sampler;
pub mod sensors;
pub mod time_sync;
pub mod work;

#[cfg(test)]
mod testing;

pub use clock::{CurrentTime, ReferenceClock};
pub use config::NodeConfig;
pub use frame::{DeviceId, FRAME_LEN, Frame};
pub use link::{ConnHandle, LinkError, NotifyLink};
pub use node::{SampleOutcome, TelemetryNode};
pub use sensors::{Sensor, SensorError, SensorReading};
pub use time_sync::{SyncAction, SyncEvent};
