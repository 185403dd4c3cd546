//! Barometric sensor abstraction
//!
//! The concrete driver lives in the firmware crate; the core only sees this
//! trait so the sampler can be exercised on the host.

use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The sensor has not produced a new conversion since the last read.
    #[error("no new data ready")]
    NotReady,
    #[error("{sensor} initialization failed: {details}")]
    InitializationFailed {
        sensor: &'static str,
        details: &'static str,
    },
    #[error("{sensor} failed to {operation}: {details}")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
        details: &'static str,
    },
    #[error("{sensor} I2C error: {details}")]
    I2cError {
        sensor: &'static str,
        details: &'static str,
    },
}

/// One snapshot from the barometer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorReading {
    /// Pressure in pascal
    pub pressure_pa: u32,
    pub temperature_milli_celsius: i32,
}

/// Trait for a pressure sensor polled once per sample period.
///
/// `read` must have bounded latency; it is awaited inside the sample work item.
pub trait Sensor {
    /// One-time configuration after power-up.
    fn init(&mut self) -> impl Future<Output = Result<(), SensorError>>;

    /// Read the latest conversion, or [`SensorError::NotReady`] if there is none.
    fn read(&mut self) -> impl Future<Output = Result<SensorReading, SensorError>>;
}
