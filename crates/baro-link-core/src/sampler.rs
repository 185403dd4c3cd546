//! Fixed-period sampler
//!
//! One call to [`Sampler::sample`] per sample tick: read the barometer, stamp
//! the reading with the reference clock and encode it into the frame buffer.

use log::{debug, error, info, warn};

use crate::frame::{DeviceId, Frame, encode};
use crate::sensors::{Sensor, SensorError};

/// Running counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplerStats {
    /// Periods that produced a new frame
    pub taken: u32,
    /// Periods skipped because the sensor had no new conversion
    pub not_ready: u32,
    /// Periods skipped because the read failed
    pub failed: u32,
}

/// Polls the sensor and keeps the most recent encoded frame.
pub struct Sampler<S> {
    sensor: S,
    device_id: DeviceId,
    frame: Option<Frame>,
    stats: SamplerStats,
}

impl<S: Sensor> Sampler<S> {
    pub const fn new(sensor: S, device_id: DeviceId) -> Self {
        Self {
            sensor,
            device_id,
            frame: None,
            stats: SamplerStats {
                taken: 0,
                not_ready: 0,
                failed: 0,
            },
        }
    }

    /// Configure the sensor. A failure is logged and sampling proceeds anyway;
    /// reads will keep failing until the sensor comes up.
    pub async fn init(&mut self) -> Result<(), SensorError> {
        match self.sensor.init().await {
            Ok(()) => {
                info!("Sensor ready");
                Ok(())
            }
            Err(e) => {
                error!("Sensor initialization failed: {}", e);
                Err(e)
            }
        }
    }

    /// Take one sample at `now_ms`.
    ///
    /// Returns the new frame, or `None` if this period produced nothing. In
    /// that case the previous frame is left untouched.
    pub async fn sample(&mut self, now_ms: u64) -> Option<&Frame> {
        match self.sensor.read().await {
            Ok(reading) => {
                let frame = encode(self.device_id, now_ms, reading.pressure_pa);
                debug!("Sampled {:?} at {} ms", reading, now_ms);
                self.stats.taken = self.stats.taken.wrapping_add(1);
                self.frame = Some(frame);
                self.frame.as_ref()
            }
            Err(SensorError::NotReady) => {
                self.stats.not_ready = self.stats.not_ready.wrapping_add(1);
                None
            }
            Err(e) => {
                warn!("Sensor read failed, skipping period: {}", e);
                self.stats.failed = self.stats.failed.wrapping_add(1);
                None
            }
        }
    }

    /// The most recently encoded frame.
    pub fn last_frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    pub fn stats(&self) -> SamplerStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::SensorReading;
    use crate::testing::ScriptedSensor;
    use embassy_futures::block_on;

    fn sampler(sensor: ScriptedSensor) -> Sampler<ScriptedSensor> {
        Sampler::new(sensor, DeviceId::new(3).unwrap())
    }

    #[test]
    fn test_sample_encodes_reading_with_timestamp() {
        let mut sampler = sampler(ScriptedSensor::with_pressures(&[101_325]));

        let frame = block_on(sampler.sample(45)).copied();
        assert_eq!(frame.map(|f| f.as_str().len()), Some(18));
        assert_eq!(
            sampler.last_frame().map(|f| f.as_str()),
            Some("3,00000045,101325\n")
        );
        assert_eq!(sampler.stats().taken, 1);
    }

    #[test]
    fn test_not_ready_leaves_previous_frame() {
        let mut sensor = ScriptedSensor::with_pressures(&[100_000]);
        sensor.push(Err(SensorError::NotReady));
        let mut sampler = sampler(sensor);

        assert!(block_on(sampler.sample(20)).is_some());
        let before = *sampler.last_frame().unwrap();

        assert!(block_on(sampler.sample(40)).is_none());
        assert_eq!(sampler.last_frame(), Some(&before));
        assert_eq!(sampler.stats().not_ready, 1);
    }

    #[test]
    fn test_read_failure_is_absorbed() {
        let mut sensor = ScriptedSensor::default();
        sensor.push(Err(SensorError::ReadFailed {
            sensor: "BMP388",
            operation: "read pressure",
            details: "I2C NACK",
        }));
        sensor.push(Ok(SensorReading {
            pressure_pa: 99_000,
            temperature_milli_celsius: 20_000,
        }));
        let mut sampler = sampler(sensor);

        assert!(block_on(sampler.sample(20)).is_none());
        assert!(sampler.last_frame().is_none());

        // The next period still runs
        assert!(block_on(sampler.sample(40)).is_some());
        assert_eq!(
            sampler.stats(),
            SamplerStats {
                taken: 1,
                not_ready: 0,
                failed: 1,
            }
        );
    }

    #[test]
    fn test_init_failure_is_reported() {
        let mut sensor = ScriptedSensor::default();
        sensor.init_result = Some(SensorError::InitializationFailed {
            sensor: "BMP388",
            details: "chip id mismatch",
        });
        let mut sampler = sampler(sensor);

        assert!(block_on(sampler.init()).is_err());
    }
}
