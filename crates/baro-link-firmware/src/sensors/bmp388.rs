use baro_link_core::sensors::{Sensor, SensorError, SensorReading};
use bmp388_embedded::r#async::Bmp388Async;
use embedded_hal_async::i2c::I2c;
use log::{error, info};

/// BMP388 pressure/temperature sensor in normal (continuous) mode.
///
/// The sensor converts on its own schedule; a read that finds no fresh
/// pressure conversion reports [`SensorError::NotReady`].
pub struct Bmp388Sensor<I> {
    sensor: Bmp388Async<I, embassy_time::Delay>,
}

impl<I: I2c> Bmp388Sensor<I> {
    pub fn new(i2c: I) -> Self {
        Self {
            sensor: Bmp388Async::new(i2c, embassy_time::Delay),
        }
    }
}

impl<I: I2c> Sensor for Bmp388Sensor<I> {
    async fn init(&mut self) -> Result<(), SensorError> {
        self.sensor.init().await.map_err(|e| {
            error!("BMP388 init failed: {:?}", e);
            SensorError::InitializationFailed {
                sensor: "BMP388",
                details: "Chip id mismatch or no ACK",
            }
        })?;

        // 50 Hz output data rate keeps a fresh conversion for every 20 ms period
        self.sensor
            .set_output_data_rate(bmp388_embedded::OutputDataRate::Hz50)
            .await
            .map_err(|e| {
                error!("BMP388 set_output_data_rate failed: {:?}", e);
                SensorError::InitializationFailed {
                    sensor: "BMP388",
                    details: "Failed to set output data rate",
                }
            })?;

        self.sensor.start_normal_mode().await.map_err(|e| {
            error!("BMP388 start_normal_mode failed: {:?}", e);
            SensorError::InitializationFailed {
                sensor: "BMP388",
                details: "Failed to enter normal mode",
            }
        })?;

        info!("BMP388: normal mode, 50 Hz");
        Ok(())
    }

    async fn read(&mut self) -> Result<SensorReading, SensorError> {
        let status = self.sensor.status().await.map_err(|e| {
            error!("BMP388 status read failed: {:?}", e);
            SensorError::I2cError {
                sensor: "BMP388",
                details: "Failed to read status register",
            }
        })?;
        if !status.pressure_data_ready {
            return Err(SensorError::NotReady);
        }

        let measurement = self.sensor.measurement().await.map_err(|e| {
            error!("BMP388 measurement read failed: {:?}", e);
            SensorError::ReadFailed {
                sensor: "BMP388",
                operation: "read pressure measurement",
                details: "I2C communication error",
            }
        })?;

        Ok(SensorReading {
            pressure_pa: measurement.pressure_pa as u32,
            temperature_milli_celsius: (measurement.temperature_c * 1000.0) as i32,
        })
    }
}
