//! Test doubles for the sensor and BLE collaborators

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::link::{ConnHandle, LinkError, NotifyLink};
use crate::sensors::{Sensor, SensorError, SensorReading};

/// Records every notification instead of sending it.
#[derive(Default)]
pub struct RecordingLink {
    /// Current readable value of the frame characteristic
    pub value: Option<Vec<u8>>,
    pub sent: Vec<(ConnHandle, Vec<u8>)>,
    pub attempts: usize,
    pub fail_with: Option<LinkError>,
}

impl NotifyLink for RecordingLink {
    fn set_value(&mut self, payload: &[u8]) -> Result<(), LinkError> {
        self.value = Some(payload.to_vec());
        Ok(())
    }

    async fn notify(&mut self, conn: ConnHandle, payload: &[u8]) -> Result<(), LinkError> {
        self.attempts += 1;
        if let Some(e) = self.fail_with {
            return Err(e);
        }
        self.sent.push((conn, payload.to_vec()));
        Ok(())
    }
}

/// Replays a fixed list of read results, then reports `NotReady`.
#[derive(Default)]
pub struct ScriptedSensor {
    pub script: VecDeque<Result<SensorReading, SensorError>>,
    pub init_result: Option<SensorError>,
    pub reads: usize,
}

impl ScriptedSensor {
    pub fn with_pressures(pressures: &[u32]) -> Self {
        Self {
            script: pressures
                .iter()
                .map(|&pressure_pa| {
                    Ok(SensorReading {
                        pressure_pa,
                        temperature_milli_celsius: 21_500,
                    })
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn push(&mut self, result: Result<SensorReading, SensorError>) {
        self.script.push_back(result);
    }
}

impl Sensor for ScriptedSensor {
    async fn init(&mut self) -> Result<(), SensorError> {
        match self.init_result {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn read(&mut self) -> Result<SensorReading, SensorError> {
        self.reads += 1;
        self.script.pop_front().unwrap_or(Err(SensorError::NotReady))
    }
}
