//! Concrete sensor drivers for the firmware

mod bmp388;

pub use bmp388::Bmp388Sensor;
