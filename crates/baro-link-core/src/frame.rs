//! Telemetry frame codec
//!
//! Every sample is sent as a fixed-length ASCII record:
//!
//! ```text
//! <device id>,<timestamp ms, 8 digits>,<pressure Pa, 6 digits>\n
//! ```
//!
//! e.g. `3,00000045,001013\n`. The receiver parses fixed-size records, so the
//! record never grows: a timestamp or pressure wider than its field keeps only
//! its low-order digits (the timestamp field wraps every 10^8 ms, ~27.7 h).

use core::str;

use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

const TIMESTAMP_DIGITS: usize = 8;
const PRESSURE_DIGITS: usize = 6;

/// Length of an encoded frame in bytes, newline included.
pub const FRAME_LEN: usize = 1 + 1 + TIMESTAMP_DIGITS + 1 + PRESSURE_DIGITS + 1;

/// Header the receiver writes above the CSV rows built from frames.
pub const CSV_HEADER: &str = "id,timestamp,pressure_values";

/// Widest CSV row: one id digit, a full `u64` timestamp and a full `u32`
/// pressure, plus two commas.
pub const CSV_ROW_CAPACITY: usize = 1 + 1 + 20 + 1 + 10;

/// Single decimal digit identifying the device in a multi-device deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DeviceId(u8);

impl DeviceId {
    pub const MAX: u8 = 9;
    pub const DEFAULT: Self = Self(3);

    /// Returns `None` unless `id` is a single digit.
    pub const fn new(id: u8) -> Option<Self> {
        if id <= Self::MAX { Some(Self(id)) } else { None }
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for DeviceId {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(FrameError::InvalidDeviceId(value))
    }
}

impl From<DeviceId> for u8 {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("device id {0} is not a single digit")]
    InvalidDeviceId(u8),
    #[error("frame is not ASCII")]
    NotAscii,
    #[error("frame is missing the {0} field")]
    MissingField(&'static str),
    #[error("frame field {0} is not a decimal number")]
    InvalidNumber(&'static str),
    #[error("frame has more than three fields")]
    TrailingData,
}

/// One encoded telemetry record.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    bytes: [u8; FRAME_LEN],
}

impl Frame {
    pub const fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_str(&self) -> &str {
        // Only ever built from ASCII digits, commas and a newline
        str::from_utf8(&self.bytes).unwrap_or_default()
    }

    pub const fn len(&self) -> usize {
        FRAME_LEN
    }

    pub const fn is_empty(&self) -> bool {
        false
    }
}

impl core::fmt::Debug for Frame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Frame").field(&self.as_str()).finish()
    }
}

/// Write `value` as exactly `out.len()` zero-padded decimal digits,
/// dropping any digits above that width.
fn write_padded(out: &mut [u8], mut value: u64) {
    for slot in out.iter_mut().rev() {
        *slot = b'0' + (value % 10) as u8;
        value /= 10;
    }
}

/// Serialize one sample into a frame.
pub fn encode(device_id: DeviceId, timestamp_ms: u64, pressure: u32) -> Frame {
    let mut bytes = [0u8; FRAME_LEN];
    let (id, rest) = bytes.split_at_mut(1);
    id[0] = b'0' + device_id.get();

    rest[0] = b',';
    let (timestamp, rest) = rest[1..].split_at_mut(TIMESTAMP_DIGITS);
    write_padded(timestamp, timestamp_ms);

    rest[0] = b',';
    let (pressure_field, rest) = rest[1..].split_at_mut(PRESSURE_DIGITS);
    write_padded(pressure_field, pressure as u64);

    rest[0] = b'\n';

    Frame { bytes }
}

/// Fields recovered from a received frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFields {
    pub device_id: DeviceId,
    pub timestamp_ms: u64,
    pub pressure: u32,
}

impl FrameFields {
    /// Render as a CSV row matching [`CSV_HEADER`].
    pub fn to_csv_row(&self) -> heapless::String<CSV_ROW_CAPACITY> {
        use core::fmt::Write;

        let mut row = heapless::String::new();
        // Cannot overflow: every field is at most its type's widest rendering
        let _ = write!(
            row,
            "{},{},{}",
            self.device_id.get(),
            self.timestamp_ms,
            self.pressure
        );
        row
    }
}

fn parse_field<T: str::FromStr>(field: Option<&str>, name: &'static str) -> Result<T, FrameError> {
    let field = field.ok_or(FrameError::MissingField(name))?;
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FrameError::InvalidNumber(name));
    }
    field.parse().map_err(|_| FrameError::InvalidNumber(name))
}

/// Parse a received record by splitting on commas.
///
/// Accepts the record with or without its trailing newline.
pub fn decode(payload: &[u8]) -> Result<FrameFields, FrameError> {
    let text = str::from_utf8(payload).map_err(|_| FrameError::NotAscii)?;
    if !text.is_ascii() {
        return Err(FrameError::NotAscii);
    }

    let mut fields = text.trim_end_matches(['\n', '\r', '\0']).split(',');

    let device_id = DeviceId::try_from(parse_field::<u8>(fields.next(), "device id")?)?;
    let timestamp_ms = parse_field(fields.next(), "timestamp")?;
    let pressure = parse_field(fields.next(), "pressure")?;

    if fields.next().is_some() {
        return Err(FrameError::TrailingData);
    }

    Ok(FrameFields {
        device_id,
        timestamp_ms,
        pressure,
    })
}
