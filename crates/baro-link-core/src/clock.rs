//! Millisecond reference clock
//!
//! A free-running millisecond counter advanced by a 1 ms tick source and
//! corrected once per connection from the central's Current Time Service.
//!
//! The counter is a `u64`, which is not word-atomic on the 32-bit targets we
//! run on, so every access goes through a critical section.

use core::cell::Cell;

use critical_section::Mutex;
use thiserror_no_std::Error;

const MS_PER_HOUR: u64 = 3_600_000;
const MS_PER_MINUTE: u64 = 60_000;
const MS_PER_SECOND: u64 = 1_000;

/// Length of the Current Time characteristic value (Exact Time 256 + adjust reason)
pub const CURRENT_TIME_LEN: usize = 10;

/// Process-wide elapsed milliseconds since an arbitrary epoch.
pub struct ReferenceClock {
    millis: Mutex<Cell<u64>>,
}

impl ReferenceClock {
    /// Create a clock starting at 0 ms.
    pub const fn new() -> Self {
        Self {
            millis: Mutex::new(Cell::new(0)),
        }
    }

    /// Advance the counter by one millisecond.
    ///
    /// Called from the 1 ms tick source; does nothing but the increment.
    #[inline]
    pub fn tick(&self) {
        critical_section::with(|cs| {
            let cell = self.millis.borrow(cs);
            cell.set(cell.get().wrapping_add(1));
        });
    }

    /// Overwrite the counter with a value derived from a remote time read.
    pub fn set(&self, value_ms: u64) {
        critical_section::with(|cs| self.millis.borrow(cs).set(value_ms));
        log::info!("Reference clock set to {} ms", value_ms);
    }

    /// Current counter value. Never blocks beyond a critical section.
    #[inline]
    pub fn now_ms(&self) -> u64 {
        critical_section::with(|cs| self.millis.borrow(cs).get())
    }
}

impl Default for ReferenceClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a time of day with a 1/256 s fraction into milliseconds.
///
/// The fraction term truncates toward zero: `floor(fraction256 * 1000 / 256)`.
pub const fn exact_time_to_millis(hours: u8, minutes: u8, seconds: u8, fraction256: u8) -> u64 {
    hours as u64 * MS_PER_HOUR
        + minutes as u64 * MS_PER_MINUTE
        + seconds as u64 * MS_PER_SECOND
        + (fraction256 as u64 * 1000) / 256
}

/// Why a Current Time value could not be decoded.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeDecodeError {
    #[error("Current Time value too short: {len} bytes")]
    TooShort { len: usize },
    #[error("Current Time field out of range: {field}")]
    OutOfRange { field: &'static str },
}

/// Decoded value of the Current Time characteristic (0x2A2B).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CurrentTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub day_of_week: u8,
    pub fractions256: u8,
    pub adjust_reason: u8,
}

impl CurrentTime {
    /// Time-of-day portion of the value, in milliseconds since midnight.
    pub const fn to_millis(&self) -> u64 {
        exact_time_to_millis(self.hours, self.minutes, self.seconds, self.fractions256)
    }

    /// Decode the little-endian characteristic value.
    ///
    /// Trailing bytes beyond the ten defined ones are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TimeDecodeError> {
        if bytes.len() < CURRENT_TIME_LEN {
            return Err(TimeDecodeError::TooShort { len: bytes.len() });
        }

        let time = Self {
            year: u16::from_le_bytes([bytes[0], bytes[1]]),
            month: bytes[2],
            day: bytes[3],
            hours: bytes[4],
            minutes: bytes[5],
            seconds: bytes[6],
            day_of_week: bytes[7],
            fractions256: bytes[8],
            adjust_reason: bytes[9],
        };

        if time.hours > 23 {
            return Err(TimeDecodeError::OutOfRange { field: "hours" });
        }
        if time.minutes > 59 {
            return Err(TimeDecodeError::OutOfRange { field: "minutes" });
        }
        if time.seconds > 59 {
            return Err(TimeDecodeError::OutOfRange { field: "seconds" });
        }

        Ok(time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_time_conversion() {
        assert_eq!(exact_time_to_millis(1, 2, 3, 128), 3_723_500);
        assert_eq!(exact_time_to_millis(0, 0, 0, 0), 0);
        assert_eq!(exact_time_to_millis(23, 59, 59, 255), 86_399_996);
    }

    #[test]
    fn test_fraction_truncates() {
        // 1/256 s = 3.906 ms
        assert_eq!(exact_time_to_millis(0, 0, 0, 1), 3);
        // 255/256 s = 996.09 ms
        assert_eq!(exact_time_to_millis(0, 0, 0, 255), 996);
    }

    #[test]
    fn test_ticks_advance_from_set_value() {
        let clock = ReferenceClock::new();
        assert_eq!(clock.now_ms(), 0);

        clock.set(1_000);
        for _ in 0..250 {
            clock.tick();
        }
        assert_eq!(clock.now_ms(), 1_250);
    }

    #[test]
    fn test_set_overwrites_rather_than_adds() {
        let clock = ReferenceClock::new();
        for _ in 0..10 {
            clock.tick();
        }
        clock.set(42);
        assert_eq!(clock.now_ms(), 42);
    }

    #[test]
    fn test_current_time_decode() {
        // 2024-05-17 01:02:03, Friday, 128/256, manual adjust
        let raw = [0xE8, 0x07, 5, 17, 1, 2, 3, 5, 128, 0x01];
        let time = CurrentTime::from_bytes(&raw).unwrap();

        assert_eq!(time.year, 2024);
        assert_eq!(time.month, 5);
        assert_eq!(time.day, 17);
        assert_eq!(time.day_of_week, 5);
        assert_eq!(time.adjust_reason, 1);
        assert_eq!(time.to_millis(), 3_723_500);
    }

    #[test]
    fn test_current_time_rejects_short_and_out_of_range() {
        assert_eq!(
            CurrentTime::from_bytes(&[0; 9]),
            Err(TimeDecodeError::TooShort { len: 9 })
        );

        let raw = [0xE8, 0x07, 5, 17, 24, 0, 0, 5, 0, 0];
        assert_eq!(
            CurrentTime::from_bytes(&raw),
            Err(TimeDecodeError::OutOfRange { field: "hours" })
        );

        let raw = [0xE8, 0x07, 5, 17, 0, 0, 60, 5, 0, 0];
        assert_eq!(
            CurrentTime::from_bytes(&raw),
            Err(TimeDecodeError::OutOfRange { field: "seconds" })
        );
    }
}
