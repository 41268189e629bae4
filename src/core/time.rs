//! Time representation using integer nanoseconds.
//! Every boundary computed by the edit engine stays in this unit so video and
//! audio tracks trimmed from the same range end up with identical durations.

/// Time in nanoseconds since timeline start
pub type Time = i64;

/// Time constants for conversions
pub mod constants {
    use super::Time;

    pub const NANOS_PER_SECOND: Time = 1_000_000_000;
    pub const NANOS_PER_MILLI: Time = 1_000_000;
    pub const NANOS_PER_MICRO: Time = 1_000;
}

/// Convert seconds (f64) to nanoseconds (i64), rounding to the nearest nanosecond
#[inline]
pub fn from_seconds(seconds: f64) -> Time {
    (seconds * constants::NANOS_PER_SECOND as f64).round() as Time
}

/// Convert nanoseconds (i64) to seconds (f64)
#[inline]
pub fn to_seconds(nanos: Time) -> f64 {
    nanos as f64 / constants::NANOS_PER_SECOND as f64
}

/// Convert milliseconds to nanoseconds
#[inline]
pub fn from_millis(millis: i64) -> Time {
    millis * constants::NANOS_PER_MILLI
}

/// Convert nanoseconds to milliseconds
#[inline]
pub fn to_millis(nanos: Time) -> i64 {
    nanos / constants::NANOS_PER_MILLI
}

/// Convert microseconds to nanoseconds
#[inline]
pub fn from_micros(micros: i64) -> Time {
    micros * constants::NANOS_PER_MICRO
}

/// Convert nanoseconds to microseconds
#[inline]
pub fn to_micros(nanos: Time) -> i64 {
    nanos / constants::NANOS_PER_MICRO
}

/// Time zero constant
pub const ZERO: Time = 0;

/// Rational time base of a media stream (seconds per tick = num / den).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TimeBase {
    pub num: i32,
    pub den: i32,
}

impl TimeBase {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Nanosecond time base, used when a source does not report one.
    pub const fn nanos() -> Self {
        Self::new(1, constants::NANOS_PER_SECOND as i32)
    }

    /// A time base is usable only when both terms are positive.
    pub fn is_valid(&self) -> bool {
        self.num > 0 && self.den > 0
    }

    /// Convert nanoseconds to ticks of this time base (floor).
    /// Returns `None` for an invalid time base.
    pub fn to_ticks(&self, nanos: Time) -> Option<i64> {
        if !self.is_valid() {
            return None;
        }
        let scaled = nanos as i128 * self.den as i128;
        let divisor = self.num as i128 * constants::NANOS_PER_SECOND as i128;
        i64::try_from(scaled.div_euclid(divisor)).ok()
    }

    /// Convert ticks of this time base to nanoseconds (floor).
    pub fn ticks_to_nanos(&self, ticks: i64) -> Option<Time> {
        if !self.is_valid() {
            return None;
        }
        let scaled = ticks as i128 * self.num as i128 * constants::NANOS_PER_SECOND as i128;
        i64::try_from(scaled.div_euclid(self.den as i128)).ok()
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        Self::nanos()
    }
}

/// Format time as HH:MM:SS.mmm
pub fn format_time(nanos: Time) -> String {
    let total_millis = to_millis(nanos.max(0));
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let seconds = (total_millis % 60_000) / 1000;
    let millis = total_millis % 1000;

    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}
