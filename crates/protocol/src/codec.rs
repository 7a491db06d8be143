//! TEMPer2 request/response codec
//!
//! The device understands exactly one query. Its response carries two
//! fixed-point sensor values, high byte first:
//!
//! ```text
//! offset  0    1    2       3       4        5        6    7
//!         ..   ..   in_hi   in_lo   out_hi   out_lo   ..   ..
//! ```
//!
//! Each raw value is scaled by 125/32000 to degrees Celsius.

use crate::types::{REPORT_LEN, RawResponse, TemperatureReading};

/// The "read temperature" command
pub const TEMP_REQUEST: [u8; REPORT_LEN] = [0x01, 0x80, 0x33, 0x01, 0x00, 0x00, 0x00, 0x00];

const INSIDE_OFFSET: usize = 2;
const OUTSIDE_OFFSET: usize = 4;

const SCALE_NUMERATOR: f64 = 125.0;
const SCALE_DENOMINATOR: f64 = 32000.0;

/// Build the temperature query report
pub fn build_request() -> [u8; REPORT_LEN] {
    TEMP_REQUEST
}

/// Decode a response report into inside and outside temperatures
pub fn decode(response: &RawResponse) -> TemperatureReading {
    let bytes = response.as_bytes();
    let inside = raw_reading(bytes[INSIDE_OFFSET], bytes[INSIDE_OFFSET + 1]);
    let outside = raw_reading(bytes[OUTSIDE_OFFSET], bytes[OUTSIDE_OFFSET + 1]);

    TemperatureReading {
        inside_celsius: celsius(inside),
        outside_celsius: celsius(outside),
    }
}

/// Combine a high/low byte pair into the unscaled sensor value
///
/// A high byte below 0x80 gives the usual `(high << 8) + low`. A high byte
/// with its top bit set is sign-extended to character width, placed in the
/// upper half of that character, and then shifted into place, so `FF 9C`
/// yields -65380 rather than the two's-complement -100. Real sensors have not
/// been observed to report this range; the behaviour is kept as-is until it
/// can be checked against hardware.
pub fn raw_reading(high: u8, low: u8) -> i32 {
    let low = i32::from(low);
    let high = i32::from(high as i8);

    if high < 0 {
        let widened = high << 8;
        low + (widened << 8)
    } else {
        low + (high << 8)
    }
}

/// Scale a raw sensor value to degrees Celsius
pub fn celsius(raw: i32) -> f64 {
    f64::from(raw) * SCALE_NUMERATOR / SCALE_DENOMINATOR
}
