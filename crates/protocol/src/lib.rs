//! TEMPer2 protocol library
//!
//! This crate encodes the single query understood by the TEMPer2 USB
//! thermometer and decodes its 8-byte response into Celsius readings.
//! It has no USB dependency; moving the bytes is the reader's job.
//!
//! # Example
//!
//! ```
//! use protocol::{RawResponse, build_request, decode};
//!
//! assert_eq!(build_request(), [0x01, 0x80, 0x33, 0x01, 0x00, 0x00, 0x00, 0x00]);
//!
//! let response = RawResponse::new([0x80, 0x02, 0x0C, 0x80, 0x0C, 0x80, 0x00, 0x00]);
//! let reading = decode(&response);
//! assert_eq!(reading.inside_celsius, 12.5);
//! assert_eq!(reading.outside_celsius, 12.5);
//! ```

pub mod codec;
pub mod error;
pub mod types;

pub use codec::{TEMP_REQUEST, build_request, celsius, decode, raw_reading};
pub use error::{ProtocolError, Result};
pub use types::{
    DeviceIdentity, REPORT_LEN, RawResponse, TEMPER2, TEMPER2_PRODUCT_ID, TEMPER2_VENDOR_ID,
    TemperatureReading,
};
