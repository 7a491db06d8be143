//! TEMPer2 reader
//!
//! Talks to a TEMPer2 dual-sensor USB thermometer through libusb: opens a
//! session on the device, sends the temperature query, reads the 8-byte
//! report and decodes it with the [`protocol`] crate.
//!
//! # Example
//!
//! ```no_run
//! use reader::Temper2Reader;
//! use reader::usb::{RusbTransport, SessionOptions};
//!
//! let reader = Temper2Reader::new(RusbTransport, SessionOptions::default());
//! let reading = reader.read_temperature()?;
//! println!("Inside temperature: {}", reading.inside_celsius);
//! # Ok::<(), reader::SessionError>(())
//! ```

pub mod config;
pub mod error;
pub mod temper;
pub mod test_utils;
pub mod usb;

pub use config::ReaderConfig;
pub use error::{Result, SessionError, TransferKind};
pub use temper::Temper2Reader;
