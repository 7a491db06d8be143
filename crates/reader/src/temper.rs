//! TEMPer2 reader
//!
//! Composes a [`DeviceSession`](crate::usb::DeviceSession) with the protocol
//! codec: one connect, one query, one response, one teardown per reading.

use crate::error::Result;
use crate::usb::{SessionOptions, Transport, with_session};
use protocol::{REPORT_LEN, RawResponse, TEMPER2, TemperatureReading, build_request, decode};
use tracing::{debug, info};

/// Reads both sensors of a TEMPer2 thermometer
pub struct Temper2Reader<T: Transport> {
    transport: T,
    options: SessionOptions,
}

impl<T: Transport> Temper2Reader<T> {
    pub fn new(transport: T, options: SessionOptions) -> Self {
        Self { transport, options }
    }

    /// Connect, query, decode and disconnect
    ///
    /// Either both temperatures are returned or the session error that
    /// prevented them; the device is always released before returning.
    pub fn read_temperature(&self) -> Result<TemperatureReading> {
        let reading = with_session(&self.transport, TEMPER2, &self.options, |session| {
            session.send_request(&build_request())?;
            let raw = session.receive_data(REPORT_LEN)?;
            let response = RawResponse::try_from(raw.as_slice())?;
            debug!("Raw response: {:02x?}", response.as_bytes());
            Ok(decode(&response))
        })?;

        info!(
            "Inside {:.2} °C, outside {:.2} °C",
            reading.inside_celsius, reading.outside_celsius
        );
        Ok(reading)
    }
}
