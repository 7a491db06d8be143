//! TEMPer2 type definitions
//!
//! This module defines the value types exchanged between the USB session and
//! the codec: the device identity, the raw 8-byte report and the decoded
//! temperature reading.

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of every TEMPer2 command and response report
pub const REPORT_LEN: usize = 8;

/// TEMPer2 USB vendor ID (Microdia)
pub const TEMPER2_VENDOR_ID: u16 = 0x0c45;

/// TEMPer2 USB product ID
pub const TEMPER2_PRODUCT_ID: u16 = 0x7401;

/// USB vendor/product pair
///
/// Identifies a class of hardware, not a specific physical unit: two
/// thermometers plugged into the same host share the same identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// USB Vendor ID
    pub vendor_id: u16,
    /// USB Product ID
    pub product_id: u16,
}

impl DeviceIdentity {
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

/// Identity of the TEMPer2 dual-sensor thermometer
pub const TEMPER2: DeviceIdentity = DeviceIdentity::new(TEMPER2_VENDOR_ID, TEMPER2_PRODUCT_ID);

/// Raw response report read from the interrupt endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawResponse([u8; REPORT_LEN]);

impl RawResponse {
    pub const fn new(bytes: [u8; REPORT_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; REPORT_LEN] {
        &self.0
    }
}

impl From<[u8; REPORT_LEN]> for RawResponse {
    fn from(bytes: [u8; REPORT_LEN]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for RawResponse {
    type Error = ProtocolError;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        let report: [u8; REPORT_LEN] =
            bytes
                .try_into()
                .map_err(|_| ProtocolError::IncompleteResponse {
                    expected: REPORT_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(report))
    }
}

/// Decoded temperatures from a single query
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureReading {
    /// Internal sensor, degrees Celsius
    pub inside_celsius: f64,
    /// External probe, degrees Celsius
    pub outside_celsius: f64,
}
