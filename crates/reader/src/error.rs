//! Device session error types
//!
//! One variant per failure kind so callers can tell a missing device from a
//! permissions problem or a timed-out transfer. The underlying `rusb::Error`
//! is always available through `source()`.

use protocol::{DeviceIdentity, ProtocolError};
use std::fmt;
use thiserror::Error;

/// USB transfer type, used in transfer error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Control,
    Interrupt,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferKind::Control => f.write_str("Control"),
            TransferKind::Interrupt => f.write_str("Interrupt"),
        }
    }
}

/// Errors raised while connecting to, talking to or tearing down a device
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Unable to initialise libusb: {0}")]
    Init(#[source] rusb::Error),

    #[error("Failed to enumerate USB devices: {0}")]
    Enumerate(#[source] rusb::Error),

    #[error("Could not find device {0}")]
    DeviceNotFound(DeviceIdentity),

    #[error("Unable to open USB device: {0}")]
    Open(#[source] rusb::Error),

    #[error("Unable to detach kernel driver from interface {interface}: {source}")]
    Detach { interface: u8, source: rusb::Error },

    #[error("Unable to claim interface {interface}: {source}")]
    Claim { interface: u8, source: rusb::Error },

    #[error("{kind} transfer failed: {source}")]
    Transfer {
        kind: TransferKind,
        source: rusb::Error,
    },

    #[error("Short {kind} transfer: expected {expected} bytes, got {actual}")]
    ShortTransfer {
        kind: TransferKind,
        expected: usize,
        actual: usize,
    },

    #[error("Unable to release interface {interface}: {source}")]
    Release { interface: u8, source: rusb::Error },

    #[error("Unable to re-attach kernel driver to interface {interface}: {source}")]
    Reattach { interface: u8, source: rusb::Error },

    #[error("Malformed response: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("{primary} (teardown also failed: {teardown})")]
    TeardownAfterFailure {
        #[source]
        primary: Box<SessionError>,
        teardown: Box<SessionError>,
    },
}

impl SessionError {
    /// Attach a teardown failure to the error that caused the teardown
    pub fn with_teardown(self, teardown: SessionError) -> Self {
        SessionError::TeardownAfterFailure {
            primary: Box::new(self),
            teardown: Box::new(teardown),
        }
    }

    /// The error that ended the session, ignoring any teardown failure
    pub fn primary(&self) -> &SessionError {
        match self {
            SessionError::TeardownAfterFailure { primary, .. } => primary.primary(),
            other => other,
        }
    }

    /// The teardown failure carried alongside the primary error, if any
    pub fn teardown(&self) -> Option<&SessionError> {
        match self {
            SessionError::TeardownAfterFailure { teardown, .. } => Some(teardown),
            _ => None,
        }
    }

    /// Whether the failure was a transfer timing out
    pub fn is_timeout(&self) -> bool {
        matches!(
            self.primary(),
            SessionError::Transfer {
                source: rusb::Error::Timeout,
                ..
            }
        )
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
