//! USB device session
//!
//! A [`DeviceSession`] owns everything needed to exchange bytes with one
//! device: the library context, the open handle, detached kernel drivers and
//! claimed interfaces. It only exists in the `Connected` state from the
//! caller's point of view; every partial setup is unwound before `connect`
//! returns an error, and every session is torn down exactly once, either by
//! [`DeviceSession::disconnect`] or on drop.

use crate::error::{Result, SessionError, TransferKind};
use crate::usb::transport::{Transport, TransportContext, TransportHandle};
use protocol::DeviceIdentity;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for USB transfers (1 second)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Interfaces claimed on every session, in claim order
pub const INTERFACES: [u8; 2] = [0, 1];

/// bmRequestType: class request, interface recipient, host-to-device
pub const REQUEST_TYPE_CLASS_INTERFACE_OUT: u8 = 0x21;

/// HID SET_REPORT
pub const SET_REPORT: u8 = 0x09;

/// wValue for SET_REPORT: output report, id 0
pub const OUTPUT_REPORT: u16 = 2 << 8;

/// Interrupt IN endpoint carrying the response report
pub const INTERRUPT_IN_ENDPOINT: u8 = 0x82;

/// When to detach kernel drivers before claiming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetachPolicy {
    /// Always try to detach. libusb's capability query is unreliable on some
    /// hosts and a missed detach makes the claim fail.
    #[default]
    Always,
    /// Detach only when the platform supports it and a driver is bound to
    /// the first interface
    Auto,
}

/// Per-session settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub timeout: Duration,
    pub detach_policy: DetachPolicy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            detach_policy: DetachPolicy::default(),
        }
    }
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Setup in progress; never observed by callers of `connect`
    Connecting,
    /// Both interfaces claimed, transfers allowed
    Connected,
    /// Releasing interfaces and reattaching drivers
    Disconnecting,
    /// Torn down
    Closed,
}

/// An open, claimed connection to a USB device
pub struct DeviceSession<C: TransportContext> {
    // Declared before `context` so the handle is closed before the context exits.
    handle: C::Handle,
    context: C,
    identity: DeviceIdentity,
    interfaces: [u8; 2],
    /// Interfaces whose kernel driver we detached
    detached: Vec<u8>,
    /// Interfaces currently claimed by us
    claimed: Vec<u8>,
    timeout: Duration,
    state: SessionState,
}

impl<C: TransportContext> DeviceSession<C> {
    /// Find the device, open it, detach kernel drivers and claim both interfaces
    ///
    /// If several attached devices share `identity`, the last one enumerated
    /// is used. On error everything acquired so far has already been released.
    pub fn connect<T>(
        transport: &T,
        identity: DeviceIdentity,
        options: &SessionOptions,
    ) -> Result<Self>
    where
        T: Transport<Context = C>,
    {
        let context = transport.init().map_err(SessionError::Init)?;
        debug!("Initialised USB context");

        let device = find_device(&context, identity)?;
        let handle = context.open_device(&device).map_err(|e| {
            warn!("Failed to open device {}: {}", identity, e);
            SessionError::Open(e)
        })?;
        debug!("Opened device {}", identity);

        let mut session = Self {
            handle,
            context,
            identity,
            interfaces: INTERFACES,
            detached: Vec::new(),
            claimed: Vec::new(),
            timeout: options.timeout,
            state: SessionState::Connecting,
        };

        // Any early return from here drops `session`, which unwinds the
        // detaches and claims recorded so far.
        if session.should_detach(options.detach_policy) {
            session.detach_kernel_drivers()?;
        }
        session.claim_interfaces()?;

        session.state = SessionState::Connected;
        info!(
            "Connected to {} (kernel driver detached: {})",
            identity,
            session.detach_performed()
        );
        Ok(session)
    }

    /// Send a report to the device with a class SET_REPORT control transfer
    pub fn send_request(&mut self, data: &[u8]) -> Result<()> {
        let index = u16::from(self.interfaces[1]);
        debug!(
            "Control transfer: request_type={:#x}, request={:#x}, value={:#x}, index={:#x}, data_len={}",
            REQUEST_TYPE_CLASS_INTERFACE_OUT,
            SET_REPORT,
            OUTPUT_REPORT,
            index,
            data.len()
        );

        let written = self
            .handle
            .write_control(
                REQUEST_TYPE_CLASS_INTERFACE_OUT,
                SET_REPORT,
                OUTPUT_REPORT,
                index,
                data,
                self.timeout,
            )
            .map_err(|e| {
                warn!("Control transfer failed: {}", e);
                SessionError::Transfer {
                    kind: TransferKind::Control,
                    source: e,
                }
            })?;

        debug!("Control transfer succeeded: {} bytes", written);
        Ok(())
    }

    /// Read exactly `len` bytes from the interrupt IN endpoint
    ///
    /// Blocks for up to the session timeout. No retries.
    pub fn receive_data(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; len];
        let read = self
            .handle
            .read_interrupt(INTERRUPT_IN_ENDPOINT, &mut buffer, self.timeout)
            .map_err(|e| {
                warn!("Interrupt transfer failed: {}", e);
                SessionError::Transfer {
                    kind: TransferKind::Interrupt,
                    source: e,
                }
            })?;

        if read != len {
            warn!("Interrupt transfer returned {} of {} bytes", read, len);
            return Err(SessionError::ShortTransfer {
                kind: TransferKind::Interrupt,
                expected: len,
                actual: read,
            });
        }

        debug!("Interrupt transfer succeeded: {:02x?}", buffer);
        Ok(buffer)
    }

    /// Release interfaces, reattach kernel drivers, close the handle and
    /// exit the library context
    ///
    /// Every step is attempted even if an earlier one fails. The first
    /// failure is returned; the rest are logged.
    pub fn disconnect(mut self) -> Result<()> {
        let result = self.teardown();
        info!("Disconnected from {}", self.identity);
        result
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn identity(&self) -> DeviceIdentity {
        self.identity
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether a kernel driver was detached and will be reattached
    pub fn detach_performed(&self) -> bool {
        !self.detached.is_empty()
    }

    pub fn claimed_interfaces(&self) -> &[u8] {
        &self.claimed
    }

    fn should_detach(&self, policy: DetachPolicy) -> bool {
        match policy {
            DetachPolicy::Always => true,
            DetachPolicy::Auto => {
                if !self.context.supports_detach_kernel_driver() {
                    debug!("Platform cannot detach kernel drivers");
                    return false;
                }
                match self.handle.kernel_driver_active(self.interfaces[0]) {
                    Ok(active) => active,
                    Err(e) => {
                        debug!(
                            "Could not check kernel driver status for interface {}: {}",
                            self.interfaces[0], e
                        );
                        false
                    }
                }
            }
        }
    }

    fn detach_kernel_drivers(&mut self) -> Result<()> {
        for interface in self.interfaces {
            if let Err(e) = self.handle.detach_kernel_driver(interface) {
                warn!(
                    "Failed to detach kernel driver from interface {}: {}",
                    interface, e
                );
                return Err(SessionError::Detach {
                    interface,
                    source: e,
                });
            }
            debug!("Detached kernel driver from interface {}", interface);
            self.detached.push(interface);
        }
        Ok(())
    }

    fn claim_interfaces(&mut self) -> Result<()> {
        for interface in self.interfaces {
            if let Err(e) = self.handle.claim_interface(interface) {
                warn!("Failed to claim interface {}: {}", interface, e);
                return Err(SessionError::Claim {
                    interface,
                    source: e,
                });
            }
            debug!("Claimed interface {} on device {}", interface, self.identity);
            self.claimed.push(interface);
        }
        Ok(())
    }

    fn teardown(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.state = SessionState::Disconnecting;

        let mut first_error = None;

        for interface in std::mem::take(&mut self.claimed) {
            match self.handle.release_interface(interface) {
                Ok(()) => debug!("Released interface {}", interface),
                Err(e) => {
                    warn!("Failed to release interface {}: {}", interface, e);
                    first_error.get_or_insert(SessionError::Release {
                        interface,
                        source: e,
                    });
                }
            }
        }

        for interface in std::mem::take(&mut self.detached) {
            match self.handle.attach_kernel_driver(interface) {
                Ok(()) => debug!("Reattached kernel driver to interface {}", interface),
                Err(e) => {
                    warn!(
                        "Failed to re-attach kernel driver to interface {}: {}",
                        interface, e
                    );
                    first_error.get_or_insert(SessionError::Reattach {
                        interface,
                        source: e,
                    });
                }
            }
        }

        self.state = SessionState::Closed;
        first_error.map_or(Ok(()), Err)
    }
}

impl<C: TransportContext> Drop for DeviceSession<C> {
    fn drop(&mut self) {
        if self.state != SessionState::Closed {
            debug!(
                "Unwinding session for {} in state {:?}",
                self.identity, self.state
            );
            if let Err(e) = self.teardown() {
                warn!("Teardown of {} failed: {}", self.identity, e);
            }
        }
        debug!("Closed device handle and USB context");
    }
}

/// Run `f` against a freshly connected session and always disconnect
///
/// A teardown failure after `f` succeeded is returned as the error. If both
/// fail, the teardown failure is carried inside the original error.
pub fn with_session<T, R, F>(
    transport: &T,
    identity: DeviceIdentity,
    options: &SessionOptions,
    f: F,
) -> Result<R>
where
    T: Transport,
    F: FnOnce(&mut DeviceSession<T::Context>) -> Result<R>,
{
    let mut session = DeviceSession::connect(transport, identity, options)?;
    let outcome = f(&mut session);
    let teardown = session.disconnect();

    match (outcome, teardown) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(teardown)) => Err(teardown),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(teardown)) => Err(e.with_teardown(teardown)),
    }
}

/// Linear scan over attached devices; the last match wins
fn find_device<C: TransportContext>(context: &C, identity: DeviceIdentity) -> Result<C::Device> {
    let devices = context.list_devices().map_err(SessionError::Enumerate)?;
    debug!("Enumerated {} devices", devices.len());

    let mut matched = None;
    let mut matches = 0usize;
    for device in devices {
        let found = context
            .device_identity(&device)
            .map_err(SessionError::Enumerate)?;
        if found == identity {
            matches += 1;
            matched = Some(device);
        }
    }

    if matches > 1 {
        warn!(
            "Found {} devices matching {}, using the last one",
            matches, identity
        );
    }

    matched.ok_or(SessionError::DeviceNotFound(identity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockEvent, MockStep, MockTransport};
    use protocol::TEMPER2;

    #[test]
    fn test_request_type_matches_rusb_encoding() {
        let expected = rusb::request_type(
            rusb::Direction::Out,
            rusb::RequestType::Class,
            rusb::Recipient::Interface,
        );
        assert_eq!(REQUEST_TYPE_CLASS_INTERFACE_OUT, expected);
        assert_eq!(OUTPUT_REPORT, 0x0200);
    }

    #[test]
    fn test_default_options() {
        let options = SessionOptions::default();
        assert_eq!(options.timeout, Duration::from_millis(1000));
        assert_eq!(options.detach_policy, DetachPolicy::Always);
    }

    #[test]
    fn test_connect_claims_both_interfaces() {
        let transport = MockTransport::new().with_device(TEMPER2);
        let session =
            DeviceSession::connect(&transport, TEMPER2, &SessionOptions::default()).unwrap();

        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(session.identity(), TEMPER2);
        assert_eq!(session.claimed_interfaces(), &[0, 1]);
        assert!(session.detach_performed());

        session.disconnect().unwrap();
    }

    #[test]
    fn test_last_matching_device_wins() {
        let transport = MockTransport::new()
            .with_device(TEMPER2)
            .with_device(DeviceIdentity::new(0x1234, 0x5678))
            .with_device(TEMPER2);
        let session =
            DeviceSession::connect(&transport, TEMPER2, &SessionOptions::default()).unwrap();
        session.disconnect().unwrap();

        assert!(transport.events().contains(&MockEvent::Open(2)));
        assert!(!transport.events().contains(&MockEvent::Open(0)));
    }

    #[test]
    fn test_descriptor_failure_is_enumerate_error() {
        let transport = MockTransport::new()
            .with_device(TEMPER2)
            .fail_at(MockStep::Descriptor, rusb::Error::Io);
        let err = DeviceSession::connect(&transport, TEMPER2, &SessionOptions::default())
            .err()
            .unwrap();

        assert!(matches!(err, SessionError::Enumerate(rusb::Error::Io)));
        assert_eq!(transport.events(), vec![MockEvent::Init, MockEvent::Exit]);
    }

    #[test]
    fn test_auto_policy_without_capability_skips_detach() {
        let transport = MockTransport::new()
            .with_device(TEMPER2)
            .detach_capability(false);
        let options = SessionOptions {
            detach_policy: DetachPolicy::Auto,
            ..SessionOptions::default()
        };
        let session = DeviceSession::connect(&transport, TEMPER2, &options).unwrap();
        assert!(!session.detach_performed());
        session.disconnect().unwrap();

        let events = transport.events();
        assert!(!events.iter().any(|e| matches!(e, MockEvent::Detach(_))));
        assert!(!events.iter().any(|e| matches!(e, MockEvent::Attach(_))));
    }

    #[test]
    fn test_auto_policy_with_active_driver_detaches_both() {
        let transport = MockTransport::new()
            .with_device(TEMPER2)
            .detach_capability(true)
            .kernel_driver_active(true);
        let options = SessionOptions {
            detach_policy: DetachPolicy::Auto,
            ..SessionOptions::default()
        };
        let session = DeviceSession::connect(&transport, TEMPER2, &options).unwrap();
        assert!(session.detach_performed());
        session.disconnect().unwrap();

        let events = transport.events();
        assert!(events.contains(&MockEvent::Detach(0)));
        assert!(events.contains(&MockEvent::Detach(1)));
    }

    #[test]
    fn test_auto_policy_with_idle_driver_skips_detach() {
        let transport = MockTransport::new()
            .with_device(TEMPER2)
            .detach_capability(true)
            .kernel_driver_active(false);
        let options = SessionOptions {
            detach_policy: DetachPolicy::Auto,
            ..SessionOptions::default()
        };
        let session = DeviceSession::connect(&transport, TEMPER2, &options).unwrap();
        assert!(!session.detach_performed());
        session.disconnect().unwrap();
    }

    #[test]
    fn test_no_driver_bound_is_a_detach_error() {
        let transport = MockTransport::new()
            .with_device(TEMPER2)
            .fail_at(MockStep::Detach(0), rusb::Error::NotFound);
        let err = DeviceSession::connect(&transport, TEMPER2, &SessionOptions::default())
            .err()
            .unwrap();

        assert!(matches!(
            err,
            SessionError::Detach {
                interface: 0,
                source: rusb::Error::NotFound
            }
        ));
        assert_eq!(
            transport.events(),
            vec![
                MockEvent::Init,
                MockEvent::Open(0),
                MockEvent::Close,
                MockEvent::Exit
            ]
        );
    }

    #[test]
    fn test_unsupported_detach_is_a_detach_error() {
        let transport = MockTransport::new()
            .with_device(TEMPER2)
            .fail_at(MockStep::Detach(1), rusb::Error::NotSupported);
        let err = DeviceSession::connect(&transport, TEMPER2, &SessionOptions::default())
            .err()
            .unwrap();

        assert!(matches!(
            err,
            SessionError::Detach {
                interface: 1,
                source: rusb::Error::NotSupported
            }
        ));
        assert_eq!(
            transport.events(),
            vec![
                MockEvent::Init,
                MockEvent::Open(0),
                MockEvent::Detach(0),
                MockEvent::Attach(0),
                MockEvent::Close,
                MockEvent::Exit
            ]
        );
    }

    #[test]
    fn test_session_uses_configured_timeout() {
        let transport = MockTransport::new()
            .with_device(TEMPER2)
            .respond_with(vec![0; 8]);
        let options = SessionOptions {
            timeout: Duration::from_millis(250),
            ..SessionOptions::default()
        };
        let mut session = DeviceSession::connect(&transport, TEMPER2, &options).unwrap();
        assert_eq!(session.timeout(), Duration::from_millis(250));
        session.send_request(&[0; 8]).unwrap();
        session.receive_data(8).unwrap();
        session.disconnect().unwrap();

        for event in transport.events() {
            match event {
                MockEvent::ControlOut { timeout, .. } | MockEvent::InterruptIn { timeout, .. } => {
                    assert_eq!(timeout, Duration::from_millis(250))
                }
                _ => {}
            }
        }
    }

    #[test]
    fn test_short_interrupt_read_is_an_error() {
        let transport = MockTransport::new()
            .with_device(TEMPER2)
            .respond_with(vec![0; 5]);
        let mut session =
            DeviceSession::connect(&transport, TEMPER2, &SessionOptions::default()).unwrap();
        let err = session.receive_data(8).unwrap_err();
        assert!(matches!(
            err,
            SessionError::ShortTransfer {
                expected: 8,
                actual: 5,
                ..
            }
        ));
        session.disconnect().unwrap();
    }
}
